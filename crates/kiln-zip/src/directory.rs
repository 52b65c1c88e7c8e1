//! Central directory finalization shared by the writer and the merger.

use std::io::{Seek, SeekFrom, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use tracing::debug;
use zerocopy::IntoBytes;

use crate::cache::{CacheHeader, PendingCache};
use crate::records::{
    extra_field, fit_u16, fit_u32, write_record, CentralDirectoryHeader, Eocd64Locator, Eocd64Record,
    EocdRecord, VERSION_ZIP64,
};
use crate::Result;

/// Size of the "CS" extra block appended to the last central record.
pub(crate) const CACHE_BLOCK_SIZE: u16 = 4 + CacheHeader::SIZE as u16;

/// Add the cache block size to a serialized central record's extra length.
///
/// `at` is the offset of the record's signature within `entries`. Returns
/// `false` if the record is truncated or the length would overflow.
pub(crate) fn grow_extra_length(entries: &mut [u8], at: usize) -> bool {
    let field = at + CentralDirectoryHeader::EXTRA_LENGTH_OFFSET;
    let Some(bytes) = entries.get_mut(field..field + 2) else {
        return false;
    };
    let current = u16::from_le_bytes([bytes[0], bytes[1]]);
    match current.checked_add(CACHE_BLOCK_SIZE) {
        Some(grown) => {
            bytes.copy_from_slice(&grown.to_le_bytes());
            true
        }
        None => false,
    }
}

/// Everything needed to close an archive.
pub(crate) struct Directory<'a> {
    pub entries: &'a [u8],
    pub num_entries: u64,
    /// Set when any record already needed ZIP64.
    pub zip64: bool,
    pub cache: Option<PendingCache>,
    /// Whether the last central record was grown to hold the cache block.
    pub attach_checkpoint: bool,
}

/// Write the central directory, cache checkpoint and end records at
/// `position`, then the cache sidecar.
///
/// On return `position` is the final archive length.
pub(crate) fn write_directory<W, F>(
    sink: &mut W,
    position: &mut u64,
    directory: Directory<'_>,
    on_before_cache: F,
) -> Result<()>
where
    W: Write + Seek,
    F: FnOnce(&mut W) -> std::io::Result<()>,
{
    let Directory {
        entries,
        num_entries,
        mut zip64,
        mut cache,
        attach_checkpoint,
    } = directory;

    let dir_offset = *position;
    sink.seek(SeekFrom::Start(dir_offset))?;
    sink.write_all(entries)?;
    *position += entries.len() as u64;
    let mut dir_size = entries.len() as u64;

    let mut checkup_offset = None;
    if let Some(pending) = cache.as_mut().filter(|_| attach_checkpoint) {
        sink.write_u16::<LittleEndian>(extra_field::CACHE)?;
        sink.write_u16::<LittleEndian>(CacheHeader::SIZE as u16)?;
        *position += 4;

        pending.index.header_mut().zip_checkup_offset = *position;
        checkup_offset = Some(*position);
        sink.write_all(pending.index.header().as_bytes())?;
        *position += CacheHeader::SIZE as u64;
        dir_size += CACHE_BLOCK_SIZE as u64;
    }

    let count = fit_u16(num_entries, &mut zip64);
    let size = fit_u32(dir_size, &mut zip64);
    let offset = fit_u32(dir_offset, &mut zip64);

    if zip64 {
        let record_offset = *position;
        let record = Eocd64Record {
            record_size: Eocd64Record::RECORD_SIZE,
            version_made_by: VERSION_ZIP64,
            version_needed: VERSION_ZIP64,
            disk_number: 0,
            central_dir_disk: 0,
            central_dir_count_disk: num_entries,
            central_dir_count_total: num_entries,
            central_dir_size: dir_size,
            central_dir_offset: dir_offset,
        };
        *position += write_record(sink, &Eocd64Record::MAGIC, &record)?;

        let locator = Eocd64Locator {
            zip64_eocd_disk: 0,
            zip64_eocd_offset: record_offset,
            total_disks: 1,
        };
        *position += write_record(sink, &Eocd64Locator::MAGIC, &locator)?;
    }

    let eocd = EocdRecord {
        disk_number: 0,
        central_dir_disk: 0,
        central_dir_count_disk: count,
        central_dir_count_total: count,
        central_dir_size: size,
        central_dir_offset: offset,
        comment_length: 0,
    };
    *position += write_record(sink, &EocdRecord::MAGIC, &eocd)?;

    debug!(
        entries = num_entries,
        dir_offset,
        dir_size,
        zip64,
        length = *position,
        "wrote central directory"
    );

    if let Some(mut pending) = cache {
        on_before_cache(sink)?;
        pending.index.header_mut().zip_size = *position;
        pending.index.save(&pending.path)?;

        if let Some(at) = checkup_offset {
            sink.seek(SeekFrom::Start(at))?;
            sink.write_all(pending.index.header().as_bytes())?;
            sink.seek(SeekFrom::Start(*position))?;
        }
        debug!(path = %pending.path.display(), files = pending.index.len(), "wrote cache sidecar");
    }

    sink.flush()?;
    Ok(())
}

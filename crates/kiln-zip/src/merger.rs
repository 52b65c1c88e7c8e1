//! Merging part archives into a primary archive.
//!
//! Each worker builds its own [`ZipPart`]; the merger appends the part's
//! stored bytes to the primary sink and rebases every central record by the
//! primary's data length at the time of the merge. Records whose local
//! header offset crosses 4 GiB after rebasing gain a ZIP64 extra field.
//!
//! Merges into one merger are serialized by its state lock. Mergers opened
//! on a file with [`ZipMerger::create`] also take a process-wide lock keyed
//! by the file's canonical path.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use byteorder::{LittleEndian, WriteBytesExt};
use hashbrown::HashMap;
use kiln_common::BinaryReader;
use memchr::memmem;
use parking_lot::Mutex;
use tracing::{debug, warn};
use zerocopy::IntoBytes;

use crate::cache::{CacheIndex, PendingCache};
use crate::directory::{grow_extra_length, write_directory, Directory};
use crate::records::{extra_field, fit_u32, CentralDirectoryHeader};
use crate::writer::ZipPart;
use crate::{Error, Result};

/// Block size used when copying part data.
pub const COPY_BLOCK_SIZE: usize = 0x80000;

/// How far back from the end of the pending central records the last
/// record signature is searched for. A final record (name plus extras)
/// longer than this is not found and the cache checkpoint is dropped.
pub const SCAN_WINDOW: usize = 0x11000;

#[derive(Debug)]
struct MergeState<W> {
    sink: W,
    position: u64,
    entries: Vec<u8>,
    num_entries: u64,
    zip64: bool,
    cache: Option<PendingCache>,
}

type FileLock = Arc<Mutex<()>>;

/// The process-wide merge lock for an archive path.
fn file_lock(path: &Path) -> FileLock {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, FileLock>>> = OnceLock::new();
    let locks = LOCKS.get_or_init(Default::default);
    locks.lock().entry(path.to_path_buf()).or_default().clone()
}

/// Primary archive that part archives are merged into.
///
/// [`merge`](Self::merge) takes `&self` and may be called from several
/// worker threads; merges into one primary are serialized by its lock.
#[derive(Debug)]
pub struct ZipMerger<W: Write + Seek> {
    state: Mutex<MergeState<W>>,
    file_lock: Option<FileLock>,
}

impl ZipMerger<BufWriter<File>> {
    /// Create a new primary archive file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut merger = Self::new(BufWriter::new(File::create(path)?))?;
        let canonical = path.canonicalize()?;
        debug!(path = %canonical.display(), "merging under file lock");
        merger.file_lock = Some(file_lock(&canonical));
        Ok(merger)
    }
}

impl<W: Write + Seek> ZipMerger<W> {
    /// Start an empty primary archive at the sink's current position.
    pub fn new(mut sink: W) -> Result<Self> {
        let position = sink.stream_position()?;
        Ok(Self::from_parts(sink, position, Vec::new(), 0, false, None))
    }

    pub(crate) fn from_parts(
        sink: W,
        position: u64,
        entries: Vec<u8>,
        num_entries: u64,
        zip64: bool,
        cache: Option<PendingCache>,
    ) -> Self {
        Self {
            state: Mutex::new(MergeState {
                sink,
                position,
                entries,
                num_entries,
                zip64,
                cache,
            }),
            file_lock: None,
        }
    }

    /// Collect a cache index and write it to `path` on finish.
    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        let state = self.state.get_mut();
        if state.cache.is_none() {
            state.cache = Some(PendingCache {
                index: CacheIndex::new(),
                path: path.into(),
            });
        }
        self
    }

    /// Number of entries merged so far.
    pub fn num_entries(&self) -> u64 {
        self.state.lock().num_entries
    }

    /// Current data length of the primary.
    pub fn position(&self) -> u64 {
        self.state.lock().position
    }

    /// Append a part archive.
    pub fn merge<R: Read + Seek>(&self, part: ZipPart<R>) -> Result<()> {
        let ZipPart {
            mut sink,
            start,
            len,
            entries,
            num_entries,
            data_offsets,
            zip64,
        } = part;
        if data_offsets.len() as u64 != num_entries {
            return Err(Error::CorruptPart(format!(
                "{} data offsets for {} entries",
                data_offsets.len(),
                num_entries
            )));
        }

        let _file_guard = self.file_lock.as_ref().map(|lock| lock.lock());
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let base = state.position;
        debug!(entries = num_entries, bytes = len, base, "merging part");

        // staged until the data copy succeeds
        let mut staged = Vec::with_capacity(entries.len());
        let mut cached = Vec::new();
        let mut staged_zip64 = zip64;

        let mut reader = BinaryReader::new(&entries);
        for &data_offset in &data_offsets {
            let signature = reader.read_u32()?;
            if signature != CentralDirectoryHeader::SIGNATURE {
                return Err(Error::InvalidSignature {
                    expected: CentralDirectoryHeader::SIGNATURE,
                    actual: signature,
                });
            }
            let mut header: CentralDirectoryHeader = reader.read_struct()?;
            let name = reader.read_bytes(header.file_name_length as usize)?;
            let extra = reader.read_bytes(header.extra_field_length as usize)?;
            let comment = reader.read_bytes(header.file_comment_length as usize)?;

            let rebased = rebase(&mut header, extra, start, base)?;
            staged_zip64 |= rebased.zip64;

            staged.extend_from_slice(&CentralDirectoryHeader::MAGIC);
            staged.extend_from_slice(header.as_bytes());
            staged.extend_from_slice(name);
            staged.extend_from_slice(&rebased.extra);
            staged.extend_from_slice(comment);

            if state.cache.is_some() {
                let offset = data_offset
                    .checked_sub(start)
                    .ok_or_else(|| Error::CorruptPart(format!("data offset {data_offset} before part start")))?;
                let name = String::from_utf8_lossy(name).into_owned();
                cached.push((name, base + offset, rebased.size, header.crc32));
            }
        }

        sink.seek(SeekFrom::Start(start))?;
        state.sink.seek(SeekFrom::Start(base))?;
        copy_blocks(&mut sink, &mut state.sink, len)?;

        state.entries.extend_from_slice(&staged);
        if let Some(pending) = state.cache.as_mut() {
            for (name, offset, size, crc) in cached {
                pending.index.add_file(name, offset, size);
                pending.index.fold_crc(crc);
            }
        }
        state.position += len;
        state.num_entries += num_entries;
        state.zip64 |= staged_zip64;
        debug!(entries = state.num_entries, length = state.position, "merged part");
        Ok(())
    }

    /// Finalize the primary archive and return the sink.
    pub fn finish(self) -> Result<W> {
        self.finish_with(|_| Ok(()))
    }

    /// Finalize the primary archive. `on_before_cache` runs after the end
    /// records are written and before the cache sidecar is saved.
    pub fn finish_with<F>(self, on_before_cache: F) -> Result<W>
    where
        F: FnOnce(&mut W) -> io::Result<()>,
    {
        let Self { state, file_lock } = self;
        let _file_guard = file_lock.as_ref().map(|lock| lock.lock());
        let MergeState {
            mut sink,
            mut position,
            mut entries,
            num_entries,
            zip64,
            cache,
        } = state.into_inner();

        let attach_checkpoint = cache.is_some() && attach_to_last_record(&mut entries);
        let directory = Directory {
            entries: &entries,
            num_entries,
            zip64,
            cache,
            attach_checkpoint,
        };
        write_directory(&mut sink, &mut position, directory, on_before_cache)?;
        Ok(sink)
    }
}

/// Find the last central record by signature and grow its extra length to
/// cover the cache block.
fn attach_to_last_record(entries: &mut [u8]) -> bool {
    let window_start = entries.len().saturating_sub(SCAN_WINDOW);
    let found = memmem::rfind(&entries[window_start..], &CentralDirectoryHeader::MAGIC);

    match found {
        Some(at) if grow_extra_length(entries, window_start + at) => true,
        Some(at) => {
            warn!(offset = window_start + at, "last central record cannot hold the cache block");
            false
        }
        None => {
            if !entries.is_empty() {
                warn!(window = SCAN_WINDOW, "last central record not found, cache checkpoint dropped");
            }
            false
        }
    }
}

/// A central record after rebasing.
struct Rebased {
    extra: Vec<u8>,
    /// True uncompressed size.
    size: u64,
    zip64: bool,
}

/// Move a record from a part starting at `start` to `base` in the primary.
fn rebase(header: &mut CentralDirectoryHeader, extra: &[u8], start: u64, base: u64) -> Result<Rebased> {
    let mut uncompressed = None;
    let mut compressed = None;
    let mut offset = None;
    let mut others = Vec::new();

    let mut reader = BinaryReader::new(extra);
    while reader.remaining() >= 4 {
        let id = reader.read_u16()?;
        let len = reader.read_u16()? as usize;
        let data = reader.read_bytes(len)?;

        if id != extra_field::ZIP64 {
            others.extend_from_slice(&id.to_le_bytes());
            others.extend_from_slice(&(len as u16).to_le_bytes());
            others.extend_from_slice(data);
            continue;
        }

        let (u, c, o) = (header.uncompressed_size, header.compressed_size, header.local_header_offset);
        let mut values = BinaryReader::new(data);
        if u == u32::MAX {
            uncompressed = Some(values.read_u64()?);
        }
        if c == u32::MAX {
            compressed = Some(values.read_u64()?);
        }
        if o == u32::MAX {
            offset = Some(values.read_u64()?);
        }
    }

    let old_offset = offset.unwrap_or(header.local_header_offset as u64);
    let new_offset = old_offset
        .checked_sub(start)
        .ok_or_else(|| Error::CorruptPart(format!("header offset {old_offset} before part start")))?
        + base;

    let mut offset_zip64 = false;
    header.local_header_offset = fit_u32(new_offset, &mut offset_zip64);

    let zip64 = uncompressed.is_some() || compressed.is_some() || offset_zip64;
    let mut rebuilt = Vec::with_capacity(extra.len() + 12);
    if zip64 {
        let values = [uncompressed, compressed, offset_zip64.then_some(new_offset)];
        let data_size = values.iter().flatten().count() as u16 * 8;
        rebuilt.write_u16::<LittleEndian>(extra_field::ZIP64)?;
        rebuilt.write_u16::<LittleEndian>(data_size)?;
        for value in values.into_iter().flatten() {
            rebuilt.write_u64::<LittleEndian>(value)?;
        }
    }
    rebuilt.extend_from_slice(&others);

    header.extra_field_length = u16::try_from(rebuilt.len())
        .map_err(|_| Error::CorruptPart(format!("extra field of {} bytes", rebuilt.len())))?;

    Ok(Rebased {
        size: uncompressed.unwrap_or(header.uncompressed_size as u64),
        zip64,
        extra: rebuilt,
    })
}

/// Copy exactly `len` bytes in fixed-size blocks.
fn copy_blocks<R: Read, W: Write>(from: &mut R, to: &mut W, mut len: u64) -> Result<()> {
    let mut buffer = vec![0u8; COPY_BLOCK_SIZE.min(len as usize).max(1)];
    while len > 0 {
        let chunk = buffer.len().min(len as usize);
        from.read_exact(&mut buffer[..chunk])?;
        to.write_all(&buffer[..chunk])?;
        len -= chunk as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::DosDateTime;
    use crate::writer::ZipWriter;
    use std::io::Cursor;

    fn record(extra_len: u16, name: &[u8]) -> Vec<u8> {
        let header = CentralDirectoryHeader {
            file_name_length: name.len() as u16,
            extra_field_length: extra_len,
            ..Default::default()
        };
        let mut out = CentralDirectoryHeader::MAGIC.to_vec();
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(name);
        out.extend(std::iter::repeat(0u8).take(extra_len as usize));
        out
    }

    #[test]
    fn test_attach_patches_last_record() {
        let mut entries = record(0, b"first");
        let last = entries.len();
        entries.extend(record(4, b"second"));

        assert!(attach_to_last_record(&mut entries));
        let at = last + CentralDirectoryHeader::EXTRA_LENGTH_OFFSET;
        assert_eq!(u16::from_le_bytes([entries[at], entries[at + 1]]), 4 + 36);
        // first record untouched
        let at = CentralDirectoryHeader::EXTRA_LENGTH_OFFSET;
        assert_eq!(u16::from_le_bytes([entries[at], entries[at + 1]]), 0);
    }

    #[test]
    fn test_attach_outside_window() {
        let mut entries = record(0, &vec![b'n'; SCAN_WINDOW]);
        assert!(!attach_to_last_record(&mut entries));
    }

    #[test]
    fn test_rebase_small() {
        let mut header = CentralDirectoryHeader {
            uncompressed_size: 10,
            compressed_size: 10,
            local_header_offset: 100,
            ..Default::default()
        };
        let rebased = rebase(&mut header, &[], 0, 1000).unwrap();
        assert_eq!({ header.local_header_offset }, 1100);
        assert!(rebased.extra.is_empty());
        assert!(!rebased.zip64);
        assert_eq!(rebased.size, 10);
    }

    #[test]
    fn test_rebase_crossing_4gib_adds_offset() {
        let mut header = CentralDirectoryHeader {
            uncompressed_size: 10,
            compressed_size: 10,
            local_header_offset: 0x100,
            ..Default::default()
        };
        let rebased = rebase(&mut header, &[], 0, 0xFFFF_FFF0).unwrap();
        assert_eq!({ header.local_header_offset }, u32::MAX);
        assert_eq!({ header.extra_field_length }, 12);

        let mut reader = BinaryReader::new(&rebased.extra);
        assert_eq!(reader.read_u16().unwrap(), extra_field::ZIP64);
        assert_eq!(reader.read_u16().unwrap(), 8);
        assert_eq!(reader.read_u64().unwrap(), 0x1_0000_00F0);
        assert!(rebased.zip64);
    }

    #[test]
    fn test_rebase_keeps_sizes_and_other_blocks() {
        let mut extra = Vec::new();
        extra.write_u16::<LittleEndian>(extra_field::ZIP64).unwrap();
        extra.write_u16::<LittleEndian>(16).unwrap();
        extra.write_u64::<LittleEndian>(0x1_2345_6789).unwrap();
        extra.write_u64::<LittleEndian>(0x1_2345_6789).unwrap();
        extra.extend_from_slice(&[0x55, 0x54, 0x01, 0x00, 0x07]);

        let mut header = CentralDirectoryHeader {
            uncompressed_size: u32::MAX,
            compressed_size: u32::MAX,
            local_header_offset: 64,
            extra_field_length: extra.len() as u16,
            ..Default::default()
        };
        let rebased = rebase(&mut header, &extra, 0, 0xFFFF_FFFF).unwrap();
        assert_eq!(rebased.size, 0x1_2345_6789);
        assert_eq!({ header.extra_field_length }, 4 + 24 + 5);

        let mut reader = BinaryReader::new(&rebased.extra);
        assert_eq!(reader.read_u16().unwrap(), extra_field::ZIP64);
        assert_eq!(reader.read_u16().unwrap(), 24);
        assert_eq!(reader.read_u64().unwrap(), 0x1_2345_6789);
        assert_eq!(reader.read_u64().unwrap(), 0x1_2345_6789);
        assert_eq!(reader.read_u64().unwrap(), 0xFFFF_FFFF + 64);
        assert_eq!(reader.read_bytes(5).unwrap(), &[0x55, 0x54, 0x01, 0x00, 0x07]);
    }

    /// Reads up to `limit` bytes, then fails.
    struct Interrupted {
        inner: Cursor<Vec<u8>>,
        limit: u64,
    }

    impl Read for Interrupted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let left = self.limit.saturating_sub(self.inner.position());
            if left == 0 {
                return Err(io::Error::other("device lost"));
            }
            let len = buf.len().min(left as usize);
            self.inner.read(&mut buf[..len])
        }
    }

    impl Seek for Interrupted {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn sample_part() -> ZipPart<Cursor<Vec<u8>>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()))
            .unwrap()
            .with_timestamp(DosDateTime::default());
        zip.new_file("one.bin").unwrap();
        zip.send_data(&[7; 64]).unwrap();
        zip.new_file("two.bin").unwrap();
        zip.send_data(&[9; 32]).unwrap();
        zip.into_part().unwrap()
    }

    #[test]
    fn test_failed_copy_leaves_merger_unchanged() {
        let merger = ZipMerger::new(Cursor::new(Vec::new()))
            .unwrap()
            .with_cache("unused.cache");

        let part = sample_part();
        let len = part.len;
        let broken = ZipPart {
            sink: Interrupted {
                inner: part.sink,
                limit: 80,
            },
            start: part.start,
            len: part.len,
            entries: part.entries,
            num_entries: part.num_entries,
            data_offsets: part.data_offsets,
            zip64: part.zip64,
        };
        assert!(matches!(merger.merge(broken), Err(Error::Io(_))));

        assert_eq!(merger.num_entries(), 0);
        assert_eq!(merger.position(), 0);
        {
            let state = merger.state.lock();
            assert!(state.entries.is_empty());
            assert!(state.cache.as_ref().unwrap().index.entries().is_empty());
        }

        merger.merge(sample_part()).unwrap();
        assert_eq!(merger.num_entries(), 2);
        assert_eq!(merger.position(), len);
        let state = merger.state.lock();
        assert_eq!(state.cache.as_ref().unwrap().index.entries().len(), 2);
        assert_eq!(memchr::memmem::find_iter(&state.entries, &CentralDirectoryHeader::MAGIC).count(), 2);
    }

    #[test]
    fn test_file_lock_shared_per_path() {
        let a = file_lock(Path::new("/tmp/kiln/shared.zip"));
        let b = file_lock(Path::new("/tmp/kiln/shared.zip"));
        let c = file_lock(Path::new("/tmp/kiln/other.zip"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_create_takes_file_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("primary.zip");
        let merger = ZipMerger::create(&path).unwrap();
        let held = file_lock(&path.canonicalize().unwrap());
        assert!(Arc::ptr_eq(merger.file_lock.as_ref().unwrap(), &held));

        let guard = held.lock();
        assert!(merger.file_lock.as_ref().unwrap().try_lock().is_none());
        drop(guard);
        merger.merge(sample_part()).unwrap();
        assert_eq!(merger.num_entries(), 2);
    }

    #[test]
    fn test_copy_blocks_exact() {
        let data: Vec<u8> = (0..COPY_BLOCK_SIZE + 17).map(|i| i as u8).collect();
        let mut out = Vec::new();
        copy_blocks(&mut &data[..], &mut out, data.len() as u64).unwrap();
        assert_eq!(out, data);
    }
}

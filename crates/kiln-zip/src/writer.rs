//! Streaming ZIP writer.
//!
//! Entries are stored uncompressed and streamed straight into the sink. The
//! local header is written with zero sizes and a reserved extra field when an
//! entry begins. Both are patched in place once the entry is finished, so the
//! sink must be seekable.
//! Central records are collected in memory and written contiguously by
//! [`ZipWriter::finish`].

use std::fs::File;
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, WriteBytesExt};
use kiln_common::hash::crc32_append;
use tracing::debug;
use zerocopy::IntoBytes;

use crate::cache::{CacheIndex, PendingCache};
use crate::directory::{grow_extra_length, write_directory, Directory};
use crate::merger::ZipMerger;
use crate::records::{
    extra_field, fit_u32, write_record, CentralDirectoryHeader, LocalFileHeader, FLAG_UTF8, METHOD_STORE,
    VERSION, VERSION_ZIP64,
};
use crate::time::DosDateTime;
use crate::{Error, Result};

/// The reserved local extra field: `id` followed by two copies of `size`.
fn local_extra(id: u16, size: u64) -> io::Result<Vec<u8>> {
    let mut extra = Vec::with_capacity(usize::from(extra_field::LOCAL_RESERVED));
    extra.write_u16::<LittleEndian>(id)?;
    extra.write_u16::<LittleEndian>(16)?;
    extra.write_u64::<LittleEndian>(size)?;
    extra.write_u64::<LittleEndian>(size)?;
    Ok(extra)
}

/// The entry currently being streamed.
#[derive(Debug)]
struct OpenFile {
    name: String,
    header: LocalFileHeader,
    /// Offset of the local header signature.
    offset: u64,
    size: u64,
    crc: u32,
}

/// Streaming ZIP/ZIP64 writer over a seekable sink.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use kiln_zip::ZipWriter;
///
/// let mut zip = ZipWriter::new(Cursor::new(Vec::new())).unwrap();
/// zip.new_file("hello.txt").unwrap();
/// zip.send_data(b"hello ").unwrap();
/// zip.send_data(b"world").unwrap();
/// let bytes = zip.finish().unwrap().into_inner();
///
/// assert_eq!(&bytes[..4], b"PK\x03\x04");
/// ```
#[derive(Debug)]
pub struct ZipWriter<W: Write + Seek> {
    sink: W,
    /// Position the archive started at in the sink.
    start: u64,
    /// Current end of written data.
    position: u64,
    entries: Vec<u8>,
    num_entries: u64,
    data_offsets: Vec<u64>,
    /// Offset of the last central record within `entries`.
    last_record: Option<usize>,
    zip64: bool,
    prefix: String,
    timestamp: Option<DosDateTime>,
    cache: Option<PendingCache>,
    open: Option<OpenFile>,
}

impl ZipWriter<BufWriter<File>> {
    /// Create a new archive file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write + Seek> ZipWriter<W> {
    /// Start an archive at the sink's current position.
    pub fn new(mut sink: W) -> Result<Self> {
        let start = sink.stream_position()?;
        Ok(Self {
            sink,
            start,
            position: start,
            entries: Vec::new(),
            num_entries: 0,
            data_offsets: Vec::new(),
            last_record: None,
            zip64: false,
            prefix: String::new(),
            timestamp: None,
            cache: None,
            open: None,
        })
    }

    /// Prefix every following entry name with a folder.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let mut prefix = prefix.into().replace('\\', "/");
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.prefix = prefix;
        self
    }

    /// Collect a cache index and write it to `path` on finish.
    pub fn with_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache = Some(PendingCache {
            index: CacheIndex::new(),
            path: path.into(),
        });
        self
    }

    /// Stamp every entry with a fixed time instead of the wall clock.
    pub fn with_timestamp(mut self, timestamp: DosDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Current end of written data in the sink.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of finished entries.
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// The cache index collected so far, if enabled.
    pub fn cache(&self) -> Option<&CacheIndex> {
        self.cache.as_ref().map(|pending| &pending.index)
    }

    /// Begin a new entry, finishing the open one first.
    pub fn new_file(&mut self, name: &str) -> Result<()> {
        self.finish_file()?;

        let name = format!("{}{}", self.prefix, name).replace('\\', "/");
        let name_length = u16::try_from(name.len()).map_err(|_| Error::NameTooLong(name.len()))?;
        let stamp = self.timestamp.unwrap_or_else(DosDateTime::now);

        let header = LocalFileHeader {
            version_needed: VERSION,
            flags: if name.is_ascii() { 0 } else { FLAG_UTF8 },
            compression_method: METHOD_STORE,
            last_modified: stamp.to_u32(),
            file_name_length: name_length,
            extra_field_length: extra_field::LOCAL_RESERVED,
            ..Default::default()
        };

        let offset = self.position;
        self.position += write_record(&mut self.sink, &LocalFileHeader::MAGIC, &header)?;
        self.sink.write_all(name.as_bytes())?;
        self.sink.write_all(&local_extra(extra_field::PADDING, 0)?)?;
        self.position += name.len() as u64 + u64::from(extra_field::LOCAL_RESERVED);

        debug!(name = %name, offset, "begin file");
        self.open = Some(OpenFile {
            name,
            header,
            offset,
            size: 0,
            crc: 0,
        });
        Ok(())
    }

    /// Append bytes to the open entry.
    pub fn send_data(&mut self, data: &[u8]) -> Result<()> {
        let open = self.open.as_mut().ok_or(Error::NoOpenFile)?;
        self.sink.write_all(data)?;
        self.position += data.len() as u64;
        open.size += data.len() as u64;
        open.crc = crc32_append(open.crc, data);
        Ok(())
    }

    /// Finish the open entry, if any.
    pub fn finish_file(&mut self) -> Result<()> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };

        let mut size_zip64 = false;
        let mut header = open.header;
        header.crc32 = open.crc;
        header.uncompressed_size = fit_u32(open.size, &mut size_zip64);
        header.compressed_size = header.uncompressed_size;

        if size_zip64 {
            header.version_needed = VERSION_ZIP64;
        }

        self.sink.seek(SeekFrom::Start(open.offset))?;
        write_record(&mut self.sink, &LocalFileHeader::MAGIC, &header)?;
        if size_zip64 {
            self.sink.seek(SeekFrom::Current(i64::from(header.file_name_length)))?;
            self.sink.write_all(&local_extra(extra_field::ZIP64, open.size)?)?;
        }
        self.sink.seek(SeekFrom::Start(self.position))?;

        let data_offset = open.offset
            + LocalFileHeader::SIZE
            + open.name.len() as u64
            + u64::from(extra_field::LOCAL_RESERVED);
        self.data_offsets.push(data_offset);
        if let Some(pending) = self.cache.as_mut() {
            pending.index.add_file(open.name.clone(), data_offset, open.size);
            pending.index.fold_crc(open.crc);
        }

        let mut offset_zip64 = false;
        let mut central = CentralDirectoryHeader {
            version_made_by: VERSION,
            version_needed: VERSION,
            flags: header.flags,
            compression_method: METHOD_STORE,
            last_modified: header.last_modified,
            crc32: open.crc,
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            file_name_length: header.file_name_length,
            local_header_offset: fit_u32(open.offset, &mut offset_zip64),
            ..Default::default()
        };

        let mut extra = Vec::new();
        if size_zip64 || offset_zip64 {
            let data_size = if size_zip64 { 16 } else { 0 } + if offset_zip64 { 8 } else { 0 };
            extra.write_u16::<LittleEndian>(extra_field::ZIP64)?;
            extra.write_u16::<LittleEndian>(data_size)?;
            if size_zip64 {
                extra.write_u64::<LittleEndian>(open.size)?;
                extra.write_u64::<LittleEndian>(open.size)?;
            }
            if offset_zip64 {
                extra.write_u64::<LittleEndian>(open.offset)?;
            }
            central.version_needed = VERSION_ZIP64;
            self.zip64 = true;
        }
        central.extra_field_length = extra.len() as u16;

        self.last_record = Some(self.entries.len());
        self.entries.extend_from_slice(&CentralDirectoryHeader::MAGIC);
        self.entries.extend_from_slice(central.as_bytes());
        self.entries.extend_from_slice(open.name.as_bytes());
        self.entries.extend_from_slice(&extra);
        self.num_entries += 1;

        debug!(name = %open.name, size = open.size, crc = open.crc, zip64 = size_zip64 || offset_zip64, "finish file");
        Ok(())
    }

    /// Finalize the archive and return the sink.
    pub fn finish(self) -> Result<W> {
        self.finish_with(|_| Ok(()))
    }

    /// Finalize the archive. `on_before_cache` runs after the end records
    /// are written and before the cache sidecar is saved.
    pub fn finish_with<F>(mut self, on_before_cache: F) -> Result<W>
    where
        F: FnOnce(&mut W) -> io::Result<()>,
    {
        self.finish_file()?;

        let attach_checkpoint = self.cache.is_some()
            && self
                .last_record
                .is_some_and(|at| grow_extra_length(&mut self.entries, at));

        let directory = Directory {
            entries: &self.entries,
            num_entries: self.num_entries,
            zip64: self.zip64,
            cache: self.cache.take(),
            attach_checkpoint,
        };
        write_directory(&mut self.sink, &mut self.position, directory, on_before_cache)?;
        Ok(self.sink)
    }

    /// Finish the open entry and hand the archive over for merging.
    pub fn into_part(mut self) -> Result<ZipPart<W>> {
        self.finish_file()?;
        self.sink.flush()?;
        Ok(ZipPart {
            sink: self.sink,
            start: self.start,
            len: self.position - self.start,
            entries: self.entries,
            num_entries: self.num_entries,
            data_offsets: self.data_offsets,
            zip64: self.zip64,
        })
    }

    /// Keep writing into this archive as the primary of a merge.
    pub fn into_merger(mut self) -> Result<ZipMerger<W>> {
        self.finish_file()?;
        Ok(ZipMerger::from_parts(
            self.sink,
            self.position,
            self.entries,
            self.num_entries,
            self.zip64,
            self.cache,
        ))
    }
}

impl<W: Write + Seek> Write for ZipWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.send_data(buf).map_err(|e| match e {
            Error::Io(e) => e,
            other => io::Error::other(other),
        })?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

/// A finished-but-unwritten archive waiting to be merged.
///
/// Holds the part's data sink and its serialized central records.
#[derive(Debug)]
pub struct ZipPart<R> {
    pub(crate) sink: R,
    pub(crate) start: u64,
    pub(crate) len: u64,
    pub(crate) entries: Vec<u8>,
    pub(crate) num_entries: u64,
    pub(crate) data_offsets: Vec<u64>,
    pub(crate) zip64: bool,
}

impl<R> ZipPart<R> {
    /// Number of entries in the part.
    pub fn num_entries(&self) -> u64 {
        self.num_entries
    }

    /// Number of data bytes to copy.
    pub fn data_len(&self) -> u64 {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::BinaryReader;
    use std::io::Cursor;

    fn writer() -> ZipWriter<Cursor<Vec<u8>>> {
        ZipWriter::new(Cursor::new(Vec::new()))
            .unwrap()
            .with_timestamp(DosDateTime::default())
    }

    #[test]
    fn test_send_without_file() {
        let mut zip = writer();
        assert!(matches!(zip.send_data(b"x"), Err(Error::NoOpenFile)));
    }

    #[test]
    fn test_local_header_patched() {
        let mut zip = writer();
        zip.new_file("a.txt").unwrap();
        zip.send_data(b"abc").unwrap();
        zip.send_data(b"def").unwrap();
        zip.finish_file().unwrap();

        let bytes = zip.sink.get_ref();
        let mut reader = BinaryReader::new(bytes);
        reader.expect_magic(&LocalFileHeader::MAGIC).unwrap();
        let header: LocalFileHeader = reader.read_struct().unwrap();
        assert_eq!({ header.uncompressed_size }, 6);
        assert_eq!({ header.compressed_size }, 6);
        assert_eq!({ header.crc32 }, kiln_common::hash::crc32(b"abcdef"));
        assert_eq!({ header.extra_field_length }, 20);
        assert_eq!(reader.read_bytes(5).unwrap(), b"a.txt");
        assert_eq!(reader.read_u16().unwrap(), extra_field::PADDING);
        assert_eq!(reader.read_u16().unwrap(), 16);
        assert_eq!(zip.data_offsets, vec![30 + 5 + 20]);
        assert_eq!(zip.position(), 30 + 5 + 20 + 6);
    }

    #[test]
    fn test_new_file_finishes_previous() {
        let mut zip = writer();
        zip.new_file("a").unwrap();
        zip.send_data(b"1").unwrap();
        zip.new_file("b").unwrap();
        assert_eq!(zip.num_entries(), 1);
        zip.finish_file().unwrap();
        assert_eq!(zip.num_entries(), 2);
    }

    #[test]
    fn test_prefix() {
        let mut zip = writer().with_prefix("pack\\one");
        zip.new_file("x.bin").unwrap();
        zip.finish_file().unwrap();
        let name_at = 4 + std::mem::size_of::<CentralDirectoryHeader>();
        assert_eq!(&zip.entries[name_at..name_at + 12], b"pack/one/x.b");
    }

    #[test]
    fn test_large_size_uses_zip64_extra() {
        let mut zip = writer();
        zip.new_file("big.bin").unwrap();
        zip.send_data(b"payload").unwrap();
        zip.open.as_mut().unwrap().size = 0x1_0000_0005;
        zip.finish_file().unwrap();

        let mut reader = BinaryReader::new(zip.sink.get_ref());
        reader.expect_magic(&LocalFileHeader::MAGIC).unwrap();
        let local: LocalFileHeader = reader.read_struct().unwrap();
        assert_eq!({ local.uncompressed_size }, u32::MAX);
        assert_eq!({ local.compressed_size }, u32::MAX);
        assert_eq!({ local.version_needed }, VERSION_ZIP64);
        assert_eq!({ local.extra_field_length }, 20);
        assert_eq!(reader.read_bytes(7).unwrap(), b"big.bin");
        assert_eq!(reader.read_u16().unwrap(), extra_field::ZIP64);
        assert_eq!(reader.read_u16().unwrap(), 16);
        assert_eq!(reader.read_u64().unwrap(), 0x1_0000_0005);
        assert_eq!(reader.read_u64().unwrap(), 0x1_0000_0005);
        assert_eq!(&zip.sink.get_ref()[reader.position()..], b"payload");

        let mut reader = BinaryReader::new(&zip.entries);
        reader.expect_magic(&CentralDirectoryHeader::MAGIC).unwrap();
        let central: CentralDirectoryHeader = reader.read_struct().unwrap();
        assert_eq!({ central.uncompressed_size }, u32::MAX);
        assert_eq!({ central.extra_field_length }, 20);
        assert_eq!({ central.local_header_offset }, 0);
        reader.read_bytes(7).unwrap();
        assert_eq!(reader.read_u16().unwrap(), extra_field::ZIP64);
        assert_eq!(reader.read_u16().unwrap(), 16);
        assert_eq!(reader.read_u64().unwrap(), 0x1_0000_0005);
        assert_eq!(reader.read_u64().unwrap(), 0x1_0000_0005);
        assert!(zip.zip64);
    }

    #[test]
    fn test_small_archive_has_no_zip64() {
        let mut zip = writer();
        zip.new_file("a").unwrap();
        zip.send_data(b"a").unwrap();
        let bytes = zip.finish().unwrap().into_inner();
        assert!(memchr::memmem::find(&bytes, &crate::records::Eocd64Record::MAGIC).is_none());
    }
}

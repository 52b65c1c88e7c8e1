//! Cache index and `.cache` sidecar.
//!
//! The cache maps every archived name to the offset of its stored bytes so
//! tools can re-read an entry without walking the central directory. A copy
//! of the [`CacheHeader`] is also embedded in the archive itself (the "CS"
//! extra block on the last central record), which lets a reader confirm that
//! a sidecar still belongs to the archive next to it.
//!
//! Sidecar layout (little-endian):
//!
//! ```text
//! CacheHeader (32 bytes)
//! num_files x { offset: u64, size: u64, name_length: u16, name: [u8] }
//! ```
//!
//! Entries are sorted by name.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use hashbrown::HashMap;
use kiln_common::hash::crc32_append;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// Upper bound on entries reserved up front from an untrusted count.
const PREALLOCATE_LIMIT: usize = 1 << 16;

/// Checkpoint header shared by the sidecar and the in-archive "CS" block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CacheHeader {
    pub magic: [u8; 4],
    pub version: u32,
    /// CRC32 folded over the little-endian CRC of every entry, in order.
    pub zip_crc: u32,
    pub num_files: u32,
    /// Final archive length.
    pub zip_size: u64,
    /// Offset of the embedded header copy inside the archive.
    pub zip_checkup_offset: u64,
}

impl CacheHeader {
    pub const MAGIC: [u8; 4] = *b"KLNC";

    pub const VERSION: u32 = 1;

    pub const SIZE: usize = std::mem::size_of::<Self>();
}

impl Default for CacheHeader {
    fn default() -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            zip_crc: 0,
            num_files: 0,
            zip_size: 0,
            zip_checkup_offset: 0,
        }
    }
}

/// One cached entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub name: String,
    /// Absolute offset of the stored bytes in the archive.
    pub offset: u64,
    pub size: u64,
}

/// Name to data-offset index of an archive.
#[derive(Debug, Clone, Default)]
pub struct CacheIndex {
    header: CacheHeader,
    entries: Vec<CacheEntry>,
    lookup: HashMap<String, usize>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an entry. A later entry with the same name replaces the lookup.
    pub fn add_file(&mut self, name: impl Into<String>, offset: u64, size: u64) {
        let name = name.into();
        self.lookup.insert(name.clone(), self.entries.len());
        self.entries.push(CacheEntry { name, offset, size });
        self.header.num_files = self.entries.len() as u32;
    }

    /// Fold an entry CRC into the archive CRC.
    pub fn fold_crc(&mut self, crc: u32) {
        self.header.zip_crc = crc32_append(self.header.zip_crc, &crc.to_le_bytes());
    }

    pub fn header(&self) -> &CacheHeader {
        &self.header
    }

    pub(crate) fn header_mut(&mut self) -> &mut CacheHeader {
        &mut self.header
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by name, returning `(offset, size)`.
    pub fn find(&self, name: &str) -> Option<(u64, u64)> {
        self.lookup.get(name).map(|&i| {
            let entry = &self.entries[i];
            (entry.offset, entry.size)
        })
    }

    /// Serialize the sidecar.
    pub fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        out.write_all(self.header.as_bytes())?;

        let mut sorted: Vec<&CacheEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| a.name.cmp(&b.name));

        for entry in sorted {
            let len = u16::try_from(entry.name.len()).map_err(|_| Error::NameTooLong(entry.name.len()))?;
            out.write_u64::<LittleEndian>(entry.offset)?;
            out.write_u64::<LittleEndian>(entry.size)?;
            out.write_u16::<LittleEndian>(len)?;
            out.write_all(entry.name.as_bytes())?;
        }
        Ok(())
    }

    /// Deserialize a sidecar.
    pub fn read_from<R: Read>(input: &mut R) -> Result<Self> {
        let mut raw = [0u8; CacheHeader::SIZE];
        input.read_exact(&mut raw)?;
        let header = CacheHeader::read_from_bytes(&raw[..]).map_err(|_| {
            Error::Common(kiln_common::Error::UnexpectedEof {
                needed: CacheHeader::SIZE,
                available: raw.len(),
            })
        })?;
        if header.magic != CacheHeader::MAGIC {
            return Err(Error::InvalidCacheMagic(header.magic));
        }
        let version = header.version;
        if version != CacheHeader::VERSION {
            return Err(Error::UnsupportedCacheVersion(version));
        }

        let count = header.num_files as usize;
        let capacity = count.min(PREALLOCATE_LIMIT);
        let mut index = Self {
            header,
            entries: Vec::with_capacity(capacity),
            lookup: HashMap::with_capacity(capacity),
        };
        for _ in 0..count {
            let offset = input.read_u64::<LittleEndian>()?;
            let size = input.read_u64::<LittleEndian>()?;
            let len = input.read_u16::<LittleEndian>()? as usize;
            let mut name = vec![0u8; len];
            input.read_exact(&mut name)?;
            let name = String::from_utf8(name).map_err(|e| kiln_common::Error::Utf8(e.utf8_error()))?;
            index.lookup.insert(name.clone(), index.entries.len());
            index.entries.push(CacheEntry { name, offset, size });
        }
        Ok(index)
    }

    /// Load a sidecar file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from(&mut reader)
    }

    /// Write a sidecar file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Check that `archive` is the archive this index was written for: its
    /// length matches and the embedded checkpoint equals this header.
    pub fn matches_archive<R: Read + Seek>(&self, archive: &mut R) -> Result<bool> {
        let expected_size = self.header.zip_size;
        let checkup = self.header.zip_checkup_offset;
        if archive.seek(SeekFrom::End(0))? != expected_size || checkup == 0 {
            return Ok(false);
        }

        archive.seek(SeekFrom::Start(checkup))?;
        let mut raw = [0u8; CacheHeader::SIZE];
        archive.read_exact(&mut raw)?;
        Ok(raw.as_slice() == self.header.as_bytes())
    }
}

/// Sidecar path for an archive: `<archive>.cache`.
pub fn sidecar_path(archive: impl AsRef<Path>) -> PathBuf {
    let mut path = archive.as_ref().as_os_str().to_owned();
    path.push(".cache");
    PathBuf::from(path)
}

/// A cache being collected alongside an archive, with its sidecar target.
#[derive(Debug)]
pub(crate) struct PendingCache {
    pub index: CacheIndex,
    pub path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_header_size() {
        assert_eq!(CacheHeader::SIZE, 32);
    }

    #[test]
    fn test_sidecar_round_trip() {
        let mut index = CacheIndex::new();
        index.add_file("b/second.bin", 100, 7);
        index.add_file("a/first.bin", 30, 12);
        index.fold_crc(0xDEADBEEF);
        index.header_mut().zip_size = 4096;

        let mut bytes = Vec::new();
        index.write_to(&mut bytes).unwrap();
        let loaded = CacheIndex::read_from(&mut Cursor::new(bytes)).unwrap();

        assert_eq!(loaded.header(), index.header());
        assert_eq!(loaded.find("a/first.bin"), Some((30, 12)));
        assert_eq!(loaded.find("b/second.bin"), Some((100, 7)));
        assert_eq!(loaded.find("missing"), None);
        // sorted on disk
        assert_eq!(loaded.entries()[0].name, "a/first.bin");
    }

    #[test]
    fn test_crc_fold_matches_concatenation() {
        let mut index = CacheIndex::new();
        index.fold_crc(1);
        index.fold_crc(0x01020304);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0x01020304u32.to_le_bytes());
        assert_eq!({ index.header().zip_crc }, kiln_common::hash::crc32(&bytes));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = vec![0u8; CacheHeader::SIZE];
        bytes[..4].copy_from_slice(b"NOPE");
        let err = CacheIndex::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::InvalidCacheMagic(m) if &m == b"NOPE"));
    }

    #[test]
    fn test_oversized_count_rejected() {
        let mut index = CacheIndex::new();
        index.add_file("only.bin", 30, 1);
        let mut bytes = Vec::new();
        index.write_to(&mut bytes).unwrap();

        // num_files
        bytes[12..16].copy_from_slice(&u32::MAX.to_le_bytes());
        let err = CacheIndex::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == std::io::ErrorKind::UnexpectedEof));
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(sidecar_path("out/data.zip"), PathBuf::from("out/data.zip.cache"));
    }
}

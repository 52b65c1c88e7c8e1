//! Binary reflection schema (`reflector.io`).
//!
//! Persists class and enum descriptors so they can be reconstructed without
//! the Rust types that declared them. Reloaded descriptors are data only: they carry no
//! field accessors.
//!
//! Layout (all little-endian):
//!
//! ```text
//! header       magic "RFIO", version u16, flags u16, class count u32,
//!              enum count u32, pool offset u32, pool size u32
//! class table  class hash u32, name u32, field count u16, reserved u16
//! field table  one 40-byte record per field, classes in table order
//! enum table   enum hash u32, name u32, member count u32
//! member table name u32, value u64
//! string pool  NUL-terminated UTF-8 strings
//! ```
//!
//! String references are pool offsets; `u32::MAX` marks an absent string.

use std::io::{Read, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use kiln_common::{memchr::memchr, BinaryReader, JenHash};
use rustc_hash::FxHashMap;

use crate::{
    ClassDescriptor, Description, EnumDescriptor, EnumMember, Error, FieldDescriptor, FieldKind,
    Result,
};

const MAGIC: &[u8; 4] = b"RFIO";
const VERSION: u16 = 1;
const HEADER_SIZE: u32 = 24;
const CLASS_RECORD_SIZE: usize = 12;
const ENUM_RECORD_SIZE: usize = 12;
const MEMBER_RECORD_SIZE: usize = 12;
const NONE: u32 = u32::MAX;

/// An ordered set of class and enum descriptors.
#[derive(Debug, Clone, Default)]
pub struct ReflectorSchema {
    pub classes: Vec<ClassDescriptor>,
    pub enums: Vec<EnumDescriptor>,
}

/// Deduplicating string pool.
#[derive(Debug, Default)]
struct StringPool {
    data: Vec<u8>,
    offsets: FxHashMap<String, u32>,
}

impl StringPool {
    /// Add a string and return its offset.
    fn add(&mut self, s: &str) -> u32 {
        if let Some(&offset) = self.offsets.get(s) {
            return offset;
        }

        let offset = self.data.len() as u32;
        self.data.extend_from_slice(s.as_bytes());
        self.data.push(0);
        self.offsets.insert(s.to_string(), offset);
        offset
    }

    fn add_opt(&mut self, s: Option<&str>) -> u32 {
        s.map_or(NONE, |s| self.add(s))
    }
}

/// Resolve a pool offset to a string.
fn pool_str(pool: &[u8], offset: u32) -> Result<Option<String>> {
    if offset == NONE {
        return Ok(None);
    }

    let start = offset as usize;
    let tail = pool.get(start..).ok_or(Error::StringOffsetOutOfBounds {
        offset,
        size: pool.len(),
    })?;
    let end = memchr(0, tail).unwrap_or(tail.len());
    let s = std::str::from_utf8(&tail[..end]).map_err(kiln_common::Error::from)?;
    Ok(Some(s.to_string()))
}

fn required_str(pool: &[u8], offset: u32) -> Result<String> {
    Ok(pool_str(pool, offset)?.unwrap_or_default())
}

impl ReflectorSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a copy of a class descriptor.
    pub fn add_class(&mut self, class: &ClassDescriptor) -> &mut Self {
        self.classes.push(class.clone());
        self
    }

    pub fn add_enum(&mut self, descriptor: &EnumDescriptor) -> &mut Self {
        self.enums.push(descriptor.clone());
        self
    }

    /// Find a class by hash.
    pub fn class(&self, hash: JenHash) -> Option<&ClassDescriptor> {
        self.classes.iter().find(|c| c.class_hash == hash)
    }

    /// Serialize to a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        let mut pool = StringPool::default();
        let mut tables = Vec::new();

        for class in &self.classes {
            tables.write_u32::<LittleEndian>(class.class_hash.raw())?;
            tables.write_u32::<LittleEndian>(pool.add(&class.class_name))?;
            tables.write_u16::<LittleEndian>(class.fields.len() as u16)?;
            tables.write_u16::<LittleEndian>(0)?;
        }

        for class in &self.classes {
            for (i, field) in class.fields.iter().enumerate() {
                tables.write_u8(field.kind as u8)?;
                tables.write_u8(field.sub_kind as u8)?;
                tables.write_u8(field.sub_size)?;
                tables.write_u8(0)?;
                tables.write_u16::<LittleEndian>(field.index)?;
                tables.write_u16::<LittleEndian>(field.num_items)?;
                tables.write_u16::<LittleEndian>(field.size)?;
                tables.write_u16::<LittleEndian>(field.offset)?;
                tables.write_u32::<LittleEndian>(field.name_hash.raw())?;
                tables.write_u32::<LittleEndian>(field.type_hash)?;

                let name = class.names.get(i).and_then(Option::as_deref);
                let alias_hash = class.alias_hashes.get(i).copied().flatten();
                let description = class.description(i);
                tables.write_u32::<LittleEndian>(pool.add_opt(name))?;
                tables.write_u32::<LittleEndian>(pool.add_opt(class.alias(i)))?;
                tables.write_u32::<LittleEndian>(alias_hash.map_or(0, JenHash::raw))?;
                tables.write_u32::<LittleEndian>(
                    pool.add_opt(description.map(|d| d.part1.as_str())),
                )?;
                tables.write_u32::<LittleEndian>(
                    pool.add_opt(description.map(|d| d.part2.as_str())),
                )?;
            }
        }

        for descriptor in &self.enums {
            tables.write_u32::<LittleEndian>(descriptor.hash.raw())?;
            tables.write_u32::<LittleEndian>(pool.add(&descriptor.name))?;
            tables.write_u32::<LittleEndian>(descriptor.members.len() as u32)?;
        }

        for descriptor in &self.enums {
            for member in &descriptor.members {
                tables.write_u32::<LittleEndian>(pool.add(&member.name))?;
                tables.write_u64::<LittleEndian>(member.value)?;
            }
        }

        writer.write_all(MAGIC)?;
        writer.write_u16::<LittleEndian>(VERSION)?;
        writer.write_u16::<LittleEndian>(0)?;
        writer.write_u32::<LittleEndian>(self.classes.len() as u32)?;
        writer.write_u32::<LittleEndian>(self.enums.len() as u32)?;
        writer.write_u32::<LittleEndian>(HEADER_SIZE + tables.len() as u32)?;
        writer.write_u32::<LittleEndian>(pool.data.len() as u32)?;
        writer.write_all(&tables)?;
        writer.write_all(&pool.data)?;
        Ok(())
    }

    /// Serialize to a byte vector.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.write_to(&mut data)?;
        Ok(data)
    }

    /// Load from a reader.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Parse from a byte slice.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        reader
            .expect_magic(MAGIC)
            .map_err(|_| Error::InvalidSchemaMagic)?;

        let version = reader.read_u16()?;
        if version != VERSION {
            return Err(Error::UnsupportedSchemaVersion(version));
        }
        let _flags = reader.read_u16()?;
        let class_count = reader.read_u32()? as usize;
        let enum_count = reader.read_u32()? as usize;
        let pool_offset = reader.read_u32()? as usize;
        let pool_size = reader.read_u32()? as usize;

        let pool = {
            let mut pool_reader = BinaryReader::new(data);
            pool_reader.seek(pool_offset);
            pool_reader.read_bytes(pool_size)?
        };

        let mut headers = Vec::with_capacity(class_count.min(reader.remaining() / CLASS_RECORD_SIZE));
        for _ in 0..class_count {
            let hash = reader.read_u32()?;
            let name = reader.read_u32()?;
            let field_count = reader.read_u16()?;
            let _reserved = reader.read_u16()?;
            headers.push((hash, name, field_count));
        }

        let mut classes = Vec::with_capacity(headers.len());
        for (hash, name, field_count) in headers {
            let mut class = ClassDescriptor {
                class_hash: JenHash::from_raw(hash),
                class_name: required_str(pool, name)?,
                ..Default::default()
            };

            for _ in 0..field_count {
                Self::read_field(&mut reader, pool, &mut class)?;
            }
            classes.push(class);
        }

        let mut enum_headers = Vec::with_capacity(enum_count.min(reader.remaining() / ENUM_RECORD_SIZE));
        for _ in 0..enum_count {
            let hash = reader.read_u32()?;
            let name = reader.read_u32()?;
            let member_count = reader.read_u32()?;
            enum_headers.push((hash, name, member_count));
        }

        let mut enums = Vec::with_capacity(enum_headers.len());
        for (hash, name, member_count) in enum_headers {
            let capacity = (member_count as usize).min(reader.remaining() / MEMBER_RECORD_SIZE);
            let mut members = Vec::with_capacity(capacity);
            for _ in 0..member_count {
                let name = reader.read_u32()?;
                let value = reader.read_u64()?;
                members.push(EnumMember {
                    name: required_str(pool, name)?,
                    value,
                });
            }
            enums.push(EnumDescriptor {
                hash: JenHash::from_raw(hash),
                name: required_str(pool, name)?,
                members,
            });
        }

        Ok(Self { classes, enums })
    }

    fn read_field(reader: &mut BinaryReader<'_>, pool: &[u8], class: &mut ClassDescriptor) -> Result<()> {
        let kind = read_kind(reader)?;
        let sub_kind = read_kind(reader)?;
        let sub_size = reader.read_u8()?;
        let _reserved = reader.read_u8()?;

        class.fields.push(FieldDescriptor {
            kind,
            sub_kind,
            sub_size,
            index: reader.read_u16()?,
            num_items: reader.read_u16()?,
            size: reader.read_u16()?,
            offset: reader.read_u16()?,
            name_hash: JenHash::from_raw(reader.read_u32()?),
            type_hash: reader.read_u32()?,
            accessors: None,
        });

        let name = pool_str(pool, reader.read_u32()?)?;
        let alias = pool_str(pool, reader.read_u32()?)?;
        let alias_hash = reader.read_u32()?;
        let part1 = pool_str(pool, reader.read_u32()?)?;
        let part2 = pool_str(pool, reader.read_u32()?)?;

        class.names.push(name);
        class
            .alias_hashes
            .push(alias.as_ref().map(|_| JenHash::from_raw(alias_hash)));
        class.aliases.push(alias);
        class.descriptions.push(part1.map(|part1| Description {
            part1,
            part2: part2.unwrap_or_default(),
        }));
        Ok(())
    }
}

fn read_kind(reader: &mut BinaryReader<'_>) -> Result<FieldKind> {
    let tag = reader.read_u8()?;
    FieldKind::from_u8(tag).ok_or(Error::InvalidKind(tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_pool_dedup() {
        let mut pool = StringPool::default();
        let a = pool.add("alpha");
        let b = pool.add("beta");
        assert_eq!(pool.add("alpha"), a);
        assert_eq!(pool_str(&pool.data, b).unwrap().as_deref(), Some("beta"));
        assert_eq!(pool_str(&pool.data, NONE).unwrap(), None);
    }

    #[test]
    fn test_rejects_bad_header() {
        assert!(matches!(
            ReflectorSchema::from_bytes(b"NOPE\x01\x00"),
            Err(Error::InvalidSchemaMagic)
        ));

        let mut data = ReflectorSchema::new().to_bytes().unwrap();
        data[4] = 9;
        assert!(matches!(
            ReflectorSchema::from_bytes(&data),
            Err(Error::UnsupportedSchemaVersion(9))
        ));
    }

    #[test]
    fn test_oversized_counts_rejected() {
        let empty = ReflectorSchema::new().to_bytes().unwrap();
        for at in [8, 12] {
            let mut data = empty.clone();
            data[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
            assert!(matches!(
                ReflectorSchema::from_bytes(&data),
                Err(Error::Common(kiln_common::Error::UnexpectedEof { .. }))
            ));
        }

        let mut schema = ReflectorSchema::new();
        schema.add_enum(&EnumDescriptor::new("Tint", &[("Warm", 0), ("Cold", 1)]));
        let mut data = schema.to_bytes().unwrap();
        let at = HEADER_SIZE as usize + 8;
        assert_eq!(&data[at..at + 4], &2u32.to_le_bytes());
        data[at..at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(ReflectorSchema::from_bytes(&data).is_err());
    }

    #[test]
    fn test_empty_schema_round_trip() {
        let data = ReflectorSchema::new().to_bytes().unwrap();
        assert_eq!(data.len(), HEADER_SIZE as usize);
        let schema = ReflectorSchema::from_bytes(&data).unwrap();
        assert!(schema.classes.is_empty());
        assert!(schema.enums.is_empty());
    }
}

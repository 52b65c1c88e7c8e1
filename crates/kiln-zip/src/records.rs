//! ZIP record layouts.
//!
//! Every record is written as its 4-byte signature followed by the packed
//! struct. Values that do not fit their field are stored as the all-ones
//! sentinel and carried in a ZIP64 extra field instead.

use std::io::Write;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Version written to "made by" and "needed to extract" of entries.
pub const VERSION: u16 = 10;

/// Version needed for ZIP64 end records.
pub const VERSION_ZIP64: u16 = 45;

/// Compression method "stored".
pub const METHOD_STORE: u16 = 0;

/// General purpose flag: names are UTF-8.
pub const FLAG_UTF8: u16 = 0x0800;

/// Extra field IDs.
pub mod extra_field {
    /// ZIP64 extended information extra field.
    pub const ZIP64: u16 = 0x0001;
    /// Cache checkpoint ("CS").
    pub const CACHE: u16 = 0x4353;
    /// Placeholder for a local ZIP64 field that turned out not to be needed ("ZP").
    pub const PADDING: u16 = 0x505A;

    /// Bytes reserved after every local header name: a ZIP64 field holding
    /// both sizes.
    pub const LOCAL_RESERVED: u16 = 20;
}

/// Local File Header (without signature).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct LocalFileHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    /// DOS time in the low half, DOS date in the high half.
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
}

impl LocalFileHeader {
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

    pub const SIGNATURE: u32 = 0x04034b50;

    /// Size including the signature.
    pub const SIZE: u64 = 30;
}

/// Central Directory File Header (without signature).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct CentralDirectoryHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub compression_method: u16,
    pub last_modified: u32,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub file_name_length: u16,
    pub extra_field_length: u16,
    pub file_comment_length: u16,
    pub disk_number_start: u16,
    pub internal_attrs: u16,
    pub external_attrs: u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryHeader {
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x01, 0x02];

    pub const SIGNATURE: u32 = 0x02014b50;

    /// Offset of `extra_field_length` from the start of the signature.
    pub const EXTRA_LENGTH_OFFSET: usize = 30;
}

/// End of Central Directory Record (without signature).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct EocdRecord {
    pub disk_number: u16,
    pub central_dir_disk: u16,
    pub central_dir_count_disk: u16,
    pub central_dir_count_total: u16,
    pub central_dir_size: u32,
    pub central_dir_offset: u32,
    pub comment_length: u16,
}

impl EocdRecord {
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x05, 0x06];

    pub const SIGNATURE: u32 = 0x06054b50;
}

/// ZIP64 End of Central Directory Record (without signature).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Eocd64Record {
    /// Size of the rest of this record (44).
    pub record_size: u64,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub disk_number: u32,
    pub central_dir_disk: u32,
    pub central_dir_count_disk: u64,
    pub central_dir_count_total: u64,
    pub central_dir_size: u64,
    pub central_dir_offset: u64,
}

impl Eocd64Record {
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x06, 0x06];

    pub const SIGNATURE: u32 = 0x06064b50;

    pub const RECORD_SIZE: u64 = 44;
}

/// ZIP64 End of Central Directory Locator (without signature).
#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct Eocd64Locator {
    pub zip64_eocd_disk: u32,
    pub zip64_eocd_offset: u64,
    pub total_disks: u32,
}

impl Eocd64Locator {
    pub const MAGIC: [u8; 4] = [0x50, 0x4b, 0x06, 0x07];

    pub const SIGNATURE: u32 = 0x07064b50;
}

/// Write a signature and record, returning the number of bytes written.
pub(crate) fn write_record<W: Write, T: IntoBytes + Immutable>(
    out: &mut W,
    magic: &[u8; 4],
    record: &T,
) -> std::io::Result<u64> {
    out.write_all(magic)?;
    out.write_all(record.as_bytes())?;
    Ok((magic.len() + record.as_bytes().len()) as u64)
}

/// Narrow a value to u32, storing the sentinel and flagging ZIP64 if it
/// does not fit.
#[inline]
pub(crate) fn fit_u32(value: u64, zip64: &mut bool) -> u32 {
    if value >= u32::MAX as u64 {
        *zip64 = true;
        u32::MAX
    } else {
        value as u32
    }
}

/// Narrow a value to u16, storing the sentinel and flagging ZIP64 if it
/// does not fit.
#[inline]
pub(crate) fn fit_u16(value: u64, zip64: &mut bool) -> u16 {
    if value >= u16::MAX as u64 {
        *zip64 = true;
        u16::MAX
    } else {
        value as u16
    }
}

//! GLB container layout and buffer URI rules.

use std::path::{Path, PathBuf};

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{Error, Result};

/// `glTF`
pub const GLB_MAGIC: u32 = 0x46546C67;

pub const GLB_VERSION: u32 = 2;

/// `JSON`
pub const CHUNK_JSON: u32 = 0x4E4F534A;

/// `BIN\0`
pub const CHUNK_BIN: u32 = 0x004E4942;

pub const MIME_APPLICATION_OCTET: &str = "data:application/octet-stream;base64";
pub const MIME_GLTF_BUFFER: &str = "data:application/gltf-buffer;base64";
pub const MIME_IMAGE_PNG: &str = "data:image/png;base64";
pub const MIME_IMAGE_JPEG: &str = "data:image/jpeg;base64";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct ChunkHeader {
    pub length: u32,
    pub chunk_type: u32,
}

impl ChunkHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// The 12-byte container header followed by the JSON chunk header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct GlbHeader {
    pub magic: u32,
    pub version: u32,
    /// Total file length.
    pub length: u32,
    pub json: ChunkHeader,
}

impl GlbHeader {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub(crate) fn new(length: u32, json_length: u32) -> Self {
        Self {
            magic: GLB_MAGIC,
            version: GLB_VERSION,
            length,
            json: ChunkHeader {
                length: json_length,
                chunk_type: CHUNK_JSON,
            },
        }
    }
}

/// Round up to the 4-byte chunk alignment, `None` past `u32::MAX`.
#[inline]
pub(crate) const fn padded(length: u32) -> Option<u32> {
    match length.checked_add(3) {
        Some(length) => Some(length & !3),
        None => None,
    }
}

/// Total container length for padded chunk payloads.
pub(crate) fn container_length(json_padded: u32, bin_padded: u32) -> Option<u32> {
    (GlbHeader::SIZE as u32 + ChunkHeader::SIZE as u32)
        .checked_add(json_padded)?
        .checked_add(bin_padded)
}

/// Directory a document's relative URIs resolve against.
pub fn document_root(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Resolve a relative buffer URI, rejecting traversal and absolute paths.
pub fn buffer_uri_path(root: &Path, uri: &str) -> Result<PathBuf> {
    if uri.is_empty() || uri.contains("..") || uri.starts_with('/') || uri.starts_with('\\') {
        return Err(Error::new("Invalid buffer.uri value").with_value(uri));
    }
    Ok(root.join(uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        assert_eq!(GlbHeader::SIZE, 20);
        assert_eq!(ChunkHeader::SIZE, 8);
        assert_eq!(&GLB_MAGIC.to_le_bytes(), b"glTF");
        assert_eq!(&CHUNK_JSON.to_le_bytes(), b"JSON");
        assert_eq!(&CHUNK_BIN.to_le_bytes(), b"BIN\0");
    }

    #[test]
    fn test_padded() {
        assert_eq!(padded(0), Some(0));
        assert_eq!(padded(1), Some(4));
        assert_eq!(padded(4), Some(4));
        assert_eq!(padded(7), Some(8));
        assert_eq!(padded(0xFFFF_FFFC), Some(0xFFFF_FFFC));
        assert_eq!(padded(0xFFFF_FFFD), None);
        assert_eq!(padded(u32::MAX), None);
    }

    #[test]
    fn test_container_length() {
        assert_eq!(container_length(8, 4), Some(40));
        assert_eq!(container_length(0x100, 0xFFFF_FF00), None);
        assert_eq!(container_length(0, u32::MAX - 28), Some(u32::MAX));
    }

    #[test]
    fn test_uri_traversal_rejected() {
        let root = Path::new("models");
        for uri in ["../secret.bin", "a/../../b.bin", "/etc/passwd", "\\share\\x.bin", ""] {
            let err = buffer_uri_path(root, uri).unwrap_err();
            assert_eq!(err.value(), Some(uri));
        }
        assert_eq!(
            buffer_uri_path(root, "mesh.bin").unwrap(),
            Path::new("models").join("mesh.bin")
        );
    }
}

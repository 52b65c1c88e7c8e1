//! Error types for the ZIP crate.

use thiserror::Error;

/// Errors that can occur when writing or merging archives.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] kiln_common::Error),

    /// Invalid record signature.
    #[error("invalid ZIP signature: expected {expected:#010x}, got {actual:#010x}")]
    InvalidSignature { expected: u32, actual: u32 },

    /// Entry name does not fit the 16-bit length field.
    #[error("entry name too long: {0} bytes")]
    NameTooLong(usize),

    /// Data was sent with no open entry.
    #[error("no open file entry")]
    NoOpenFile,

    /// Part entries disagree with its data offsets.
    #[error("corrupt part archive: {0}")]
    CorruptPart(String),

    /// Cache sidecar magic mismatch.
    #[error("invalid cache magic: {0:?}")]
    InvalidCacheMagic([u8; 4]),

    /// Unsupported cache version.
    #[error("unsupported cache version: {0}")]
    UnsupportedCacheVersion(u32),
}

/// Result type for ZIP operations.
pub type Result<T> = std::result::Result<T, Error>;

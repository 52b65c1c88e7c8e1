//! Error types for reflection access.

use thiserror::Error;

use crate::FieldKind;

/// Errors that can occur when accessing reflected values or schemas.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error.
    #[error("{0}")]
    Common(#[from] kiln_common::Error),

    /// Field index is past the end of the class table.
    #[error("field index {index} out of range (class has {count} fields)")]
    FieldIndexOutOfRange { index: usize, count: usize },

    /// No field matches the requested name or alias hash.
    #[error("no field with hash {0:#010x}")]
    FieldNotFound(u32),

    /// Array element, vector axis or flag is out of range.
    #[error("sub-index {index} out of range for field {field}")]
    SubIndexOutOfRange { field: String, index: usize },

    /// Nested class type hash has no registered descriptor.
    #[error("class not registered: {0:#010x}")]
    ClassNotRegistered(u32),

    /// Enum type hash has no registered descriptor.
    #[error("enum not registered: {0:#010x}")]
    EnumNotRegistered(u32),

    /// Symbolic enum value is not a member of the enum.
    #[error("`{value}` is not a member of enum {name}")]
    UnknownEnumMember { name: String, value: String },

    /// The field kind has no text form (classes must be recursed into).
    #[error("{0:?} fields are not value convertible")]
    NotValueConvertible(FieldKind),

    /// The field is not a class or array of classes.
    #[error("field {0} is not a sub-class")]
    NotSubClass(String),

    /// Descriptor was loaded from a schema and has no accessors.
    #[error("field {0} has no accessors")]
    NoAccessor(String),

    /// Instance type does not match the class descriptor.
    #[error("instance does not match class {0}")]
    InstanceMismatch(String),

    /// Schema header magic mismatch.
    #[error("invalid schema magic")]
    InvalidSchemaMagic,

    /// Unsupported schema version.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchemaVersion(u16),

    /// Unknown raw field kind tag.
    #[error("invalid field kind tag: {0}")]
    InvalidKind(u8),

    /// String pool offset out of bounds.
    #[error("string offset {offset} out of bounds (pool size: {size})")]
    StringOffsetOutOfBounds { offset: u32, size: usize },
}

/// Result type for reflection operations.
pub type Result<T> = std::result::Result<T, Error>;

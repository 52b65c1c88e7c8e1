//! Error types for XML reading and writing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur when converting between XML and reflected classes.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Reflection error (unregistered class, unknown enum member, ...).
    #[error("{0}")]
    Reflect(#[from] kiln_reflect::Error),

    /// XML parsing or writing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// The config file stayed locked through every retry.
    #[error("cannot access config {}: file is locked", path.display())]
    ConfigLocked { path: PathBuf },
}

/// Result type for XML operations.
pub type Result<T> = std::result::Result<T, Error>;

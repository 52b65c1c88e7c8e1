//! The single "invalid document" error of the GLTF codec.

use std::borrow::Cow;

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An invalid or unreadable GLTF document.
///
/// Carries a human-readable reason, the offending raw value where there is
/// one, and the lower-level cause (I/O, JSON) when the failure came from
/// below.
#[derive(Debug, Error)]
#[error("{reason}{}", suffix(.value))]
pub struct Error {
    reason: Cow<'static, str>,
    value: Option<String>,
    #[source]
    source: Option<BoxError>,
}

fn suffix(value: &Option<String>) -> String {
    value.as_ref().map(|v| format!(" : {v}")).unwrap_or_default()
}

impl Error {
    pub fn new(reason: impl Into<Cow<'static, str>>) -> Self {
        Self {
            reason: reason.into(),
            value: None,
            source: None,
        }
    }

    /// Attach the offending raw value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Attach the underlying cause.
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Whether the failure came from the underlying stream.
    pub fn is_io(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is::<std::io::Error>())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new("I/O error").with_source(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::new("invalid glTF document").with_source(e)
    }
}

/// Result type for GLTF operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Error::new("Invalid GLB header").to_string(), "Invalid GLB header");
        assert_eq!(
            Error::new("Invalid buffer.uri value").with_value("../x.bin").to_string(),
            "Invalid buffer.uri value : ../x.bin"
        );
    }

    #[test]
    fn test_source_kept() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        let err = Error::from(io);
        assert!(err.is_io());
        assert!(std::error::Error::source(&err).is_some());
    }
}

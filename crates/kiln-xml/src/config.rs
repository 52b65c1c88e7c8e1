//! Settings files.
//!
//! A settings file holds one top-level element per section (`common` plus
//! one per tool). Sections are read with [`load_v2`] and written with
//! [`save_v2`] using string attributes. Another process may hold the file
//! open, so access is retried briefly before giving up.

use std::io;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use kiln_reflect::{ReflectedMut, ReflectedRef};
use tracing::debug;

use crate::codec::{load_v2, save_v2, SaveFlags};
use crate::{Error, Result, XmlNode};

/// Number of attempts before a locked file is a fatal error.
pub const MAX_TRIES: usize = 10;

/// Pause between attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(5);

/// Name of the shared settings section.
pub const COMMON_SECTION: &str = "common";

fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::WouldBlock
    )
}

/// Run a file operation, retrying while the file is locked.
fn with_retry<T>(path: &Path, mut op: impl FnMut() -> io::Result<T>) -> Result<T> {
    for attempt in 1..=MAX_TRIES {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if is_transient(&err) => {
                debug!(path = %path.display(), attempt, "config file busy, retrying");
                sleep(RETRY_DELAY);
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(Error::ConfigLocked {
        path: path.to_path_buf(),
    })
}

/// A settings file and its parsed document.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    document: XmlNode,
}

impl ConfigFile {
    /// Open a settings file. A missing file yields an empty document.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = with_retry(&path, || match std::fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err),
        })?;

        let document = match text {
            Some(text) if !text.trim().is_empty() => XmlNode::parse_document(&text)?,
            _ => XmlNode::document(),
        };

        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &XmlNode {
        &self.document
    }

    /// Load a section into a reflected instance.
    ///
    /// Returns false if the section does not exist.
    pub fn load_section(&self, name: &str, instance: &mut ReflectedMut<'_>) -> Result<bool> {
        match self.document.find_child(name) {
            Some(node) => load_v2(instance, node, false),
            None => Ok(false),
        }
    }

    /// Store a reflected instance as a section, creating it if needed.
    pub fn store_section(&mut self, name: &str, instance: ReflectedRef<'_>) -> Result<()> {
        let node = self.document.child_or_insert(name);
        save_v2(instance, node, SaveFlags::default().with_string_as_attribute())
    }

    /// Write the document back to its path.
    pub fn save(&self) -> Result<()> {
        let xml = self.document.to_xml_string()?;
        with_retry(&self.path, || std::fs::write(&self.path, xml.as_bytes()))?;
        debug!(path = %self.path.display(), "wrote config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_gives_up_when_locked() {
        let mut calls = 0;
        let result: Result<()> = with_retry(Path::new("locked.config"), || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        });

        assert!(matches!(result, Err(Error::ConfigLocked { .. })));
        assert_eq!(calls, MAX_TRIES);
    }

    #[test]
    fn test_retry_recovers() {
        let mut calls = 0;
        let result = with_retry(Path::new("busy.config"), || {
            calls += 1;
            if calls < 3 {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            } else {
                Ok(calls)
            }
        });

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = with_retry(Path::new("bad.config"), || {
            calls += 1;
            Err(io::Error::from(io::ErrorKind::InvalidData))
        });

        assert!(matches!(result, Err(Error::Io(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConfigFile::open(dir.path().join("kiln.config")).unwrap();
        assert!(config.document().children.is_empty());
    }
}

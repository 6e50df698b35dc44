//! Version record storage.
//!
//! The current release version lives in a single plain-text file
//! (`VERSION` by default) containing `major.minor.patch`. Writes go to a
//! temporary file in the same directory which is then renamed over the
//! record, so a failed write leaves the previous value intact.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::version::{VersionError, parse_version};

/// Errors from version storage.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No version record exists.
    #[error("no version record at {0}")]
    NotFound(String),

    /// The record exists but does not hold a valid version.
    #[error("invalid version record at {path}: {source}")]
    Invalid {
        /// Location of the record.
        path: String,
        /// Parse failure.
        source: VersionError,
    },

    /// Reading or writing the record failed.
    #[error("version record I/O failed at {path}: {source}")]
    Io {
        /// Location of the record.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Read/write access to the persisted release version.
pub trait VersionStore {
    /// The current version. Fails with [`StoreError::NotFound`] when empty.
    fn current(&self) -> StoreResult<Version>;

    /// Overwrite the record. Either fully succeeds or leaves the prior value.
    fn persist(&mut self, version: &Version) -> StoreResult<()>;

    /// Human-readable location of the record (for messages and hooks).
    fn location(&self) -> String;
}

/// A version record kept in a plain-text file.
#[derive(Debug, Clone)]
pub struct FileVersionStore {
    path: Utf8PathBuf,
}

impl FileVersionStore {
    /// Create a store backed by `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }
}

impl VersionStore for FileVersionStore {
    #[instrument(skip(self), fields(path = %self.path))]
    fn current(&self) -> StoreResult<Version> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.path.to_string()));
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.to_string(),
                    source,
                });
            }
        };

        if raw.trim().is_empty() {
            return Err(StoreError::NotFound(self.path.to_string()));
        }

        let version = parse_version(&raw).map_err(|source| StoreError::Invalid {
            path: self.path.to_string(),
            source,
        })?;
        debug!(%version, "read version record");
        Ok(version)
    }

    #[instrument(skip(self, version), fields(path = %self.path, %version))]
    fn persist(&mut self, version: &Version) -> StoreResult<()> {
        write_atomic(&self.path, &format!("{version}\n")).map_err(|source| StoreError::Io {
            path: self.path.to_string(),
            source,
        })?;
        debug!("persisted version record");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.to_string()
    }
}

/// Write `contents` to `path` via a sibling temporary file and rename.
pub(crate) fn write_atomic(path: &Utf8Path, contents: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> FileVersionStore {
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        FileVersionStore::new(dir.join("VERSION"))
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        assert!(matches!(store.current(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn blank_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.path(), "  \n").unwrap();
        assert!(matches!(store.current(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn reads_plain_version_with_newline() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.path(), "0.1.1\n").unwrap();
        assert_eq!(store.current().unwrap(), Version::new(0, 1, 1));
    }

    #[test]
    fn garbage_is_invalid() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        std::fs::write(store.path(), "one point two").unwrap();
        assert!(matches!(store.current(), Err(StoreError::Invalid { .. })));
    }

    #[test]
    fn persist_overwrites_record() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        std::fs::write(store.path(), "0.1.1\n").unwrap();

        store.persist(&Version::new(0, 2, 0)).unwrap();

        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "0.2.0\n");
        assert_eq!(store.current().unwrap(), Version::new(0, 2, 0));
    }

    #[test]
    fn persist_creates_missing_record() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_in(&tmp);
        store.persist(&Version::new(1, 0, 0)).unwrap();
        assert_eq!(store.current().unwrap(), Version::new(1, 0, 0));
    }

    #[test]
    fn failed_persist_leaves_no_partial_record() {
        let tmp = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(tmp.path()).unwrap();
        let mut store = FileVersionStore::new(dir.join("missing-dir").join("VERSION"));

        let result = store.persist(&Version::new(1, 0, 0));

        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert!(!store.path().exists());
    }
}

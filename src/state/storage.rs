//! Key-value persistence for client state.
//!
//! DESIGN
//! ======
//! [`TokenStore`] is the seam between the auth slot and wherever the token
//! actually lives. [`FileStore`] keeps a flat JSON object on disk, one entry
//! per key; [`MemoryStore`] is the in-process stand-in used by tests and by
//! callers that do not want anything written.

#[cfg(test)]
#[path = "storage_test.rs"]
mod storage_test;

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Errors produced by a [`TokenStore`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("{}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    /// The backing file exists but is not a JSON object of strings.
    #[error("{}: {source}", .path.display())]
    Format { path: PathBuf, source: serde_json::Error },

    /// Another thread panicked while holding the store lock.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Synchronous string key-value storage.
pub trait TokenStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: TokenStore + ?Sized> TokenStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key)
    }
}

// =============================================================================
// MEMORY
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// FILE
// =============================================================================

/// JSON-object file store. Every call re-reads the file so two processes
/// sharing a path see each other's writes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(source) => return Err(StorageError::Io { path: self.path.clone(), source }),
        };
        if raw.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&raw).map_err(|source| StorageError::Format { path: self.path.clone(), source })
    }

    /// Entries to start a write from, plus whether the file was unreadable.
    /// Unparsable content is discarded so the next write replaces it.
    fn read_entries_for_write(&self) -> Result<(BTreeMap<String, String>, bool), StorageError> {
        match self.read_entries() {
            Ok(entries) => Ok((entries, false)),
            Err(StorageError::Format { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "replacing unreadable token store");
                Ok((BTreeMap::new(), true))
            }
            Err(e) => Err(e),
        }
    }

    /// Write to a sibling temp file (mode 0600 on unix) and rename it over
    /// the target.
    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(io_error_at(&parent))?;

        let rendered = serde_json::to_string_pretty(entries)
            .map_err(|source| StorageError::Format { path: self.path.clone(), source })?;
        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(io_error_at(&parent))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(io_error_at(temp.path()))?;
        }
        temp.write_all(rendered.as_bytes()).map_err(io_error_at(temp.path()))?;
        temp.as_file().sync_all().map_err(io_error_at(temp.path()))?;
        temp.persist(&self.path).map_err(|e| StorageError::Io { path: self.path.clone(), source: e.error })?;
        Ok(())
    }
}

fn io_error_at(path: &Path) -> impl FnOnce(io::Error) -> StorageError + use<> {
    let path = path.to_path_buf();
    move |source| StorageError::Io { path, source }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let (mut entries, _) = self.read_entries_for_write()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_entries(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.lock.lock().map_err(|_| StorageError::Poisoned)?;
        let (mut entries, damaged) = self.read_entries_for_write()?;
        if entries.remove(key).is_none() && !damaged {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}

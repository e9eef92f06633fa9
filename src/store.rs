//! Persisted key/value storage for the session token.
//!
//! Plays the role browser local storage plays for a web console: one string
//! per key, surviving restarts when file-backed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::Error;

/// Fixed key the session token is persisted under.
pub const TOKEN_KEY: &str = "token";

/// Synchronous string store. Object-safe so sessions can hold `Arc<dyn TokenStore>`.
pub trait TokenStore: Send + Sync {
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// # Errors
    ///
    /// Returns [`Error::Store`] if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the backing storage cannot be updated.
    fn remove(&self, key: &str) -> Result<(), Error>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Store backed by a single JSON object file (`{"token": "..."}`).
///
/// A missing file reads as empty. Writes go to an owner-only sibling temp
/// file first and are renamed into place.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, Error> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(Error::Store(format!("{}: {e}", self.path.display()))),
        };
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw)
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), Error> {
        let parent = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::Store(format!("{}: {e}", parent.display())))?;
                parent
            }
            None => Path::new("."),
        };

        // Owner-only (0600 on unix) until renamed over the target.
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| Error::Store(format!("{}: {e}", parent.display())))?;
        serde_json::to_writer_pretty(tmp.as_file_mut(), entries)
            .map_err(|e| Error::Store(e.to_string()))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| Error::Store(format!("{}: {e}", tmp.path().display())))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Store(format!("{}: {}", self.path.display(), e.error)))?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let _guard = self.lock.lock();
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        entries.insert(key.to_owned(), value.to_owned());
        self.write_all(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        let _guard = self.lock.lock();
        let mut entries = self.read_all()?;
        if entries.remove(key).is_some() {
            self.write_all(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryTokenStore::new();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        store.set(TOKEN_KEY, "abc").unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap().as_deref(), Some("abc"));
        store.remove(TOKEN_KEY).unwrap();
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("session.json"));
        assert_eq!(store.get(TOKEN_KEY).unwrap(), None);
        store.remove(TOKEN_KEY).unwrap();
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        FileTokenStore::new(&path).set(TOKEN_KEY, "persisted").unwrap();

        let reopened = FileTokenStore::new(&path);
        assert_eq!(reopened.get(TOKEN_KEY).unwrap().as_deref(), Some("persisted"));
        reopened.remove(TOKEN_KEY).unwrap();
        assert_eq!(FileTokenStore::new(&path).get(TOKEN_KEY).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn file_store_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = FileTokenStore::new(&path);
        store.set(TOKEN_KEY, "secret").unwrap();
        store.set("other", "value").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            FileTokenStore::new(&path).get(TOKEN_KEY),
            Err(Error::Store(_))
        ));
    }
}

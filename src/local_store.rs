//! Local persisted key/value state.
//!
//! Holds the session, practice settings and selected tenant as JSON
//! strings under typed keys. `FileStore` keeps all keys in one JSON
//! document in the data directory; `MemoryStore` is the in-process variant.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StorageKey {
    Session,
    PracticeSettings,
    Tenant,
}

impl StorageKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Session => "medlinkx.session",
            Self::PracticeSettings => "medlinkx.practice_settings",
            Self::Tenant => "medlinkx.tenant",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Local store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Local store encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("Local store lock poisoned")]
    LockPoisoned,
}

pub trait LocalStore: Send + Sync {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError>;
    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: StorageKey) -> Result<(), StoreError>;
}

// ═══════════════════════════════════════════════════════════
// MemoryStore
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<StorageKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(values.get(&key).cloned())
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        values.insert(key, value.to_string());
        Ok(())
    }

    fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        let mut values = self.values.lock().map_err(|_| StoreError::LockPoisoned)?;
        values.remove(&key);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// FileStore
// ═══════════════════════════════════════════════════════════

/// JSON-file store. Every write replaces the file atomically
/// (temp file in the same directory, then rename).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "local_state.json";

    /// Store rooted in `dir`; the directory is created if needed.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(dir)?;
        Ok(Self {
            path: dir.join(Self::FILE_NAME),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// An unreadable document is treated as empty; the next write replaces it.
    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(values) => Ok(values),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Discarding unreadable local state: {e}");
                Ok(BTreeMap::new())
            }
        }
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(serde_json::to_string_pretty(values)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn modify(
        &self,
        change: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut values = self.read_all()?;
        change(&mut values);
        self.write_all(&values)
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: StorageKey) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key.as_str()))
    }

    fn set(&self, key: StorageKey, value: &str) -> Result<(), StoreError> {
        self.modify(|values| {
            values.insert(key.as_str().to_string(), value.to_string());
        })
    }

    fn remove(&self, key: StorageKey) -> Result<(), StoreError> {
        self.modify(|values| {
            values.remove(key.as_str());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_set_get_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get(StorageKey::Session).unwrap(), None);
        store.set(StorageKey::Session, "{}").unwrap();
        assert_eq!(store.get(StorageKey::Session).unwrap().as_deref(), Some("{}"));
        store.remove(StorageKey::Session).unwrap();
        store.remove(StorageKey::Session).unwrap();
        assert_eq!(store.get(StorageKey::Session).unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set(StorageKey::Tenant, "\"northside\"").unwrap();
            store.set(StorageKey::Session, "{\"a\":1}").unwrap();
        }
        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.get(StorageKey::Tenant).unwrap().as_deref(),
            Some("\"northside\"")
        );
        reopened.remove(StorageKey::Session).unwrap();
        assert_eq!(reopened.get(StorageKey::Session).unwrap(), None);
        assert!(reopened.get(StorageKey::Tenant).unwrap().is_some());
    }

    #[test]
    fn file_store_recovers_from_corrupted_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(store.path(), "{not json").unwrap();

        assert_eq!(store.get(StorageKey::Session).unwrap(), None);
        store.set(StorageKey::Session, "x").unwrap();
        assert_eq!(store.get(StorageKey::Session).unwrap().as_deref(), Some("x"));
    }

    #[test]
    fn file_store_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FileStore::open(&nested).unwrap();
        store.set(StorageKey::PracticeSettings, "{}").unwrap();
        assert!(nested.join(FileStore::FILE_NAME).exists());
    }
}

//! Durable key-value storage for values that must survive a restart.
//!
//! The checker only keeps one thing here: the timestamp of the last release
//! check, so the minimum interval between requests holds across runs.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Integer key-value store shared by every check attempt in the process.
pub trait KeyValueStore: Send + Sync {
    /// Returns the stored value, or `default` when the key is absent.
    fn get_int(&self, key: &str, default: i64) -> i64;

    /// Stores `value` under `key`.
    fn set_int(&self, key: &str, value: i64) -> Result<()>;
}

/// Store that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).copied())
            .unwrap_or(default)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_owned()))?;
        values.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Store persisted to a single file in postcard's compact binary format.
///
/// The whole map is loaded on open and rewritten on every write.
///
/// # Examples
///
/// ```no_run
/// use release_checker::{FileStore, KeyValueStore};
///
/// let store = FileStore::in_temp_dir();
/// store.set_int("answer", 42).unwrap();
/// assert_eq!(store.get_int("answer", 0), 42);
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<HashMap<String, i64>>,
}

impl FileStore {
    /// Opens (or lazily creates) the store at `path`.
    ///
    /// An unreadable or corrupt file is treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = load(&path);

        FileStore {
            path,
            values: Mutex::new(values),
        }
    }

    /// Opens the store at `{temp_dir}/release_checker_state.bin`.
    pub fn in_temp_dir() -> Self {
        Self::open(std::env::temp_dir().join("release_checker_state.bin"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load(path: &Path) -> HashMap<String, i64> {
    let Ok(data) = fs::read(path) else {
        debug!(path = %path.display(), "no existing state file");
        return HashMap::new();
    };

    match postcard::from_bytes::<HashMap<String, i64>>(&data) {
        Ok(values) => values,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable state file");
            HashMap::new()
        }
    }
}

impl KeyValueStore for FileStore {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .lock()
            .ok()
            .and_then(|values| values.get(key).copied())
            .unwrap_or(default)
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Store("file store lock poisoned".to_owned()))?;
        values.insert(key.to_owned(), value);

        let data = postcard::to_allocvec(&*values)
            .map_err(|e| Error::Store(format!("cannot serialize state: {e}")))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::fs(parent, e))?;
        }
        fs::write(&self.path, data).map_err(|e| Error::fs(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_returns_default_until_set() {
        let store = MemoryStore::new();
        assert_eq!(store.get_int("k", 7), 7);
        store.set_int("k", 11).unwrap();
        assert_eq!(store.get_int("k", 7), 11);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.bin");

        let store = FileStore::open(&path);
        store.set_int("last_check", 1_706_000_000).unwrap();
        drop(store);

        let reopened = FileStore::open(&path);
        assert_eq!(reopened.get_int("last_check", 0), 1_706_000_000);
        assert_eq!(reopened.get_int("other", -1), -1);
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        fs::write(&path, [0xff, 0xff, 0xff, 0xff, 0xff]).unwrap();

        let store = FileStore::open(&path);
        assert_eq!(store.get_int("last_check", 5), 5);

        store.set_int("last_check", 6).unwrap();
        assert_eq!(FileStore::open(&path).get_int("last_check", 5), 6);
    }
}

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::store::{KeyValueStore, StoreError};

/// Storage file name in cache directory
pub const STORAGE_FILE: &str = "storage.json";

/// Key/value store persisted as a single JSON object on disk.
///
/// Every write replaces the whole file through a rename, so `remove_all` is one
/// write and readers never see half of a logout or a truncated file. There is
/// no change notification across processes.
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(STORAGE_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<BTreeMap<String, String>, StoreError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn write_entries(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &contents)?;
        Ok(())
    }

    fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Unavailable("storage lock poisoned".to_string()))?;
        // A corrupt file is rewritten even when the mutation is a no-op
        let (mut entries, corrupt) = match self.read_entries() {
            Ok(entries) => (entries, false),
            Err(StoreError::Corrupt(e)) => {
                warn!(path = %self.path.display(), error = %e, "Storage file is corrupt, starting over");
                (BTreeMap::new(), true)
            }
            Err(e) => return Err(e),
        };
        if mutate(&mut entries) || corrupt {
            self.write_entries(&entries)?;
            debug!(path = %self.path.display(), "Storage file updated");
        }
        Ok(())
    }
}

/// Replace `path` with `contents` via a temporary file in the same directory.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path)?;
    Ok(())
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| StoreError::Unavailable("storage lock poisoned".to_string()))?;
        Ok(self.read_entries()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| entries.remove(key).is_some())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|entries| {
            let mut changed = false;
            for key in keys {
                changed |= entries.remove(*key).is_some();
            }
            changed
        })
    }
}

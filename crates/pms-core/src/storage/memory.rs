//! In-process origin storage.
//!
//! `SharedStorage` plays the role of the browser's per-origin storage area and
//! each `MemoryStore` is one tab looking at it. Writes through one handle are
//! broadcast to every other handle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use super::store::{ExternalChanges, KeyValueStore, OriginId, StorageEvent, StoreError};

/// Broadcast buffer for storage events
const EVENT_CHANNEL_CAPACITY: usize = 64;

struct Inner {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

#[derive(Clone)]
pub struct SharedStorage {
    inner: Arc<Inner>,
}

impl Default for SharedStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    /// Open a new handle (a "tab") onto this origin.
    pub fn open(&self) -> MemoryStore {
        MemoryStore {
            inner: self.inner.clone(),
            origin: OriginId::next(),
        }
    }
}

pub struct MemoryStore {
    inner: Arc<Inner>,
    origin: OriginId,
}

impl MemoryStore {
    /// A standalone store with its own private origin.
    pub fn new() -> Self {
        SharedStorage::new().open()
    }

    pub fn origin(&self) -> OriginId {
        self.origin
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.inner
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("storage lock poisoned".to_string()))
    }

    fn publish(&self, key: &str, old_value: Option<String>, new_value: Option<String>) {
        if old_value == new_value {
            return;
        }
        // No receivers is fine
        let _ = self.inner.events.send(StorageEvent {
            key: key.to_string(),
            old_value,
            new_value,
            origin: self.origin,
        });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let old = self.lock()?.insert(key.to_string(), value.to_string());
        self.publish(key, old, Some(value.to_string()));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let old = self.lock()?.remove(key);
        self.publish(key, old, None);
        Ok(())
    }

    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        let removed: Vec<(&str, Option<String>)> = {
            let mut entries = self.lock()?;
            keys.iter().map(|key| (*key, entries.remove(*key))).collect()
        };
        for (key, old) in removed {
            self.publish(key, old, None);
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<ExternalChanges> {
        Some(ExternalChanges::new(self.inner.events.subscribe(), self.origin))
    }
}

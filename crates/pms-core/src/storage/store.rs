use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::warn;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt storage contents: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keychain(#[from] keyring::Error),
}

/// Identifies the handle (tab, window, process) that caused a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginId(u64);

impl OriginId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A change to one key, as seen by the other handles of the same origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub origin: OriginId,
}

/// Stream of changes made by *other* handles.
///
/// Events caused by the subscribing handle itself are filtered out, matching
/// how a browser tab never receives its own `storage` events.
pub struct ExternalChanges {
    receiver: broadcast::Receiver<StorageEvent>,
    own_origin: OriginId,
}

impl ExternalChanges {
    pub fn new(receiver: broadcast::Receiver<StorageEvent>, own_origin: OriginId) -> Self {
        Self {
            receiver,
            own_origin,
        }
    }

    /// Wait for the next external change. Returns `None` once the origin is gone.
    pub async fn next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.origin == self.own_origin => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Storage listener lagged, skipping missed events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Synchronous, persistent key/value storage scoped to one origin.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Remove several keys as one logical operation.
    ///
    /// Backends that can do this atomically override it; the default removes
    /// the keys one at a time.
    fn remove_all(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }

    /// Subscribe to changes made through other handles, if the backend can
    /// observe them.
    fn subscribe(&self) -> Option<ExternalChanges> {
        None
    }
}

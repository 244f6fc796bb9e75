//! Persistent key/value storage shared by every handle of the same origin.
//!
//! This module provides:
//! - `KeyValueStore`: the synchronous storage contract
//! - `SharedStorage` / `MemoryStore`: in-process origin with one handle per tab
//! - `FileStore`: JSON file in the cache directory
//! - `KeyringStore`: OS keychain entries
//!
//! Only the in-memory origin broadcasts changes to other handles. The other
//! backends return `None` from `subscribe()` and the session layer falls back
//! to single-tab behavior.

pub mod file;
pub mod keychain;
pub mod memory;
pub mod store;

pub use file::FileStore;
pub use keychain::KeyringStore;
pub use memory::{MemoryStore, SharedStorage};
pub use store::{ExternalChanges, KeyValueStore, OriginId, StorageEvent, StoreError};

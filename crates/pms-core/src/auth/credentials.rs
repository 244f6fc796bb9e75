use std::sync::Arc;

use tracing::{debug, warn};

use crate::models::UserProfile;
use crate::storage::{ExternalChanges, KeyValueStore};

/// Storage key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Storage key holding the serialized user profile
pub const USER_KEY: &str = "user";

/// Owns the persisted credential: the bearer token and the cached profile.
///
/// Storage failures never escape from here. Reads degrade to "absent" and
/// writes are skipped, both with a warning.
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Store a freshly issued token, replacing any previous credential.
    ///
    /// Returns `false` when the token could not be persisted. A profile that
    /// fails to save only costs the cached display name.
    pub fn save(&self, token: &str, user: Option<&UserProfile>) -> bool {
        if let Err(e) = self.store.set(TOKEN_KEY, token) {
            warn!(error = %e, "Failed to store token");
            return false;
        }

        let result = match user {
            Some(user) => match serde_json::to_string(user) {
                Ok(blob) => self.store.set(USER_KEY, &blob),
                Err(e) => {
                    warn!(error = %e, "Failed to serialize user profile");
                    return true;
                }
            },
            None => self.store.remove(USER_KEY),
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to store user profile");
        }
        true
    }

    /// Current token, if one is stored and readable
    pub fn load(&self) -> Option<String> {
        match self.store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read token");
                None
            }
        }
    }

    /// Cached profile of the signed-in user
    pub fn user(&self) -> Option<UserProfile> {
        let blob = match self.store.get(USER_KEY) {
            Ok(blob) => blob?,
            Err(e) => {
                warn!(error = %e, "Failed to read user profile");
                return None;
            }
        };
        match serde_json::from_str(&blob) {
            Ok(user) => Some(user),
            Err(e) => {
                debug!(error = %e, "Ignoring unreadable user profile");
                None
            }
        }
    }

    /// Remove token and profile together
    pub fn clear(&self) {
        if let Err(e) = self.store.remove_all(&[TOKEN_KEY, USER_KEY]) {
            warn!(error = %e, "Failed to clear credentials");
        }
    }

    pub(crate) fn subscribe(&self) -> Option<ExternalChanges> {
        self.store.subscribe()
    }
}

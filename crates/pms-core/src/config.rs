//! Application configuration management.
//!
//! This module handles loading and saving the configuration, which holds the
//! API origin, the storage backend for the credential and the last email used
//! to sign in.
//!
//! Configuration is stored at `~/.config/pms/config.json`. The `PMS_API_BASE`
//! environment variable overrides the stored API origin.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::storage::file::write_atomic;
use crate::storage::{FileStore, KeyValueStore, KeyringStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "pms";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API origin
pub const API_BASE_ENV: &str = "PMS_API_BASE";

/// API origin used when nothing else is configured
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Where the credential is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub last_email: Option<String>,
    #[serde(default)]
    pub storage: StorageBackend,
}

impl Config {
    /// Load from the user's config directory; a missing file means defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    fn load_from(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_vec_pretty(self)?;
        write_atomic(path, &contents).with_context(|| format!("Failed to write {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        app_dir(dirs::config_dir(), "config").map(|dir| dir.join(CONFIG_FILE))
    }

    /// Directory for the storage file and `pms.log`
    pub fn cache_dir(&self) -> Result<PathBuf> {
        app_dir(dirs::cache_dir(), "cache")
    }

    /// API origin: environment first, then config, then the default.
    pub fn api_base(&self) -> String {
        let from_env = std::env::var(API_BASE_ENV).ok();
        resolve_api_base(from_env.as_deref(), self.api_base.as_deref())
    }

    /// Open the configured credential storage
    pub fn open_storage(&self) -> Result<Arc<dyn KeyValueStore>> {
        Ok(match self.storage {
            StorageBackend::File => Arc::new(FileStore::new(&self.cache_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStore::new()),
        })
    }
}

fn app_dir(base: Option<PathBuf>, kind: &str) -> Result<PathBuf> {
    base.map(|dir| dir.join(APP_NAME))
        .with_context(|| format!("Could not find the user {} directory", kind))
}

fn resolve_api_base(from_env: Option<&str>, from_config: Option<&str>) -> String {
    [from_env, from_config]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|base| !base.is_empty())
        .unwrap_or(DEFAULT_API_BASE)
        .trim_end_matches('/')
        .to_string()
}

//! Encrypted config store
//!
//! Load path: read blob → migrate on version mismatch → decrypt each
//! provider's key → normalize. Save path: normalize → encrypt each
//! provider's key → persist. Plaintext keys exist only in memory.
//!
//! Concurrency discipline is read-modify-write with last-writer-wins:
//! [`ConfigStore::update`] reloads the latest persisted blob, applies the
//! patch, and writes the whole document back. There is no optimistic-
//! concurrency token; the write window is narrow and writes are rare.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::PathBuf;
use tracing::{debug, warn};

use super::migration::migrate;
use super::model::{CONFIG_VERSION, Config};
use crate::core::providers::registry;
use crate::utils::crypto::{KeyCache, decrypt_with_key, encrypt_with_key};
use crate::utils::error::{GatewayError, Result};

/// Backend that persists the single JSON config blob
#[async_trait]
pub trait ConfigStorage: Send + Sync {
    /// Read the blob; `None` when nothing has been persisted yet
    async fn read(&self) -> Result<Option<String>>;
    /// Overwrite the blob
    async fn write(&self, blob: &str) -> Result<()>;
}

/// File-backed storage, one JSON document on disk
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConfigStorage for FileStorage {
    async fn read(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, blob: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, blob).await?;
        Ok(())
    }
}

/// In-memory storage for tests and embedding hosts
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blob: Mutex<Option<String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStorage for MemoryStorage {
    async fn read(&self) -> Result<Option<String>> {
        Ok(self.blob.lock().clone())
    }

    async fn write(&self, blob: &str) -> Result<()> {
        *self.blob.lock() = Some(blob.to_string());
        Ok(())
    }
}

/// Versioned, per-provider-encrypted configuration store
pub struct ConfigStore {
    storage: Box<dyn ConfigStorage>,
    keys: KeyCache,
}

impl ConfigStore {
    /// Create a store over any storage backend
    pub fn new(storage: Box<dyn ConfigStorage>) -> Self {
        Self {
            storage,
            keys: KeyCache::new(),
        }
    }

    /// Store backed by a JSON file
    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Box::new(FileStorage::new(path)))
    }

    /// Store backed by process memory
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStorage::new()))
    }

    /// The config created on first load, covering every registered provider
    pub fn default_config() -> Config {
        Config::default()
    }

    /// Load the config, migrating and decrypting as needed.
    ///
    /// An empty store yields the default config. A key that fails to decrypt
    /// (corrupt value, wrong salt) degrades to an empty credential; a damaged
    /// blob must never make config load fail.
    pub async fn load(&self) -> Result<Config> {
        let Some(blob) = self.storage.read().await? else {
            debug!("no persisted config, using defaults");
            return Ok(Self::default_config());
        };

        let raw: serde_json::Value = serde_json::from_str(&blob)?;
        let version = raw.get("version").and_then(serde_json::Value::as_u64);

        let mut config = if version == Some(CONFIG_VERSION as u64) {
            let mut config: Config = serde_json::from_value(raw)?;
            config.normalize();
            config
        } else {
            migrate(&raw)
        };

        self.decrypt_keys(&mut config);
        Ok(config)
    }

    /// Persist the config, encrypting every configured API key.
    pub async fn save(&self, config: &Config) -> Result<()> {
        let mut config = config.clone();
        config.normalize();
        config.version = CONFIG_VERSION;
        self.encrypt_keys(&mut config)?;

        let blob = serde_json::to_string_pretty(&config)?;
        self.storage.write(&blob).await
    }

    /// Read-modify-write: reload the latest persisted config, apply `patch`,
    /// persist, and return the patched config (plaintext keys).
    pub async fn update<F>(&self, patch: F) -> Result<Config>
    where
        F: FnOnce(&mut Config),
    {
        let mut config = self.load().await?;
        patch(&mut config);
        self.save(&config).await?;
        config.normalize();
        Ok(config)
    }

    fn decrypt_keys(&self, config: &mut Config) {
        for descriptor in registry::PROVIDERS {
            let Some(state) = config.models.get_mut(descriptor.id) else {
                continue;
            };
            if state.api_key.is_empty() {
                continue;
            }
            let key = self.keys.key_for(descriptor.id, &descriptor.key_salt);
            match decrypt_with_key(&key, &state.api_key) {
                Some(plaintext) => state.api_key = plaintext,
                None => {
                    warn!(
                        provider = descriptor.id,
                        "stored API key failed to decrypt; treating as unset"
                    );
                    state.api_key = String::new();
                }
            }
        }
    }

    fn encrypt_keys(&self, config: &mut Config) -> Result<()> {
        for descriptor in registry::PROVIDERS {
            let Some(state) = config.models.get_mut(descriptor.id) else {
                continue;
            };
            if state.api_key.is_empty() {
                continue;
            }
            let key = self.keys.key_for(descriptor.id, &descriptor.key_salt);
            state.api_key = encrypt_with_key(&key, &state.api_key)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore").finish_non_exhaustive()
    }
}

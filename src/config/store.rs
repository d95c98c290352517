//! Durable persistence for the update-state record.
//!
//! The host environment is expected to provide a small durable key-value
//! store (webview hosts typically keep it in `localStorage`). The
//! [`KeyValueStore`] trait is that boundary; [`FileKeyValueStore`] is the
//! default implementation, keeping one JSON file per key inside the data
//! directory.
//!
//! [`ConfigStore`] layers the typed [`CcsConfig`] on top: it serializes the
//! record under the fixed [`CONFIG_STORE_KEY`] and fails closed on
//! unparsable records. A corrupt blob yields a fresh default config (and a
//! warning) instead of a parse error, forcing a full re-download rather
//! than wedging the updater.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use crate::config::CcsConfig;
use crate::constants::CONFIG_STORE_KEY;
use crate::core::{CodeSwapError, Result};

/// Durable string key-value store provided by the host environment.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Durably write `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// File-backed [`KeyValueStore`] keeping one `<key>.json` file per key.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    /// Store records inside `dir`, which is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

#[async_trait]
impl KeyValueStore for FileKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CodeSwapError::StoreError {
                key: key.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir).await.map_err(|err| CodeSwapError::StoreError {
            key: key.to_string(),
            reason: err.to_string(),
        })?;

        // Write-then-rename so a crash mid-write never leaves a truncated record.
        let tmp = path.with_extension("json.tmp");
        let write = async {
            fs::write(&tmp, value).await?;
            fs::rename(&tmp, &path).await
        };
        write.await.map_err(|err| CodeSwapError::StoreError {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }
}

/// Typed load/save of the [`CcsConfig`] record over a [`KeyValueStore`].
#[derive(Clone)]
pub struct ConfigStore {
    store: Arc<dyn KeyValueStore>,
}

impl ConfigStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the persisted record, defaulting on absence and failing closed
    /// on unparsable content.
    pub async fn load(&self) -> Result<CcsConfig> {
        match self.store.get(CONFIG_STORE_KEY).await? {
            None => {
                debug!("no persisted update state, starting from default config");
                Ok(CcsConfig::default())
            }
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(config) => Ok(config),
                Err(err) => {
                    warn!(error = %err, "persisted update state is unparsable, discarding it");
                    Ok(CcsConfig::default())
                }
            },
        }
    }

    /// Serialize and durably write the record.
    pub async fn save(&self, config: &CcsConfig) -> Result<()> {
        let raw = serde_json::to_string(config)?;
        self.store.set(CONFIG_STORE_KEY, &raw).await
    }
}

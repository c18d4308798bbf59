//! Local key-value persistence and the remote → local → empty fallback

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::SyncError;
use crate::model::BudgetSnapshot;

/// Default store directory: .budgetsync/
pub const STORE_DIR: &str = ".budgetsync";

/// Key under which the last known snapshot is mirrored.
pub const BUDGET_PLAN_KEY: &str = "budget_plan";

/// A durable string key-value store.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError>;
    async fn set(&self, key: &str, value: String) -> Result<(), SyncError>;
    async fn remove(&self, key: &str) -> Result<(), SyncError>;
}

/// One JSON file per key under a directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `key`.
    pub fn key_path(&self, key: &str) -> Result<PathBuf, SyncError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(SyncError::persistence(format!("invalid store key {key:?}")));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

#[async_trait]
impl LocalStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        let path = self.key_path(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SyncError> {
        let path = self.key_path(key)?;
        tokio::fs::create_dir_all(&self.root).await?;

        // Write then rename so a crash never leaves a half-written mirror.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!("Stored {} at {}", key, path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SyncError> {
        let path = self.key_path(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process store. `set_unavailable(true)` makes every call fail.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, SyncError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SyncError::persistence("memory store marked unavailable"));
        }
        self.entries
            .lock()
            .map_err(|_| SyncError::persistence("memory store lock poisoned"))
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, SyncError> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), SyncError> {
        self.entries()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// Durable copy of the last known snapshot, served when the network is not.
#[derive(Clone)]
pub struct PersistenceFallback {
    store: Arc<dyn LocalStore>,
}

impl PersistenceFallback {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// The persisted snapshot, or the explicit empty snapshot. Never fails.
    pub async fn load(&self) -> BudgetSnapshot {
        match self.try_load().await {
            Ok(Some(snapshot)) => {
                tracing::info!("Serving locally persisted budget");
                snapshot
            }
            Ok(None) => {
                tracing::info!("No local budget stored; serving empty budget");
                BudgetSnapshot::empty()
            }
            Err(err) => {
                tracing::error!("Error reading local budget fallback: {}", err);
                BudgetSnapshot::empty()
            }
        }
    }

    pub async fn try_load(&self) -> Result<Option<BudgetSnapshot>, SyncError> {
        let Some(raw) = self.store.get(BUDGET_PLAN_KEY).await? else {
            return Ok(None);
        };
        let value: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| SyncError::parse(format!("local budget mirror: {e}")))?;
        BudgetSnapshot::from_local_value(&value).map(Some)
    }

    pub async fn save(&self, snapshot: &BudgetSnapshot) -> Result<(), SyncError> {
        let raw = snapshot.to_local_value().to_string();
        self.store.set(BUDGET_PLAN_KEY, raw).await
    }

    pub async fn clear(&self) -> Result<(), SyncError> {
        self.store.remove(BUDGET_PLAN_KEY).await
    }
}

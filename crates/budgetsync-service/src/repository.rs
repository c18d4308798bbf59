//! Read and write paths: cache, remote gateway, then the local mirror

use std::sync::Arc;
use std::time::Duration;

use budgetsync_core::{BudgetSnapshot, LocalStore, PersistenceFallback, SyncError};
use budgetsync_remote::{BudgetGateway, CacheStats, Lookup, SyncCache};
use budgetsync_watcher::SnapshotSource;
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Where a read was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadSource {
    Cache,
    Remote,
    /// The network failed and the local mirror answered.
    Local,
    /// The network failed and nothing was stored locally.
    Empty,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetRead {
    pub snapshot: BudgetSnapshot,
    pub source: ReadSource,
}

pub struct BudgetRepository {
    cache: SyncCache,
    fallback: PersistenceFallback,
}

impl BudgetRepository {
    pub fn new(gateway: Arc<dyn BudgetGateway>, store: Arc<dyn LocalStore>, ttl: Duration) -> Self {
        Self {
            cache: SyncCache::new(gateway, ttl),
            fallback: PersistenceFallback::new(store),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn BudgetGateway> {
        self.cache.gateway()
    }

    pub fn fallback(&self) -> &PersistenceFallback {
        &self.fallback
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Read through the cache. Network and payload failures resolve to the
    /// local mirror, then to the empty snapshot; this never fails.
    pub async fn read(&self, force_refresh: bool) -> BudgetRead {
        match self.cache.get(force_refresh).await {
            Ok(Lookup::Hit(snapshot)) => {
                debug!("Budget served from cache");
                BudgetRead { snapshot, source: ReadSource::Cache }
            }
            Ok(Lookup::Fetched(snapshot)) => {
                self.persist(&snapshot).await;
                BudgetRead { snapshot, source: ReadSource::Remote }
            }
            Err(e) => {
                warn!("Falling back to local budget: {}", e);
                self.read_local().await
            }
        }
    }

    async fn read_local(&self) -> BudgetRead {
        match self.fallback.try_load().await {
            Ok(Some(snapshot)) => BudgetRead { snapshot, source: ReadSource::Local },
            Ok(None) => BudgetRead { snapshot: BudgetSnapshot::empty(), source: ReadSource::Empty },
            Err(e) => {
                error!("Error reading local budget fallback: {}", e);
                BudgetRead { snapshot: BudgetSnapshot::empty(), source: ReadSource::Empty }
            }
        }
    }

    /// Push a snapshot to the server. On success the cache is invalidated
    /// and the confirmed snapshot mirrored locally.
    pub async fn write(&self, snapshot: &BudgetSnapshot) -> Result<BudgetSnapshot, SyncError> {
        let confirmed = self.gateway().update(snapshot).await.map_err(|e| {
            error!("Budget update failed: {}", e);
            e
        })?;

        self.cache.invalidate();
        self.persist(&confirmed).await;
        info!("Budget saved ({} categories)", confirmed.categories.len());
        Ok(confirmed)
    }

    /// Clear the server (best effort), the local mirror and the cache.
    pub async fn reset(&self) -> BudgetSnapshot {
        if let Err(e) = self.gateway().reset().await {
            warn!("Server reset failed, continuing with local reset: {}", e);
        }
        if let Err(e) = self.fallback.clear().await {
            warn!("Could not clear local budget: {}", e);
        }
        self.cache.invalidate();
        BudgetSnapshot::empty()
    }

    pub fn clear_cache(&self) {
        self.cache.invalidate();
    }

    async fn persist(&self, snapshot: &BudgetSnapshot) {
        if let Err(e) = self.fallback.save(snapshot).await {
            error!("Failed to mirror budget locally: {}", e);
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for BudgetRepository {
    async fn poll(&self) -> Result<BudgetSnapshot, SyncError> {
        let snapshot = self.cache.get(true).await?.into_snapshot();
        self.persist(&snapshot).await;
        Ok(snapshot)
    }

    async fn fallback(&self) -> Option<BudgetSnapshot> {
        Some(self.fallback.load().await)
    }
}

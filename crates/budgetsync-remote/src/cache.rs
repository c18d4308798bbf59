//! Short-lived snapshot cache in front of a gateway
//!
//! Concurrent misses share one in-flight fetch: callers queue on a fetch
//! gate and, once through it, reuse the result of any fetch that completed
//! while they waited.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use budgetsync_core::{BudgetSnapshot, SnapshotHash, SyncError, snapshot_hash};
use tokio::time::Instant;
use tracing::debug;

use super::gateway::BudgetGateway;

/// Cached snapshot with its fetch time
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub snapshot: BudgetSnapshot,
    pub hash: SnapshotHash,
    pub fetched_at: Instant,
}

impl CacheEntry {
    fn new(snapshot: BudgetSnapshot) -> Self {
        Self {
            hash: snapshot_hash(&snapshot),
            snapshot,
            fetched_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }
}

/// Where a snapshot came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Served from a fresh cache entry without touching the network.
    Hit(BudgetSnapshot),
    /// Fetched from the gateway, by this caller or one it coalesced with.
    Fetched(BudgetSnapshot),
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }

    pub fn snapshot(&self) -> &BudgetSnapshot {
        match self {
            Lookup::Hit(s) | Lookup::Fetched(s) => s,
        }
    }

    pub fn into_snapshot(self) -> BudgetSnapshot {
        match self {
            Lookup::Hit(s) | Lookup::Fetched(s) => s,
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub fetches: u64,
    pub coalesced: u64,
    pub has_entry: bool,
}

#[derive(Default)]
struct CacheState {
    entry: Option<CacheEntry>,
    /// Bumped by `invalidate`/`store`; fetches started under an older
    /// generation must not repopulate the entry.
    generation: u64,
    completed_fetches: u64,
    last_result: Option<(u64, Result<BudgetSnapshot, SyncError>)>,
    stats: CacheStats,
}

pub struct SyncCache {
    gateway: Arc<dyn BudgetGateway>,
    ttl: Duration,
    state: Mutex<CacheState>,
    fetch_gate: tokio::sync::Mutex<()>,
}

impl SyncCache {
    pub fn new(gateway: Arc<dyn BudgetGateway>, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            state: Mutex::new(CacheState::default()),
            fetch_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn gateway(&self) -> &Arc<dyn BudgetGateway> {
        &self.gateway
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn fresh(&self) -> Option<BudgetSnapshot> {
        let mut state = self.state();
        let snapshot = state
            .entry
            .as_ref()
            .filter(|entry| entry.is_fresh(self.ttl))
            .map(|entry| entry.snapshot.clone())?;
        state.stats.hits += 1;
        Some(snapshot)
    }

    /// Return a fresh cached snapshot, or fetch one. `force_refresh` skips
    /// the freshness check but still coalesces with a fetch in flight.
    /// Failed fetches leave the previous entry untouched.
    pub async fn get(&self, force_refresh: bool) -> Result<Lookup, SyncError> {
        if !force_refresh {
            if let Some(snapshot) = self.fresh() {
                return Ok(Lookup::Hit(snapshot));
            }
        }

        let ticket = self.state().completed_fetches;
        let _gate = self.fetch_gate.lock().await;

        let generation = {
            let mut state = self.state();
            if state.completed_fetches != ticket {
                let current = state.generation;
                if let Some((fetched_in, result)) = state.last_result.clone() {
                    if fetched_in == current {
                        state.stats.coalesced += 1;
                        debug!("Sharing budget fetch completed while waiting");
                        return result.map(Lookup::Fetched);
                    }
                }
            }
            state.generation
        };

        let result = self.gateway.fetch().await;

        let mut state = self.state();
        state.completed_fetches += 1;
        state.stats.fetches += 1;
        if let Ok(snapshot) = &result {
            if state.generation == generation {
                state.entry = Some(CacheEntry::new(snapshot.clone()));
            } else {
                debug!("Discarding budget fetched across an invalidation");
            }
        }
        state.last_result = Some((generation, result.clone()));
        result.map(Lookup::Fetched)
    }

    /// Drop the cached entry; the next `get` goes to the network.
    pub fn invalidate(&self) {
        let mut state = self.state();
        state.entry = None;
        state.generation += 1;
        state.last_result = None;
    }

    /// Seed the cache with a snapshot known to match the server.
    pub fn store(&self, snapshot: BudgetSnapshot) {
        let mut state = self.state();
        state.generation += 1;
        state.last_result = None;
        state.entry = Some(CacheEntry::new(snapshot));
    }

    /// The current entry regardless of age.
    pub fn peek(&self) -> Option<CacheEntry> {
        self.state().entry.clone()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state();
        CacheStats {
            has_entry: state.entry.is_some(),
            ..state.stats.clone()
        }
    }
}

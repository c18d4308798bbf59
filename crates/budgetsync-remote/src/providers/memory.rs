//! In-process gateway for offline use and tests

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use budgetsync_core::{BudgetSnapshot, SyncError};

use super::super::gateway::BudgetGateway;

/// Holds one snapshot and behaves like a server that normalizes what it
/// stores. Can be taken offline and slowed down.
pub struct MemoryGateway {
    snapshot: Mutex<BudgetSnapshot>,
    offline: AtomicBool,
    latency: Duration,
    fetches: AtomicUsize,
    updates: AtomicUsize,
    resets: AtomicUsize,
}

impl MemoryGateway {
    pub fn new(snapshot: BudgetSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            offline: AtomicBool::new(false),
            latency: Duration::ZERO,
            fetches: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            resets: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::new(BudgetSnapshot::empty())
    }

    /// Delay every request by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Change the stored budget behind the client's back.
    pub fn set_snapshot(&self, snapshot: BudgetSnapshot) {
        *self.lock() = snapshot;
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        self.lock().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, BudgetSnapshot> {
        self.snapshot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn round_trip(&self) -> Result<(), SyncError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.offline.load(Ordering::SeqCst) {
            return Err(SyncError::network("memory: gateway is offline"));
        }
        Ok(())
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::empty()
    }
}

#[async_trait::async_trait]
impl BudgetGateway for MemoryGateway {
    async fn fetch(&self) -> Result<BudgetSnapshot, SyncError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        Ok(self.snapshot())
    }

    async fn update(&self, snapshot: &BudgetSnapshot) -> Result<BudgetSnapshot, SyncError> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;

        let stored = BudgetSnapshot::from_server_value(&snapshot.to_server_payload())?;
        self.set_snapshot(stored.clone());
        Ok(stored)
    }

    async fn reset(&self) -> Result<(), SyncError> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.round_trip().await?;
        self.set_snapshot(BudgetSnapshot::empty());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

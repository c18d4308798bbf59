//! Polling watcher implementation

use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use budgetsync_core::{BudgetSnapshot, ChangeDetector, SnapshotHash, SyncError};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default poll interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(30);

const EVENT_CAPACITY: usize = 64;

/// Where the watcher gets snapshots from.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch the latest snapshot, bypassing any cache.
    async fn poll(&self) -> Result<BudgetSnapshot, SyncError>;

    /// Snapshot to deliver when the first poll after `start` fails.
    async fn fallback(&self) -> Option<BudgetSnapshot> {
        None
    }
}

/// Callback invoked with each changed snapshot.
pub type Callback = Arc<dyn Fn(&BudgetSnapshot) + Send + Sync>;

thread_local! {
    /// True while this thread is running a watcher callback.
    static DELIVERING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside a callback until dropped.
struct DeliveryScope {
    previous: bool,
}

impl DeliveryScope {
    fn enter() -> Self {
        Self {
            previous: DELIVERING.replace(true),
        }
    }
}

impl Drop for DeliveryScope {
    fn drop(&mut self) {
        DELIVERING.set(self.previous);
    }
}

/// What produced a change notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOrigin {
    /// The immediate fetch performed by `start`.
    Initial,
    /// The fallback snapshot delivered because the initial fetch failed.
    Fallback,
    /// A periodic poll.
    Poll,
    /// A manual forced refresh.
    Refresh,
    /// Pushed by a local write through `announce`.
    Local,
}

/// Broadcast to subscribers whenever the budget content changes.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub snapshot: BudgetSnapshot,
    pub hash: SnapshotHash,
    pub origin: ChangeOrigin,
}

/// State shared between the watcher, its loop task and stop handles.
struct WatchShared {
    /// Incremented by every start and stop; a loop whose run id is no
    /// longer current must not notify.
    run: AtomicU64,
    callback: Mutex<Option<Callback>>,
    /// Held for the duration of a delivery; `end` waits on it.
    delivery: Mutex<()>,
    detector: Mutex<ChangeDetector>,
    events: broadcast::Sender<WatchEvent>,
}

impl WatchShared {
    fn callback(&self) -> MutexGuard<'_, Option<Callback>> {
        self.callback.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn detector(&self) -> MutexGuard<'_, ChangeDetector> {
        self.detector.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// `None` when called from inside a callback, which already holds it.
    fn delivery_gate(&self) -> Option<MutexGuard<'_, ()>> {
        if DELIVERING.get() {
            return None;
        }
        Some(self.delivery.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn is_current(&self, run: u64) -> bool {
        self.run.load(Ordering::SeqCst) == run
    }

    /// Notify if `snapshot` differs from the last notified one. The delivery
    /// gate is held throughout, so `stop` from another thread cannot return
    /// while a callback is running. No other lock is held while the callback
    /// runs, so it may call back into the watcher.
    fn deliver(&self, run: Option<u64>, snapshot: BudgetSnapshot, origin: ChangeOrigin) -> bool {
        let _gate = self.delivery_gate();
        if let Some(run) = run {
            if !self.is_current(run) {
                return false;
            }
        }

        let hash = {
            let mut detector = self.detector();
            if !detector.observe(&snapshot) {
                debug!("Budget unchanged ({:?}), not notifying", origin);
                return false;
            }
            ChangeDetector::hash(&snapshot)
        };

        debug!("Budget changed ({:?}, {})", origin, hash);
        // `start` swaps the callback and bumps the run under the same lock.
        let callback = {
            let slot = self.callback();
            match run {
                Some(run) if !self.is_current(run) => None,
                _ => slot.clone(),
            }
        };
        if let Some(callback) = callback {
            let _scope = DeliveryScope::enter();
            callback(&snapshot);
        }
        // No receivers just means nobody subscribed.
        let _ = self.events.send(WatchEvent { snapshot, hash, origin });
        true
    }

    /// End `run` if it is still current. Returns false when it was not.
    fn end(&self, run: Option<u64>) -> bool {
        let ended = {
            let mut callback = self.callback();
            let current = self.run.load(Ordering::SeqCst);
            if run.is_some_and(|run| run != current) || callback.is_none() {
                false
            } else {
                self.run.fetch_add(1, Ordering::SeqCst);
                *callback = None;
                true
            }
        };
        // Wait for a callback still running on another thread.
        drop(self.delivery_gate());
        ended
    }
}

/// Stops the loop it was returned for. Stopping a loop that was already
/// replaced or stopped does nothing.
pub struct WatchHandle {
    shared: Arc<WatchShared>,
    run: u64,
    task: AbortHandle,
}

impl WatchHandle {
    pub fn stop(&self) {
        if self.shared.end(Some(self.run)) {
            info!("Budget watcher stopped");
        }
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_current(self.run) && !self.task.is_finished()
    }
}

/// Periodic poller with hash-based change suppression
pub struct BudgetWatcher {
    source: Arc<dyn SnapshotSource>,
    shared: Arc<WatchShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BudgetWatcher {
    pub fn new(source: Arc<dyn SnapshotSource>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            source,
            shared: Arc::new(WatchShared {
                run: AtomicU64::new(0),
                callback: Mutex::new(None),
                delivery: Mutex::new(()),
                detector: Mutex::new(ChangeDetector::new()),
                events,
            }),
            task: Mutex::new(None),
        }
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch now and notify, then poll every `interval`. A running loop is
    /// stopped first.
    pub async fn start<F>(&self, callback: F, interval: Duration) -> WatchHandle
    where
        F: Fn(&BudgetSnapshot) + Send + Sync + 'static,
    {
        self.stop();

        let run = {
            let mut slot = self.shared.callback();
            *slot = Some(Arc::new(callback));
            self.shared.detector().reset();
            self.shared.run.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!("Budget watcher started (every {:?})", interval);

        match self.source.poll().await {
            Ok(snapshot) => {
                self.shared.deliver(Some(run), snapshot, ChangeOrigin::Initial);
            }
            Err(e) => {
                warn!("Initial budget fetch failed: {}", e);
                if let Some(snapshot) = self.source.fallback().await {
                    self.shared.deliver(Some(run), snapshot, ChangeOrigin::Fallback);
                }
            }
        }

        let shared = self.shared.clone();
        let source = self.source.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !shared.is_current(run) {
                    break;
                }
                match source.poll().await {
                    Ok(snapshot) => {
                        shared.deliver(Some(run), snapshot, ChangeOrigin::Poll);
                    }
                    Err(e) => warn!("Budget poll failed, retrying next tick: {}", e),
                }
            }
        });

        let handle = WatchHandle {
            shared: self.shared.clone(),
            run,
            task: task.abort_handle(),
        };
        {
            let mut slot = self.task();
            if self.shared.is_current(run) {
                if let Some(previous) = slot.replace(task) {
                    previous.abort();
                }
            } else {
                // Stopped or restarted while the initial poll was in flight.
                task.abort();
            }
        }
        handle
    }

    /// Stop the running loop, if any. No callback runs after this returns.
    pub fn stop(&self) {
        if self.shared.end(None) {
            info!("Budget watcher stopped");
        }
        if let Some(task) = self.task().take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.task().as_ref().is_some_and(|task| !task.is_finished())
            && self.shared.callback().is_some()
    }

    /// Receive every change event from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.shared.events.subscribe()
    }

    /// Push a snapshot obtained outside the poll loop through the same
    /// change detection. Returns true if it was a change.
    pub fn announce(&self, snapshot: BudgetSnapshot, origin: ChangeOrigin) -> bool {
        self.shared.deliver(None, snapshot, origin)
    }

    /// Hash of the last notified snapshot.
    pub fn last_hash(&self) -> Option<SnapshotHash> {
        self.shared.detector().last()
    }
}

impl Drop for BudgetWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

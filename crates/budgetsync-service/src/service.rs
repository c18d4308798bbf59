//! Public entry points of the sync engine

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use budgetsync_core::{
    BudgetConfig, BudgetSnapshot, CommandInterpreter, CommandOutcome, FileStore, LocalStore,
    ResolvedCommand, SyncError, mutator,
};
use budgetsync_remote::{BudgetGateway, CacheStats, GatewayConfig, create_gateway};
use budgetsync_watcher::{BudgetWatcher, ChangeOrigin, WatchEvent, WatchHandle};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::repository::{BudgetRead, BudgetRepository};

const NOT_AN_UPDATE: &str = "This doesn't appear to be a budget update request.";
const NOT_UNDERSTOOD: &str =
    "Could not understand the budget update request. Please be more specific about categories and amounts.";

/// Budget sync engine. Owned by the composition root and shared by reference.
///
/// Concurrent `update_budget` calls are not serialized against each other:
/// the last write to reach the server wins.
pub struct BudgetService {
    repository: Arc<BudgetRepository>,
    watcher: BudgetWatcher,
    interpreter: CommandInterpreter,
    watch_interval: Duration,
}

impl BudgetService {
    pub fn new(
        gateway: Arc<dyn BudgetGateway>,
        store: Arc<dyn LocalStore>,
        cache_ttl: Duration,
        watch_interval: Duration,
    ) -> Self {
        let repository = Arc::new(BudgetRepository::new(gateway, store, cache_ttl));
        Self {
            watcher: BudgetWatcher::new(repository.clone()),
            repository,
            interpreter: CommandInterpreter::new(),
            watch_interval,
        }
    }

    /// Build the gateway and file store named by `config`.
    pub fn from_config(config: &BudgetConfig) -> Result<Self> {
        let gateway = create_gateway(&config.remote.gateway, GatewayConfig::from(config))
            .context("Failed to create budget gateway")?;
        let store = FileStore::new(&config.storage.dir);
        info!(
            "Budget service using {} gateway, local store at {}",
            gateway.name(),
            config.storage.dir.display()
        );
        Ok(Self::new(
            Arc::from(gateway),
            Arc::new(store),
            config.cache_ttl(),
            config.watch_interval(),
        ))
    }

    pub fn repository(&self) -> &BudgetRepository {
        &self.repository
    }

    /// Current budget; never fails (remote, then local mirror, then empty).
    pub async fn get_budget(&self, force_refresh: bool) -> BudgetSnapshot {
        self.repository.read(force_refresh).await.snapshot
    }

    /// Like [`get_budget`](Self::get_budget) but also reports where the
    /// snapshot came from.
    pub async fn read_budget(&self, force_refresh: bool) -> BudgetRead {
        self.repository.read(force_refresh).await
    }

    /// Save `snapshot` remotely. Failures propagate so the caller knows the
    /// change is not durable.
    pub async fn update_budget(&self, snapshot: &BudgetSnapshot) -> Result<BudgetSnapshot, SyncError> {
        let confirmed = self.repository.write(snapshot).await?;
        self.watcher.announce(confirmed.clone(), ChangeOrigin::Local);
        Ok(confirmed)
    }

    /// Clear remote and local state; the remote part is best effort.
    pub async fn reset_budget(&self) -> BudgetSnapshot {
        info!("Resetting budget");
        let empty = self.repository.reset().await;
        self.watcher.announce(empty.clone(), ChangeOrigin::Local);
        empty
    }

    /// Drop the cache and fetch, notifying watchers if the budget changed.
    pub async fn force_refresh(&self) -> BudgetSnapshot {
        self.repository.clear_cache();
        let snapshot = self.get_budget(true).await;
        self.watcher.announce(snapshot.clone(), ChangeOrigin::Refresh);
        snapshot
    }

    pub fn clear_cache(&self) {
        self.repository.clear_cache();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.repository.cache_stats()
    }

    /// Poll for changes; `None` uses the configured interval.
    pub async fn start_watcher<F>(&self, callback: F, interval: Option<Duration>) -> WatchHandle
    where
        F: Fn(&BudgetSnapshot) + Send + Sync + 'static,
    {
        self.watcher
            .start(callback, interval.unwrap_or(self.watch_interval))
            .await
    }

    pub fn stop_watcher(&self) {
        self.watcher.stop();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.watcher.subscribe()
    }

    /// Commands `message` would apply to `snapshot`.
    pub fn plan(&self, message: &str, snapshot: &BudgetSnapshot) -> Result<Vec<ResolvedCommand>, SyncError> {
        let commands = self.interpreter.interpret(message, snapshot);
        if commands.is_empty() {
            return Err(SyncError::NoCommandMatched(message.to_string()));
        }
        Ok(commands)
    }

    /// Interpret a free-text instruction, apply it and save the result.
    /// Every failure is reported in the outcome rather than as an error.
    pub async fn process_text_command(&self, message: &str) -> CommandOutcome {
        if !CommandInterpreter::is_update_request(message) {
            return CommandOutcome::rejected(NOT_AN_UPDATE, CommandInterpreter::suggestions());
        }

        let current = self.get_budget(false).await;
        let commands = match self.plan(message, &current) {
            Ok(commands) => commands,
            Err(e) => {
                debug!("{}", e);
                return CommandOutcome::rejected(NOT_UNDERSTOOD, CommandInterpreter::suggestions());
            }
        };

        let updated = mutator::apply(&current, &commands);
        let log: Vec<String> = commands.iter().map(mutator::describe).collect();

        match self.update_budget(&updated).await {
            Ok(confirmed) => CommandOutcome::applied(confirmed, log),
            Err(e) => {
                warn!("Text command not saved: {}", e);
                CommandOutcome::rejected(format!("Budget change was not saved: {e}"), Vec::new())
            }
        }
    }
}

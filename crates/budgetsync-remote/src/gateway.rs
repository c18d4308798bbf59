//! Gateway abstraction over the remote budget API

use std::time::Duration;

use budgetsync_core::{BudgetConfig, BudgetSnapshot, SyncError};

/// `GET {endpoint}/current_budget`
pub const CURRENT_BUDGET_PATH: &str = "current_budget";

/// `POST {endpoint}/update-file`
pub const UPDATE_PATH: &str = "update-file";

/// `POST {endpoint}/reset`
pub const RESET_PATH: &str = "reset";

/// Remote budget store. Implementations try their candidates in order and
/// report a single error only when every candidate failed.
#[async_trait::async_trait]
pub trait BudgetGateway: Send + Sync {
    /// Read the current server snapshot.
    async fn fetch(&self) -> Result<BudgetSnapshot, SyncError>;

    /// Replace the server snapshot; returns what the server now holds.
    async fn update(&self, snapshot: &BudgetSnapshot) -> Result<BudgetSnapshot, SyncError>;

    /// Clear the server snapshot.
    async fn reset(&self) -> Result<(), SyncError>;

    /// Get gateway name
    fn name(&self) -> &str;
}

/// Endpoint candidates and per-candidate timeouts.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Base URLs, tried in order.
    pub endpoints: Vec<String>,
    /// Bound on each read (`fetch`, `reset`) attempt.
    pub read_timeout: Duration,
    /// Bound on each `update` attempt.
    pub write_timeout: Duration,
}

impl GatewayConfig {
    pub fn new(endpoints: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_timeouts(mut self, read_timeout: Duration, write_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self.write_timeout = write_timeout;
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&BudgetConfig> for GatewayConfig {
    fn from(config: &BudgetConfig) -> Self {
        Self {
            endpoints: config.remote.endpoints.clone(),
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
        }
    }
}

/// Join a base URL and an API path without doubling slashes.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

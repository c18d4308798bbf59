//! HTTP gateway over an ordered list of API base URLs

use std::fmt;

use budgetsync_core::{BudgetSnapshot, SyncError};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::super::gateway::{
    BudgetGateway, CURRENT_BUDGET_PATH, GatewayConfig, RESET_PATH, UPDATE_PATH, endpoint_url,
};

pub struct HttpGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

/// Why a single candidate was skipped.
#[derive(Debug)]
enum CandidateError {
    /// Connection, timeout or non-2xx status.
    Transport(String),
    /// 2xx with a body that is not a budget.
    Payload(String),
}

impl fmt::Display for CandidateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateError::Transport(msg) | CandidateError::Payload(msg) => f.write_str(msg),
        }
    }
}

impl HttpGateway {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    async fn fetch_from(&self, base: &str) -> Result<BudgetSnapshot, CandidateError> {
        let url = endpoint_url(base, CURRENT_BUDGET_PATH);
        debug!("Fetching budget from {}", url);

        let response = self
            .client
            .get(&url)
            .header("Cache-Control", "no-cache")
            .timeout(self.config.read_timeout)
            .send()
            .await
            .map_err(|e| CandidateError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CandidateError::Transport(format!("server responded with {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| CandidateError::Payload(format!("invalid JSON body: {e}")))?;

        BudgetSnapshot::from_server_value(&body).map_err(|e| CandidateError::Payload(e.to_string()))
    }

    /// POST the payload; `Ok(Some(body))` when the server answered with JSON.
    async fn post_update(&self, base: &str, payload: &Value) -> Result<Option<Value>, CandidateError> {
        let url = endpoint_url(base, UPDATE_PATH);
        debug!("Posting budget update to {}", url);

        let response = self
            .client
            .post(&url)
            .json(payload)
            .timeout(self.config.write_timeout)
            .send()
            .await
            .map_err(|e| CandidateError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CandidateError::Transport(format!("server responded with {status}: {text}")));
        }

        Ok(response.json::<Value>().await.ok())
    }

    /// The snapshot the server holds after an accepted update: the echoed
    /// body if it carries a budget, otherwise a re-read from the same base.
    async fn confirm(&self, base: &str, body: Option<Value>, submitted: &BudgetSnapshot) -> BudgetSnapshot {
        if let Some(body) = body.filter(|b| b.get("budget_plan").is_some()) {
            match BudgetSnapshot::from_server_value(&body) {
                Ok(snapshot) => return snapshot,
                Err(e) => debug!("Ignoring unreadable update echo from {}: {}", base, e),
            }
        }

        match self.fetch_from(base).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Could not confirm update on {}: {}; using submitted budget", base, e);
                submitted.clone()
            }
        }
    }
}

/// Collapse per-candidate failures into one error: a payload error only
/// when every candidate was reachable but answered with garbage.
fn aggregate(failures: Vec<(String, CandidateError)>) -> SyncError {
    if failures.is_empty() {
        return SyncError::network("no endpoints configured");
    }
    if failures.iter().all(|(_, e)| matches!(e, CandidateError::Payload(_))) {
        let detail = failures
            .iter()
            .map(|(base, e)| format!("{base}: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        return SyncError::parse(detail);
    }
    SyncError::Network(
        failures
            .into_iter()
            .map(|(base, e)| format!("{base}: {e}"))
            .collect(),
    )
}

#[async_trait::async_trait]
impl BudgetGateway for HttpGateway {
    async fn fetch(&self) -> Result<BudgetSnapshot, SyncError> {
        let mut failures = Vec::new();

        for base in &self.config.endpoints {
            match self.fetch_from(base).await {
                Ok(snapshot) => {
                    debug!("Fetched budget from {} ({} categories)", base, snapshot.categories.len());
                    return Ok(snapshot);
                }
                Err(e) => {
                    warn!("Failed to fetch budget from {}: {}", base, e);
                    failures.push((base.clone(), e));
                }
            }
        }

        Err(aggregate(failures))
    }

    async fn update(&self, snapshot: &BudgetSnapshot) -> Result<BudgetSnapshot, SyncError> {
        let payload = snapshot.to_server_payload();
        let mut failures = Vec::new();

        for base in &self.config.endpoints {
            match self.post_update(base, &payload).await {
                Ok(body) => {
                    info!("Budget update accepted by {}", base);
                    return Ok(self.confirm(base, body, snapshot).await);
                }
                Err(e) => {
                    warn!("Failed to update budget on {}: {}", base, e);
                    failures.push((base.clone(), e));
                }
            }
        }

        Err(aggregate(failures))
    }

    async fn reset(&self) -> Result<(), SyncError> {
        let mut failures = Vec::new();

        for base in &self.config.endpoints {
            let url = endpoint_url(base, RESET_PATH);
            let result = self
                .client
                .post(&url)
                .header("Content-Type", "application/json")
                .timeout(self.config.read_timeout)
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    info!("Budget reset on {}", base);
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    warn!("Reset rejected by {}: {}", base, status);
                    failures.push((
                        base.clone(),
                        CandidateError::Transport(format!("server responded with {status}")),
                    ));
                }
                Err(e) => {
                    warn!("Failed to reset budget on {}: {}", base, e);
                    failures.push((base.clone(), CandidateError::Transport(e.to_string())));
                }
            }
        }

        Err(aggregate(failures))
    }

    fn name(&self) -> &str {
        "http"
    }
}

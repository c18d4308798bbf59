//! Engine configuration: `budgetsync.toml` plus environment overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::store::STORE_DIR;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE: &str = "budgetsync.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    pub remote: RemoteConfig,
    pub cache: CacheConfig,
    pub watcher: WatcherConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URLs tried in order, e.g. `http://localhost:5000/api`.
    pub endpoints: Vec<String>,
    /// Gateway implementation: `http` or `memory`.
    pub gateway: String,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoints: vec!["http://localhost:5000/api".to_string()],
            gateway: "http".to_string(),
            read_timeout_ms: 5_000,
            write_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_ms: 60_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    pub interval_ms: u64,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { interval_ms: 30_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(STORE_DIR),
        }
    }
}

impl BudgetConfig {
    /// Load `.env`, then the TOML file (if it exists), then `BUDGETSYNC_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE));
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Self::from_toml(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!("No config file at {}; using defaults", path.display());
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Apply `BUDGETSYNC_*` overrides from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoints) = lookup("BUDGETSYNC_ENDPOINTS") {
            self.remote.endpoints = endpoints
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(gateway) = lookup("BUDGETSYNC_GATEWAY") {
            self.remote.gateway = gateway.trim().to_string();
        }
        if let Some(ttl) = lookup("BUDGETSYNC_CACHE_TTL_MS") {
            self.cache.ttl_ms = ttl
                .trim()
                .parse()
                .with_context(|| format!("BUDGETSYNC_CACHE_TTL_MS is not a number: {ttl:?}"))?;
        }
        if let Some(interval) = lookup("BUDGETSYNC_WATCH_INTERVAL_MS") {
            self.watcher.interval_ms = interval
                .trim()
                .parse()
                .with_context(|| format!("BUDGETSYNC_WATCH_INTERVAL_MS is not a number: {interval:?}"))?;
        }
        if let Some(dir) = lookup("BUDGETSYNC_STORE_DIR") {
            self.storage.dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.remote.gateway == "http" && self.remote.endpoints.is_empty() {
            anyhow::bail!("remote.endpoints must list at least one base URL");
        }
        if self.watcher.interval_ms == 0 {
            anyhow::bail!("watcher.interval_ms must be greater than zero");
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.remote.write_timeout_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache.ttl_ms)
    }

    pub fn watch_interval(&self) -> Duration {
        Duration::from_millis(self.watcher.interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = BudgetConfig::default();
        assert_eq!(config.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.write_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache_ttl(), Duration::from_secs(60));
        assert_eq!(config.watch_interval(), Duration::from_secs(30));
        assert_eq!(config.storage.dir, PathBuf::from(".budgetsync"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = BudgetConfig::from_toml(
            r#"
            [remote]
            endpoints = ["http://192.168.29.40:5000/api", "http://localhost:5000/api"]

            [cache]
            ttl_ms = 1000
            "#,
        )
        .unwrap();

        assert_eq!(config.remote.endpoints.len(), 2);
        assert_eq!(config.remote.gateway, "http");
        assert_eq!(config.cache_ttl(), Duration::from_secs(1));
        assert_eq!(config.watch_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("BUDGETSYNC_ENDPOINTS", "http://a/api, http://b/api ,"),
            ("BUDGETSYNC_WATCH_INTERVAL_MS", "250"),
            ("BUDGETSYNC_STORE_DIR", "/tmp/budget"),
        ]);
        let mut config = BudgetConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.remote.endpoints, vec!["http://a/api", "http://b/api"]);
        assert_eq!(config.watch_interval(), Duration::from_millis(250));
        assert_eq!(config.storage.dir, PathBuf::from("/tmp/budget"));
    }

    #[test]
    fn test_bad_numeric_override_is_an_error() {
        let mut config = BudgetConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "BUDGETSYNC_CACHE_TTL_MS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_http_without_endpoints() {
        let mut config = BudgetConfig::default();
        config.remote.endpoints.clear();
        assert!(config.validate().is_err());

        config.remote.gateway = "memory".to_string();
        assert!(config.validate().is_ok());
    }
}

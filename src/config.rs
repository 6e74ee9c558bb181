use crate::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "https://www.apianalytics-server.com";
pub const LOG_REQUEST_PATH: &str = "/api/log-request";

const ENV_PREFIX: &str = "ANALYTICS";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Base URL of the collection server
    pub server_url: String,
    /// Minimum time between two dispatches
    pub dispatch_interval_ms: u64,
    /// Timeout of a single `POST /api/log-request`
    pub request_timeout_secs: u64,
    /// Number of drained batches that may wait for the worker
    pub queue_capacity: usize,
    /// Key used by the middleware adapter; logging is disabled when unset
    pub api_key: Option<String>,
    /// Privacy level reported by the middleware adapter
    pub privacy_level: i32,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            dispatch_interval_ms: 60_000,
            request_timeout_secs: 10,
            queue_capacity: 64,
            api_key: None,
            privacy_level: 0,
        }
    }
}

impl AnalyticsConfig {
    /// Full URL batches are posted to
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.server_url.trim_end_matches('/'), LOG_REQUEST_PATH)
    }

    pub fn dispatch_interval(&self) -> Duration {
        Duration::from_millis(self.dispatch_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Load configuration from an optional `analytics.{toml,yaml,json}` in the
/// working directory, overridden by `ANALYTICS_*` environment variables.
pub fn load_config() -> Result<AnalyticsConfig> {
    build_config(
        Some(config::File::with_name("analytics").required(false)),
        config::Environment::with_prefix(ENV_PREFIX),
    )
}

/// Same as [`load_config`] but the file at `path` must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<AnalyticsConfig> {
    build_config(
        Some(config::File::from(path.as_ref())),
        config::Environment::with_prefix(ENV_PREFIX),
    )
}

fn build_config(
    file: Option<config::File<config::FileSourceFile, config::FileFormat>>,
    env: config::Environment,
) -> Result<AnalyticsConfig> {
    let mut builder = config::Config::builder();
    if let Some(file) = file {
        builder = builder.add_source(file);
    }

    let config = builder
        .add_source(env)
        .build()?;

    let cfg: AnalyticsConfig = config.try_deserialize()?;
    validate_config(&cfg)?;

    Ok(cfg)
}

pub fn validate_config(cfg: &AnalyticsConfig) -> Result<()> {
    if cfg.server_url.trim().is_empty() {
        return Err(AnalyticsError::Config("server_url must not be empty".to_string()));
    }

    let url = reqwest::Url::parse(&cfg.server_url)
        .map_err(|e| AnalyticsError::Config(format!("Invalid server_url '{}': {}", cfg.server_url, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(AnalyticsError::Config(format!(
            "server_url must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if cfg.dispatch_interval_ms == 0 {
        return Err(AnalyticsError::Config("dispatch_interval_ms must be greater than 0".to_string()));
    }

    if cfg.request_timeout_secs == 0 {
        return Err(AnalyticsError::Config("request_timeout_secs must be greater than 0".to_string()));
    }

    if cfg.queue_capacity == 0 {
        return Err(AnalyticsError::Config("queue_capacity must be greater than 0".to_string()));
    }

    Ok(())
}

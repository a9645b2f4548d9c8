use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    /// Target address: `ws://`, `wss://`, `tcp://host:port`, or a bare
    /// `host:port` (treated as TCP).
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Extra headers sent on the WebSocket handshake; ignored for TCP.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            headers: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PoolConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Pause between successive worker launches.
    #[serde(default = "default_stagger_ms")]
    pub stagger_ms: u64,
    /// Minimum delay before a worker retries a failed or closed connection.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Ceiling on a single blocking receive; workers re-check the shutdown
    /// signal at least this often.
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    /// Bounded wait for workers to drain during shutdown.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            stagger_ms: default_stagger_ms(),
            backoff_ms: default_backoff_ms(),
            receive_timeout_ms: default_receive_timeout_ms(),
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_interval_secs")]
    pub interval_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_stats_interval_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_url() -> String {
    "ws://127.0.0.1:8080/".to_string()
}
fn default_connect_timeout_ms() -> u64 {
    5000
}
fn default_worker_count() -> usize {
    500
}
fn default_stagger_ms() -> u64 {
    20
}
fn default_backoff_ms() -> u64 {
    1000
}
fn default_receive_timeout_ms() -> u64 {
    1000
}
fn default_grace_period_ms() -> u64 {
    10_000
}
fn default_stats_interval_secs() -> u64 {
    5
}
fn default_metrics_port() -> u16 {
    9090
}

impl Config {
    /// Load configuration: an explicit path, else the first of
    /// `siege.yaml` / `config.yaml` that exists, else built-in defaults.
    /// `SIEGE_*` environment variables override file values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let mut found = None;
                for candidate in ["siege.yaml", "config.yaml"] {
                    if Path::new(candidate).exists() {
                        found = Some(Self::from_file(Path::new(candidate))?);
                        break;
                    }
                }
                found.unwrap_or_default()
            }
        };

        if let Ok(v) = env::var("SIEGE_ENDPOINT") {
            config.endpoint.url = v;
        }
        if let Ok(v) = env::var("SIEGE_WORKERS") {
            config.pool.worker_count = v.parse().unwrap_or(config.pool.worker_count);
        }
        if let Ok(v) = env::var("SIEGE_METRICS_PORT") {
            config.metrics.port = v.parse().unwrap_or(config.metrics.port);
        }

        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Validated once at startup; the config is read-only afterwards.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.url.is_empty() {
            return Err(ConfigError::Invalid("endpoint.url must not be empty".into()));
        }
        if self.endpoint.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "endpoint.connect_timeout_ms must be at least 1".into(),
            ));
        }
        if self.pool.receive_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "pool.receive_timeout_ms must be at least 1".into(),
            ));
        }
        if self.pool.receive_timeout_ms > self.pool.grace_period_ms {
            return Err(ConfigError::Invalid(format!(
                "pool.receive_timeout_ms ({}) must not exceed pool.grace_period_ms ({}), \
                 or shutdown cannot bound its wait on a quiet connection",
                self.pool.receive_timeout_ms, self.pool.grace_period_ms
            )));
        }
        if self.stats.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "stats.interval_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

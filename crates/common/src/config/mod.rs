//! Configuration management for AuthorForge services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config/default.toml, config/{APP_ENV}.toml)
//! - Default values

use crate::errors::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Deduplication engine configuration
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes)
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Give up retrying the initial connection after this many seconds
    #[serde(default = "default_connect_retry_budget")]
    pub connect_retry_budget_secs: u64,
}

/// How middle-name tokens are compared once two authors share a blocking key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMode {
    /// Each middle token must match the token at the same position
    Positional,
    /// Each middle token may match any later token, keeping order
    #[default]
    ForwardScan,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DedupConfig {
    /// Interval between import completion checks, in milliseconds
    #[serde(default = "default_import_poll_interval")]
    pub import_poll_interval_ms: u64,

    /// Middle-name comparison mode
    #[serde(default)]
    pub similarity_mode: SimilarityMode,

    /// Look-back window for `propagate` without an explicit cutoff, in minutes
    #[serde(default = "default_propagation_window")]
    pub propagation_window_minutes: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for logs
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

// Default value functions
fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_connect_retry_budget() -> u64 { 60 }
fn default_import_poll_interval() -> u64 { 1000 }
fn default_propagation_window() -> i64 { 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 0 }
fn default_service_name() -> String { "authorforge-dedup".to_string() }

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            import_poll_interval_ms: default_import_poll_interval(),
            similarity_mode: SimilarityMode::default(),
            propagation_window_minutes: default_propagation_window(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("database.url", "postgres://localhost/authorforge")?

            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // e.g., APP__DEDUP__SIMILARITY_MODE=positional
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        Self::from_config(config)
    }

    fn from_config(config: Config) -> Result<Self> {
        Ok(config.try_deserialize()?)
    }

    /// Get the import poll interval as Duration
    pub fn import_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dedup.import_poll_interval_ms)
    }

    /// Get the default propagation look-back window
    pub fn propagation_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.dedup.propagation_window_minutes)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/authorforge".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                connect_retry_budget_secs: default_connect_retry_budget(),
            },
            dedup: DedupConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

//! Configuration for the Prometheus exporter.

use std::path::Path;
use std::time::Duration;

use metricsprom::{Options, SharedRegistry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Metric naming and refresh settings.
    #[serde(default)]
    pub export: ExportConfig,

    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Synthetic load generator settings.
    #[serde(default)]
    pub demo: DemoConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Naming and refresh settings for the sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// First component of exported metric names (default: "kafka").
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Second component of exported metric names (default: "client").
    #[serde(default = "default_subsystem")]
    pub subsystem: String,

    /// Delay between sync passes in milliseconds; 0 syncs once.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_ms: u64,
}

fn default_namespace() -> String {
    "kafka".to_string()
}

fn default_subsystem() -> String {
    "client".to_string()
}

fn default_refresh_interval() -> u64 {
    10_000
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            subsystem: default_subsystem(),
            refresh_interval_ms: default_refresh_interval(),
        }
    }
}

impl ExportConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    /// Build sync engine options targeting `registry`.
    pub fn to_options(&self, registry: SharedRegistry) -> Options {
        Options::new(registry)
            .namespace(self.namespace.as_str())
            .subsystem(self.subsystem.as_str())
            .refresh_interval(self.refresh_interval())
    }
}

/// Prometheus HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:9308").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,
}

fn default_listen() -> String {
    "0.0.0.0:9308".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            path: default_path(),
        }
    }
}

/// Synthetic client metrics, for trying the exporter without a real client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    /// Generate demo metrics (default: true).
    #[serde(default = "default_demo_enabled")]
    pub enabled: bool,

    /// Broker ids to simulate.
    #[serde(default = "default_brokers")]
    pub brokers: Vec<String>,

    /// Topic names to simulate.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// How often simulated traffic is recorded, in milliseconds.
    #[serde(default = "default_update_interval")]
    pub update_interval_ms: u64,
}

fn default_demo_enabled() -> bool {
    true
}

fn default_brokers() -> Vec<String> {
    vec!["1".to_string(), "2".to_string(), "3".to_string()]
}

fn default_topics() -> Vec<String> {
    vec!["orders".to_string(), "payments".to_string()]
}

fn default_update_interval() -> u64 {
    500
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: default_demo_enabled(),
            brokers: default_brokers(),
            topics: default_topics(),
            update_interval_ms: default_update_interval(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Validate listen address format
        if self.http.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.http.listen
            )));
        }

        // Validate path starts with /
        if !self.http.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.demo.enabled && self.demo.update_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "demo.update_interval_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

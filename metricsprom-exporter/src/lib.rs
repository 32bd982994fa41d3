//! Prometheus exporter for bridged client metrics.
//!
//! This crate runs the [`metricsprom`] sync engine against a source registry
//! and exposes the resulting families via an HTTP `/metrics` endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Source Registry │────>│   Sync Engine   │────>│   HTTP Server   │
//! │ (demo / client) │     │  (metricsprom)  │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! metricsprom-exporter --config config.json5
//! ```
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod config;
pub mod demo;
pub mod http;

pub use config::{ConfigError, ExporterConfig, LogFormat, LoggingConfig};
pub use demo::DemoLoad;
pub use http::HttpServer;

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| ConfigError::Validation(format!("Failed to initialize tracing: {}", e)))
}

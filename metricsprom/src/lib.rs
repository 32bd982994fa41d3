//! Bridge sample-based client metrics into typed Prometheus metric families.
//!
//! Client libraries such as Kafka producers record metrics in a free-form
//! registry, encoding the broker or topic in the metric key. This crate
//! periodically republishes those metrics into a Prometheus-style registry
//! with proper `broker` and `topic` labels.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │ Source Registry │────>│   Sync Engine   │────>│ Target Registry │
//! │  (free-form)    │     │ (parse, export) │     │ (typed, labels) │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use metricsprom::{Options, export_metrics, source, target};
//!
//! let source = Arc::new(source::Registry::new());
//! source.register("requests-for-broker-1", Arc::new(source::Counter::new()))?;
//!
//! let registry = Arc::new(target::Registry::new());
//! let handle = export_metrics(
//!     source,
//!     Options::new(registry.clone())
//!         .namespace("kafka")
//!         .subsystem("producer")
//!         .refresh_interval(Duration::from_secs(10)),
//! );
//!
//! println!("{}", registry.render());
//! handle.stop().await;
//! ```

pub mod error;
pub mod naming;
pub mod sample;
pub mod source;
pub mod sync;
pub mod target;

pub use error::{SourceError, TargetError};
pub use naming::{ParsedName, parse_metric_name};
pub use sample::{Sample, SampleSnapshot, UniformSample};
pub use source::{Metric, MetricKind, MetricSource};
pub use sync::{ExportHandle, Exporter, Options, PassStats, QUANTILES, export_metrics};
pub use target::SharedRegistry;

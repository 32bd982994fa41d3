//! Error types for the source and target registries.

use thiserror::Error;

/// Errors raised by a source registry.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A metric is already registered under this name.
    #[error("Duplicate metric: {0}")]
    Duplicate(String),

    /// The registry backend cannot be enumerated.
    #[error("Source registry unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the target registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    /// A family with this fully-qualified name already exists.
    #[error("Metric family already registered: {0}")]
    AlreadyRegistered(String),

    /// The fully-qualified name is not a valid Prometheus metric name.
    #[error("Invalid metric name: {0:?}")]
    InvalidMetricName(String),

    /// A label name is not valid or is reserved.
    #[error("Invalid label name: {0:?}")]
    InvalidLabelName(String),

    /// Wrong number of label values for the family.
    #[error("Expected {expected} label values, got {got}")]
    LabelCardinality { expected: usize, got: usize },

    /// The instance was written with a value of the wrong kind.
    #[error("Cannot write a {got} value to a {expected} metric")]
    KindMismatch {
        expected: &'static str,
        got: &'static str,
    },
}

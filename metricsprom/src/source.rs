//! Sample-based source metrics registry.
//!
//! Metrics are registered under free-form string keys and updated in place by
//! instrumented code. The sync engine only ever reads from a registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::SourceError;
use crate::sample::{Sample, SampleSnapshot, UniformSample};

/// Monotonic-by-convention integer counter.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self, delta: i64) {
        self.count.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn dec(&self, delta: i64) {
        self.count.fetch_sub(delta, Ordering::Relaxed);
    }

    pub fn clear(&self) {
        self.count.store(0, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// Integer gauge.
#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicI64,
}

impl Gauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Floating point gauge, stored as raw bits.
#[derive(Debug, Default)]
pub struct GaugeFloat {
    bits: AtomicU64,
}

impl GaugeFloat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn value(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Counts events and derives a mean rate since creation.
#[derive(Debug)]
pub struct Meter {
    count: AtomicI64,
    started: Instant,
}

impl Meter {
    pub fn new() -> Self {
        Self {
            count: AtomicI64::new(0),
            started: Instant::now(),
        }
    }

    pub fn mark(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Events per second since the meter was created.
    pub fn rate_mean(&self) -> f64 {
        let elapsed = self.started.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.count() as f64 / elapsed
    }
}

impl Default for Meter {
    fn default() -> Self {
        Self::new()
    }
}

/// Distribution of integer values backed by a [`Sample`].
pub struct Histogram {
    sample: Box<dyn Sample>,
}

impl Histogram {
    pub fn new(sample: impl Sample + 'static) -> Self {
        Self {
            sample: Box::new(sample),
        }
    }

    pub fn update(&self, value: i64) {
        self.sample.update(value);
    }

    pub fn snapshot(&self) -> SampleSnapshot {
        self.sample.snapshot()
    }

    pub fn clear(&self) {
        self.sample.clear();
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new(UniformSample::default())
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("count", &self.sample.snapshot().count())
            .finish()
    }
}

/// Histogram of durations in nanoseconds plus a meter of events.
#[derive(Debug, Default)]
pub struct Timer {
    histogram: Histogram,
    meter: Meter,
}

impl Timer {
    pub fn new(sample: impl Sample + 'static) -> Self {
        Self {
            histogram: Histogram::new(sample),
            meter: Meter::new(),
        }
    }

    /// Record one event of the given duration.
    pub fn update(&self, elapsed: Duration) {
        let nanos = i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark(1);
    }

    /// Record the duration between `start` and now.
    pub fn update_since(&self, start: Instant) {
        self.update(start.elapsed());
    }

    /// Run `f` and record how long it took.
    pub fn time<T>(&self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.update_since(start);
        result
    }

    pub fn count(&self) -> i64 {
        self.meter.count()
    }

    pub fn snapshot(&self) -> SampleSnapshot {
        self.histogram.snapshot()
    }
}

/// Kind discriminant of a registered metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Counter,
    Gauge,
    GaugeFloat,
    Histogram,
    Meter,
    Timer,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::GaugeFloat => "gauge_float",
            MetricKind::Histogram => "histogram",
            MetricKind::Meter => "meter",
            MetricKind::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared handle to a registered metric.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Gauge(Arc<Gauge>),
    GaugeFloat(Arc<GaugeFloat>),
    Histogram(Arc<Histogram>),
    Meter(Arc<Meter>),
    Timer(Arc<Timer>),
}

impl Metric {
    pub fn kind(&self) -> MetricKind {
        match self {
            Metric::Counter(_) => MetricKind::Counter,
            Metric::Gauge(_) => MetricKind::Gauge,
            Metric::GaugeFloat(_) => MetricKind::GaugeFloat,
            Metric::Histogram(_) => MetricKind::Histogram,
            Metric::Meter(_) => MetricKind::Meter,
            Metric::Timer(_) => MetricKind::Timer,
        }
    }

    /// Current scalar value, for metrics that have one.
    pub fn scalar(&self) -> Option<f64> {
        match self {
            Metric::Counter(c) => Some(c.count() as f64),
            Metric::Gauge(g) => Some(g.value() as f64),
            Metric::GaugeFloat(g) => Some(g.value()),
            _ => None,
        }
    }

    /// Current sample, for metrics that keep one.
    pub fn sample(&self) -> Option<SampleSnapshot> {
        match self {
            Metric::Histogram(h) => Some(h.snapshot()),
            Metric::Timer(t) => Some(t.snapshot()),
            _ => None,
        }
    }
}

impl From<Arc<Counter>> for Metric {
    fn from(m: Arc<Counter>) -> Self {
        Metric::Counter(m)
    }
}

impl From<Arc<Gauge>> for Metric {
    fn from(m: Arc<Gauge>) -> Self {
        Metric::Gauge(m)
    }
}

impl From<Arc<GaugeFloat>> for Metric {
    fn from(m: Arc<GaugeFloat>) -> Self {
        Metric::GaugeFloat(m)
    }
}

impl From<Arc<Histogram>> for Metric {
    fn from(m: Arc<Histogram>) -> Self {
        Metric::Histogram(m)
    }
}

impl From<Arc<Meter>> for Metric {
    fn from(m: Arc<Meter>) -> Self {
        Metric::Meter(m)
    }
}

impl From<Arc<Timer>> for Metric {
    fn from(m: Arc<Timer>) -> Self {
        Metric::Timer(m)
    }
}

/// Anything the sync engine can read metrics from.
pub trait MetricSource: Send + Sync {
    /// List every metric currently registered. Order is unspecified.
    fn enumerate(&self) -> Result<Vec<(String, Metric)>, SourceError>;
}

/// Thread-safe registry of named metrics.
#[derive(Debug, Default)]
pub struct Registry {
    metrics: RwLock<HashMap<String, Metric>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a metric under `name`.
    pub fn register(
        &self,
        name: impl Into<String>,
        metric: impl Into<Metric>,
    ) -> Result<(), SourceError> {
        let name = name.into();
        let mut metrics = self.metrics.write();
        if metrics.contains_key(&name) {
            return Err(SourceError::Duplicate(name));
        }
        metrics.insert(name, metric.into());
        Ok(())
    }

    /// Return the metric under `name`, registering `make()` if absent.
    pub fn get_or_register(&self, name: &str, make: impl FnOnce() -> Metric) -> Metric {
        if let Some(metric) = self.metrics.read().get(name) {
            return metric.clone();
        }
        self.metrics
            .write()
            .entry(name.to_string())
            .or_insert_with(make)
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.metrics.read().get(name).cloned()
    }

    pub fn unregister(&self, name: &str) -> Option<Metric> {
        self.metrics.write().remove(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }
}

impl MetricSource for Registry {
    fn enumerate(&self) -> Result<Vec<(String, Metric)>, SourceError> {
        Ok(self
            .metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect())
    }
}

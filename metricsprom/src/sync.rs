//! Sync engine: periodic projection of a source registry into the target registry.
//!
//! Each pass enumerates the source, parses every key, and republishes the
//! current values:
//!
//! - counters and gauges become gauge families holding the absolute snapshot
//! - histograms and timers become summary families with fixed quantiles
//! - anything else is skipped
//!
//! Families are registered lazily on first sight of a canonical name and
//! cached for the lifetime of the exporter. A metric whose family cannot be
//! registered is logged and skipped; it never aborts the pass.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::error::{SourceError, TargetError};
use crate::naming::{LABEL_NAMES, ParsedName, parse_metric_name};
use crate::sample::SampleSnapshot;
use crate::source::MetricSource;
use crate::target::{Family, FamilyKind, FamilyOpts, SharedRegistry, SummaryValue};

/// Quantiles exported for every summary.
pub const QUANTILES: [f64; 8] = [0.05, 0.1, 0.25, 0.5, 0.75, 0.9, 0.95, 0.99];

/// Export options, fixed for the lifetime of one exporter.
#[derive(Debug, Clone)]
pub struct Options {
    /// First component of every family name.
    pub namespace: String,
    /// Second component of every family name.
    pub subsystem: String,
    /// Registry receiving the families.
    pub registry: SharedRegistry,
    /// Delay between passes. Zero runs a single pass.
    pub refresh_interval: Duration,
}

impl Options {
    pub fn new(registry: SharedRegistry) -> Self {
        Self {
            namespace: String::new(),
            subsystem: String::new(),
            registry,
            refresh_interval: Duration::ZERO,
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = subsystem.into();
        self
    }

    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}

/// Outcome of a single pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Metrics written to the target registry.
    pub exported: usize,
    /// Keys that follow neither naming convention.
    pub unmatched: usize,
    /// Metrics of a kind with no target mapping.
    pub unsupported: usize,
    /// Metrics whose family or instance could not be written.
    pub failed: usize,
}

/// Republishes one source into the target registry.
pub struct Exporter<S: MetricSource + ?Sized> {
    source: Arc<S>,
    options: Options,
    gauges: HashMap<String, Arc<Family>>,
    summaries: HashMap<String, Arc<Family>>,
    passes: Arc<AtomicU64>,
}

impl<S: MetricSource + ?Sized> Exporter<S> {
    pub fn new(source: Arc<S>, options: Options) -> Self {
        Self {
            source,
            options,
            gauges: HashMap::new(),
            summaries: HashMap::new(),
            passes: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Number of families created by this exporter.
    pub fn family_count(&self) -> usize {
        self.gauges.len() + self.summaries.len()
    }

    /// Run one pass over the source.
    ///
    /// Only a failure to enumerate the source is returned; per-metric
    /// failures are logged and counted in [`PassStats::failed`].
    pub fn refresh(&mut self) -> Result<PassStats, SourceError> {
        let metrics = self.source.enumerate()?;
        let mut stats = PassStats::default();

        for (key, metric) in metrics {
            let Some(parsed) = parse_metric_name(&key) else {
                trace!(metric = %key, "Metric name not exportable");
                stats.unmatched += 1;
                continue;
            };

            let result = if let Some(value) = metric.scalar() {
                self.update_gauge(&parsed, value)
            } else if let Some(sample) = metric.sample() {
                self.update_summary(&parsed, &sample)
            } else {
                trace!(metric = %key, kind = %metric.kind(), "Metric kind not exportable");
                stats.unsupported += 1;
                continue;
            };

            match result {
                Ok(()) => stats.exported += 1,
                Err(e) => {
                    warn!(metric = %key, error = %e, "Failed to export metric");
                    stats.failed += 1;
                }
            }
        }

        self.passes.fetch_add(1, Ordering::Relaxed);
        Ok(stats)
    }

    /// Run one pass and log its outcome.
    fn refresh_logged(&mut self) {
        match self.refresh() {
            Ok(stats) => debug!(
                exported = stats.exported,
                unmatched = stats.unmatched,
                unsupported = stats.unsupported,
                failed = stats.failed,
                "Metrics refreshed"
            ),
            Err(e) => warn!(error = %e, "Metrics refresh failed"),
        }
    }

    fn update_gauge(&mut self, parsed: &ParsedName, value: f64) -> Result<(), TargetError> {
        let family = self.family(&parsed.name, FamilyKind::Gauge)?;
        family.instance(&parsed.label_values())?.set_gauge(value)
    }

    fn update_summary(
        &mut self,
        parsed: &ParsedName,
        sample: &SampleSnapshot,
    ) -> Result<(), TargetError> {
        let family = self.family(&parsed.name, FamilyKind::Summary)?;
        let quantiles = QUANTILES
            .iter()
            .copied()
            .zip(sample.percentiles(&QUANTILES))
            .collect();

        family.instance(&parsed.label_values())?.set_summary(SummaryValue {
            count: sample.count(),
            sum: sample.sum(),
            quantiles,
        })
    }

    /// Get the cached family for `name`, registering it on first use.
    fn family(&mut self, name: &str, kind: FamilyKind) -> Result<Arc<Family>, TargetError> {
        let cache = match kind {
            FamilyKind::Gauge => &mut self.gauges,
            FamilyKind::Summary => &mut self.summaries,
        };

        if let Some(family) = cache.get(name) {
            return Ok(family.clone());
        }

        let opts = FamilyOpts::new(name, name)
            .namespace(self.options.namespace.as_str())
            .subsystem(self.options.subsystem.as_str());
        let family = self
            .options
            .registry
            .register(opts, kind, &LABEL_NAMES)?;

        debug!(family = %family.name(), kind = kind.as_str(), "Registered metric family");
        cache.insert(name.to_string(), family.clone());
        Ok(family)
    }
}

impl<S: MetricSource + ?Sized + 'static> Exporter<S> {
    /// Refresh every `period` until shutdown is signalled.
    ///
    /// If the shutdown sender is dropped the loop keeps running.
    async fn run(mut self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut detached = false;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_logged();
                }
                changed = shutdown.changed(), if !detached => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => break,
                        Ok(()) => {}
                        Err(_) => detached = true,
                    }
                }
            }
        }

        info!(
            namespace = %self.options.namespace,
            subsystem = %self.options.subsystem,
            "Metrics export stopped"
        );
    }
}

/// Handle to a running export loop.
///
/// Dropping the handle leaves the loop running for the rest of the process.
pub struct ExportHandle {
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    passes: Arc<AtomicU64>,
}

impl ExportHandle {
    /// Whether a background loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Number of completed passes, including the initial one.
    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    /// Stop the loop and wait for the in-flight pass to finish.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!(error = %e, "Metrics export task failed");
        }
    }
}

/// Export `source` into `options.registry`.
///
/// Runs one pass before returning, so everything registered so far is
/// visible to the next scrape. With a non-zero refresh interval the pass then
/// repeats in a background task on the current tokio runtime; passes never
/// overlap. Nothing here panics or returns an error: failures are logged.
pub fn export_metrics<S>(source: Arc<S>, options: Options) -> ExportHandle
where
    S: MetricSource + ?Sized + 'static,
{
    let mut exporter = Exporter::new(source, options);
    exporter.refresh_logged();

    let passes = exporter.passes.clone();
    let period = exporter.options.refresh_interval;

    if period.is_zero() {
        return ExportHandle {
            shutdown: None,
            task: None,
            passes,
        };
    }

    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
        warn!("No tokio runtime available, metrics will not be refreshed");
        return ExportHandle {
            shutdown: None,
            task: None,
            passes,
        };
    };

    info!(
        namespace = %exporter.options.namespace,
        subsystem = %exporter.options.subsystem,
        interval_ms = period.as_millis() as u64,
        "Starting metrics export"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let task = runtime.spawn(exporter.run(period, shutdown_rx));

    ExportHandle {
        shutdown: Some(shutdown_tx),
        task: Some(task),
        passes,
    }
}

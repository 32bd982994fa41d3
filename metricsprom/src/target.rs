//! Typed Prometheus registry that the sync engine publishes into.
//!
//! Families are registered once under a fully-qualified name with a fixed
//! label schema. Each distinct label-value vector inside a family gets its own
//! [`Instance`]. The registry is shared behind an `Arc` and does its own
//! locking, so several writers and scrapers can use it concurrently.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::TargetError;
use crate::naming::{full_metric_name, is_valid_label_name, is_valid_metric_name};

/// Kind of values held by a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FamilyKind {
    Gauge,
    Summary,
}

impl FamilyKind {
    /// Get the TYPE comment string for Prometheus exposition format.
    pub fn as_str(&self) -> &'static str {
        match self {
            FamilyKind::Gauge => "gauge",
            FamilyKind::Summary => "summary",
        }
    }
}

/// Naming options for a family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyOpts {
    pub namespace: String,
    pub subsystem: String,
    pub name: String,
    pub help: String,
}

impl FamilyOpts {
    pub fn new(name: impl Into<String>, help: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            ..Default::default()
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

    /// `{namespace}_{subsystem}_{name}` with empty parts skipped.
    pub fn full_name(&self) -> String {
        full_metric_name(&self.namespace, &self.subsystem, &self.name)
    }
}

/// Observed state of a summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryValue {
    pub count: u64,
    pub sum: f64,
    /// `(quantile, value)` pairs in ascending quantile order.
    pub quantiles: Vec<(f64, f64)>,
}

/// Current value of an instance.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceValue {
    Gauge(f64),
    Summary(SummaryValue),
}

impl InstanceValue {
    fn kind_str(&self) -> &'static str {
        match self {
            InstanceValue::Gauge(_) => FamilyKind::Gauge.as_str(),
            InstanceValue::Summary(_) => FamilyKind::Summary.as_str(),
        }
    }

    /// Gauge value, if this is a gauge.
    pub fn as_gauge(&self) -> Option<f64> {
        match self {
            InstanceValue::Gauge(v) => Some(*v),
            InstanceValue::Summary(_) => None,
        }
    }

    /// Summary value, if this is a summary.
    pub fn as_summary(&self) -> Option<&SummaryValue> {
        match self {
            InstanceValue::Summary(s) => Some(s),
            InstanceValue::Gauge(_) => None,
        }
    }
}

/// One label vector's worth of state within a family.
#[derive(Debug)]
pub struct Instance {
    kind: FamilyKind,
    value: Mutex<InstanceValue>,
}

impl Instance {
    fn new(kind: FamilyKind) -> Self {
        let value = match kind {
            FamilyKind::Gauge => InstanceValue::Gauge(0.0),
            FamilyKind::Summary => InstanceValue::Summary(SummaryValue::default()),
        };
        Self {
            kind,
            value: Mutex::new(value),
        }
    }

    pub fn set_gauge(&self, value: f64) -> Result<(), TargetError> {
        self.set(InstanceValue::Gauge(value))
    }

    pub fn set_summary(&self, value: SummaryValue) -> Result<(), TargetError> {
        self.set(InstanceValue::Summary(value))
    }

    fn set(&self, value: InstanceValue) -> Result<(), TargetError> {
        if value.kind_str() != self.kind.as_str() {
            return Err(TargetError::KindMismatch {
                expected: self.kind.as_str(),
                got: value.kind_str(),
            });
        }
        *self.value.lock() = value;
        Ok(())
    }

    pub fn value(&self) -> InstanceValue {
        self.value.lock().clone()
    }
}

/// A named, typed group of instances sharing a label schema.
#[derive(Debug)]
pub struct Family {
    name: String,
    help: String,
    kind: FamilyKind,
    label_names: Vec<String>,
    instances: RwLock<BTreeMap<Vec<String>, Arc<Instance>>>,
}

impl Family {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn kind(&self) -> FamilyKind {
        self.kind
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    /// Look up or create the instance for `label_values`.
    ///
    /// Values are positional and must match the family's label names.
    pub fn instance(&self, label_values: &[&str]) -> Result<Arc<Instance>, TargetError> {
        if label_values.len() != self.label_names.len() {
            return Err(TargetError::LabelCardinality {
                expected: self.label_names.len(),
                got: label_values.len(),
            });
        }

        let key: Vec<String> = label_values.iter().map(|v| v.to_string()).collect();

        if let Some(instance) = self.instances.read().get(&key) {
            return Ok(instance.clone());
        }

        let instance = self
            .instances
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(Instance::new(self.kind)))
            .clone();
        Ok(instance)
    }

    /// Number of instances created so far.
    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    fn snapshot(&self) -> FamilySnapshot {
        let metrics = self
            .instances
            .read()
            .iter()
            .map(|(values, instance)| MetricSnapshot {
                labels: self
                    .label_names
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .collect(),
                value: instance.value(),
            })
            .collect();

        FamilySnapshot {
            name: self.name.clone(),
            help: self.help.clone(),
            kind: self.kind,
            metrics,
        }
    }
}

/// Point-in-time copy of a family.
#[derive(Debug, Clone, PartialEq)]
pub struct FamilySnapshot {
    pub name: String,
    pub help: String,
    pub kind: FamilyKind,
    /// Instances sorted by label values.
    pub metrics: Vec<MetricSnapshot>,
}

/// Point-in-time copy of an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSnapshot {
    /// Label name/value pairs in schema order.
    pub labels: Vec<(String, String)>,
    pub value: InstanceValue,
}

impl MetricSnapshot {
    /// Value of the label called `name`.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Thread-safe registry of metric families.
#[derive(Debug, Default)]
pub struct Registry {
    families: RwLock<BTreeMap<String, Arc<Family>>>,
}

/// Create a shareable registry handle.
pub type SharedRegistry = Arc<Registry>;

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new family.
    ///
    /// Fails if the name or a label name is invalid, or if any family is
    /// already registered under the same fully-qualified name. The existing
    /// family is left untouched in that case.
    pub fn register(
        &self,
        opts: FamilyOpts,
        kind: FamilyKind,
        label_names: &[&str],
    ) -> Result<Arc<Family>, TargetError> {
        let name = opts.full_name();
        if !is_valid_metric_name(&name) {
            return Err(TargetError::InvalidMetricName(name));
        }

        for (i, label) in label_names.iter().enumerate() {
            if !is_valid_label_name(label) || label_names[..i].contains(label) {
                return Err(TargetError::InvalidLabelName(label.to_string()));
            }
        }

        let mut families = self.families.write();
        if families.contains_key(&name) {
            return Err(TargetError::AlreadyRegistered(name));
        }

        let family = Arc::new(Family {
            name: name.clone(),
            help: opts.help,
            kind,
            label_names: label_names.iter().map(|l| l.to_string()).collect(),
            instances: RwLock::new(BTreeMap::new()),
        });
        families.insert(name, family.clone());
        Ok(family)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Family>> {
        self.families.read().get(name).cloned()
    }

    /// Remove a family. Returns whether it existed.
    pub fn unregister(&self, name: &str) -> bool {
        self.families.write().remove(name).is_some()
    }

    /// Number of registered families.
    pub fn len(&self) -> usize {
        self.families.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.read().is_empty()
    }

    /// Snapshot every family, sorted by name.
    ///
    /// Families without instances are omitted, as they have nothing to expose.
    pub fn gather(&self) -> Vec<FamilySnapshot> {
        let families: Vec<Arc<Family>> = self.families.read().values().cloned().collect();
        families
            .iter()
            .map(|family| family.snapshot())
            .filter(|snapshot| !snapshot.metrics.is_empty())
            .collect()
    }

    /// Render metrics in Prometheus exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        for family in self.gather() {
            writeln!(output, "# HELP {} {}", family.name, escape_help(&family.help)).ok();
            writeln!(output, "# TYPE {} {}", family.name, family.kind.as_str()).ok();

            for metric in &family.metrics {
                match &metric.value {
                    InstanceValue::Gauge(value) => {
                        writeln!(
                            output,
                            "{}{} {}",
                            family.name,
                            format_labels(&metric.labels, None),
                            format_value(*value)
                        )
                        .ok();
                    }
                    InstanceValue::Summary(summary) => {
                        for (q, value) in &summary.quantiles {
                            let quantile = format_value(*q);
                            writeln!(
                                output,
                                "{}{} {}",
                                family.name,
                                format_labels(&metric.labels, Some(("quantile", &quantile))),
                                format_value(*value)
                            )
                            .ok();
                        }
                        let labels = format_labels(&metric.labels, None);
                        writeln!(
                            output,
                            "{}_sum{} {}",
                            family.name,
                            labels,
                            format_value(summary.sum)
                        )
                        .ok();
                        writeln!(output, "{}_count{} {}", family.name, labels, summary.count).ok();
                    }
                }
            }
        }

        output
    }
}

/// Escape special characters in label values.
fn escape_label_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            _ => result.push(c),
        }
    }
    result
}

/// Escape special characters in HELP text.
fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

/// Format a floating point value for Prometheus.
fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_positive() {
            "+Inf".to_string()
        } else {
            "-Inf".to_string()
        }
    } else if value.fract() == 0.0 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Format labels for Prometheus exposition format, with an optional extra pair.
fn format_labels(labels: &[(String, String)], extra: Option<(&str, &str)>) -> String {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();

    if let Some((k, v)) = extra {
        parts.push(format!("{}=\"{}\"", k, escape_label_value(v)));
    }

    if parts.is_empty() {
        return String::new();
    }

    format!("{{{}}}", parts.join(","))
}

//! Integration tests for the sync engine.
//!
//! These tests verify the full flow from metrics registered in a source
//! registry to families gathered from the target registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use metricsprom::source::{Counter, Histogram, Registry};
use metricsprom::target::{FamilyKind, FamilyOpts, Registry as TargetRegistry};
use metricsprom::{Options, QUANTILES, SharedRegistry, UniformSample, export_metrics};

#[derive(Debug, PartialEq)]
struct GaugeDetails {
    name: String,
    labels: HashMap<String, String>,
    value: f64,
}

/// Helper to collect every gauge instance of a family.
fn gauge_details(registry: &TargetRegistry, full_name: &str) -> Option<Vec<GaugeDetails>> {
    let family = registry
        .gather()
        .into_iter()
        .find(|family| family.name == full_name)?;

    Some(
        family
            .metrics
            .iter()
            .map(|metric| GaugeDetails {
                name: family.name.clone(),
                labels: metric.labels.iter().cloned().collect(),
                value: metric.value.as_gauge().unwrap_or(f64::NAN),
            })
            .collect(),
    )
}

fn labels(broker: &str, topic: &str) -> HashMap<String, String> {
    HashMap::from([
        ("broker".to_string(), broker.to_string()),
        ("topic".to_string(), topic.to_string()),
    ])
}

fn test_options(registry: &SharedRegistry) -> Options {
    Options::new(registry.clone())
        .namespace("test")
        .subsystem("subsys")
}

#[test]
fn test_metric_creation() {
    let source = Arc::new(Registry::new());
    source
        .register("counter-for-broker-123", Arc::new(Counter::new()))
        .unwrap();
    let registry: SharedRegistry = Arc::new(TargetRegistry::new());

    export_metrics(source, test_options(&registry));

    // The family now exists, so registering it again must fail.
    let result = registry.register(
        FamilyOpts::new("counter", "counter")
            .namespace("test")
            .subsystem("subsys"),
        FamilyKind::Gauge,
        &["broker", "topic"],
    );
    assert!(result.is_err(), "Exported family was not registered");
}

#[test]
fn test_labels() {
    let source = Arc::new(Registry::new());
    source
        .register("counter1-for-broker-123", Arc::new(Counter::new()))
        .unwrap();
    source
        .register("counter2-for-topic-abc", Arc::new(Counter::new()))
        .unwrap();
    source
        .register("skip-counter", Arc::new(Counter::new()))
        .unwrap();
    let registry: SharedRegistry = Arc::new(TargetRegistry::new());

    export_metrics(source, test_options(&registry));

    assert_eq!(
        gauge_details(&registry, "test_subsys_counter1"),
        Some(vec![GaugeDetails {
            name: "test_subsys_counter1".to_string(),
            labels: labels("123", ""),
            value: 0.0,
        }])
    );
    assert_eq!(
        gauge_details(&registry, "test_subsys_counter2"),
        Some(vec![GaugeDetails {
            name: "test_subsys_counter2".to_string(),
            labels: labels("", "abc"),
            value: 0.0,
        }])
    );
    assert_eq!(gauge_details(&registry, "test_subsys_skip_counter"), None);
    assert_eq!(gauge_details(&registry, "test_subsys_skip"), None);
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn test_metric_update() {
    let source = Arc::new(Registry::new());
    let counter = Arc::new(Counter::new());
    source
        .register("counter-for-broker-5", counter.clone())
        .unwrap();
    let registry: SharedRegistry = Arc::new(TargetRegistry::new());

    let handle = export_metrics(
        source,
        test_options(&registry).refresh_interval(Duration::from_millis(100)),
    );

    let expect = |value: f64| {
        Some(vec![GaugeDetails {
            name: "test_subsys_counter".to_string(),
            labels: labels("5", ""),
            value,
        }])
    };

    // by default metric is 0
    assert_eq!(gauge_details(&registry, "test_subsys_counter"), expect(0.0));

    counter.inc(10);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(gauge_details(&registry, "test_subsys_counter"), expect(10.0));

    counter.inc(10);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(gauge_details(&registry, "test_subsys_counter"), expect(20.0));

    handle.stop().await;
}

#[tokio::test]
async fn test_idempotent_passes() {
    let source = Arc::new(Registry::new());
    let counter = Arc::new(Counter::new());
    counter.inc(7);
    source
        .register("counter-for-broker-1", counter.clone())
        .unwrap();
    let histogram = Arc::new(Histogram::default());
    histogram.update(3);
    source
        .register("latency-for-topic-t", histogram.clone())
        .unwrap();
    let registry: SharedRegistry = Arc::new(TargetRegistry::new());

    let handle = export_metrics(
        source,
        test_options(&registry).refresh_interval(Duration::from_millis(20)),
    );
    let first = registry.gather();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(handle.passes() > 2);
    assert_eq!(registry.gather(), first);

    handle.stop().await;
}

#[tokio::test]
async fn test_summary() {
    let source = Arc::new(Registry::new());
    let histogram = Arc::new(Histogram::new(UniformSample::new(1028)));
    source
        .register("metric-for-topic-x", histogram.clone())
        .unwrap();

    for _ in 0..94 {
        histogram.update(1);
    }
    for _ in 0..5 {
        histogram.update(5);
    }
    histogram.update(10);

    let registry: SharedRegistry = Arc::new(TargetRegistry::new());
    let handle = export_metrics(
        source,
        test_options(&registry).refresh_interval(Duration::from_millis(100)),
    );
    tokio::time::sleep(Duration::from_millis(300)).await;

    let families = registry.gather();
    assert_eq!(families.len(), 1);

    let family = &families[0];
    assert_eq!(family.name, "test_subsys_metric");
    assert_eq!(family.help, "metric");
    assert_eq!(family.kind, FamilyKind::Summary);
    assert_eq!(family.metrics.len(), 1);

    let metric = &family.metrics[0];
    assert_eq!(metric.label("broker"), Some(""));
    assert_eq!(metric.label("topic"), Some("x"));

    let summary = metric.value.as_summary().unwrap();
    assert_eq!(summary.count, 100);
    assert_eq!(summary.sum, 129.0);

    let expected = [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 5.0, 9.95];
    assert_eq!(summary.quantiles.len(), QUANTILES.len());
    for ((q, value), (want_q, want)) in summary
        .quantiles
        .iter()
        .zip(QUANTILES.iter().zip(expected.iter()))
    {
        assert_eq!(q, want_q);
        assert!(
            (value - want).abs() < 1e-9,
            "quantile {q}: got {value}, want {want}"
        );
    }

    handle.stop().await;
}

#[test]
fn test_render_exposition() {
    let source = Arc::new(Registry::new());
    let counter = Arc::new(Counter::new());
    counter.inc(42);
    source
        .register("requests-for-broker-1", counter)
        .unwrap();
    let registry: SharedRegistry = Arc::new(TargetRegistry::new());

    export_metrics(source, test_options(&registry));

    let output = registry.render();
    assert!(output.contains("# HELP test_subsys_requests requests"));
    assert!(output.contains("# TYPE test_subsys_requests gauge"));
    assert!(output.contains("test_subsys_requests{broker=\"1\",topic=\"\"} 42"));
}

//! Synthetic client metrics for demo mode.
//!
//! Registers producer-style metrics in a source registry and records random
//! traffic on a timer, so the exporter has something to serve without a real
//! client attached.

use std::sync::Arc;
use std::time::Duration;

use metricsprom::SourceError;
use metricsprom::source::{Counter, Gauge, Histogram, Meter, Registry};
use rand::Rng;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info};

use crate::config::DemoConfig;

struct BrokerMetrics {
    requests: Arc<Counter>,
    in_flight: Arc<Gauge>,
    latency_ms: Arc<Histogram>,
    byte_rate: Arc<Meter>,
}

struct TopicMetrics {
    records: Arc<Counter>,
    batch_size: Arc<Histogram>,
}

/// Generates random traffic into a source registry.
pub struct DemoLoad {
    update_interval: Duration,
    brokers: Vec<BrokerMetrics>,
    topics: Vec<TopicMetrics>,
    total_requests: Arc<Counter>,
}

impl DemoLoad {
    /// Register the demo metrics in `registry`.
    pub fn new(config: &DemoConfig, registry: &Registry) -> Result<Self, SourceError> {
        let mut brokers = Vec::with_capacity(config.brokers.len());
        for id in &config.brokers {
            let metrics = BrokerMetrics {
                requests: Arc::new(Counter::new()),
                in_flight: Arc::new(Gauge::new()),
                latency_ms: Arc::new(Histogram::default()),
                byte_rate: Arc::new(Meter::new()),
            };
            registry.register(format!("requests-for-broker-{id}"), metrics.requests.clone())?;
            registry.register(
                format!("requests_in_flight-for-broker-{id}"),
                metrics.in_flight.clone(),
            )?;
            registry.register(
                format!("request_latency_ms-for-broker-{id}"),
                metrics.latency_ms.clone(),
            )?;
            registry.register(
                format!("incoming_byte_rate-for-broker-{id}"),
                metrics.byte_rate.clone(),
            )?;
            brokers.push(metrics);
        }

        let mut topics = Vec::with_capacity(config.topics.len());
        for name in &config.topics {
            let metrics = TopicMetrics {
                records: Arc::new(Counter::new()),
                batch_size: Arc::new(Histogram::default()),
            };
            registry.register(format!("records-for-topic-{name}"), metrics.records.clone())?;
            registry.register(
                format!("batch_size-for-topic-{name}"),
                metrics.batch_size.clone(),
            )?;
            topics.push(metrics);
        }

        // Aggregate without a broker or topic, never exported.
        let total_requests = Arc::new(Counter::new());
        registry.register("requests", total_requests.clone())?;

        info!(
            brokers = brokers.len(),
            topics = topics.len(),
            metrics = registry.len(),
            "Demo metrics registered"
        );

        Ok(Self {
            update_interval: Duration::from_millis(config.update_interval_ms),
            brokers,
            topics,
            total_requests,
        })
    }

    /// Record one round of random traffic.
    pub fn tick(&self) {
        let mut rng = rand::rng();

        for broker in &self.brokers {
            let requests = rng.random_range(1..20);
            broker.requests.inc(requests);
            self.total_requests.inc(requests);
            broker.in_flight.update(rng.random_range(0..5));
            broker.byte_rate.mark(rng.random_range(512..65_536));
            for _ in 0..requests {
                // mostly fast, occasionally slow
                let latency = if rng.random_bool(0.05) {
                    rng.random_range(100..500)
                } else {
                    rng.random_range(1..20)
                };
                broker.latency_ms.update(latency);
            }
        }

        for topic in &self.topics {
            let batches = rng.random_range(1..5);
            for _ in 0..batches {
                let size = rng.random_range(1..200);
                topic.records.inc(size);
                topic.batch_size.update(size);
            }
        }
    }

    /// Record traffic until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(self.update_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick();
                    debug!(requests = self.total_requests.count(), "Demo traffic recorded");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Demo load stopped");
    }
}

//! Mapping from source metric keys to Prometheus names and labels.
//!
//! Source keys carry their label in the name itself:
//!
//! ```text
//! request-latency-for-broker-3      -> request-latency {broker="3", topic=""}
//! record-send-rate-for-topic-orders -> record-send-rate {broker="", topic="orders"}
//! ```
//!
//! Keys that follow neither convention are not exported.

/// Separator introducing a broker id.
pub const BROKER_MARKER: &str = "-for-broker-";

/// Separator introducing a topic name.
pub const TOPIC_MARKER: &str = "-for-topic-";

/// Label schema shared by every exported family.
pub const LABEL_NAMES: [&str; 2] = ["broker", "topic"];

/// A source key split into its canonical name and label values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedName {
    /// Local metric name with the broker/topic suffix removed.
    pub name: String,
    /// Broker id, empty when the key names a topic.
    pub broker: String,
    /// Topic name, empty when the key names a broker.
    pub topic: String,
}

impl ParsedName {
    /// Label values in [`LABEL_NAMES`] order.
    pub fn label_values(&self) -> [&str; 2] {
        [&self.broker, &self.topic]
    }
}

/// Parse a source metric key.
///
/// The split happens at the first occurrence of the marker, so the canonical
/// name may itself contain hyphens. The broker form is tried first.
pub fn parse_metric_name(key: &str) -> Option<ParsedName> {
    if let Some((name, broker)) = key.split_once(BROKER_MARKER) {
        return Some(ParsedName {
            name: name.to_string(),
            broker: broker.to_string(),
            topic: String::new(),
        });
    }

    key.split_once(TOPIC_MARKER).map(|(name, topic)| ParsedName {
        name: name.to_string(),
        broker: String::new(),
        topic: topic.to_string(),
    })
}

/// Build a fully-qualified metric name.
///
/// Format: `{namespace}_{subsystem}_{name}`, skipping empty components.
/// No sanitization is applied; invalid names are rejected at registration.
pub fn full_metric_name(namespace: &str, subsystem: &str, name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    [namespace, subsystem, name]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_")
}

/// Check a name against `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

/// Check a label name against `[a-zA-Z_][a-zA-Z0-9_]*`.
///
/// Names starting with `__` are reserved for internal use.
pub fn is_valid_label_name(name: &str) -> bool {
    if name.starts_with("__") {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

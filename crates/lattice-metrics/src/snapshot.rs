//! Snapshot types exchanged between worker processes and the exporter.
//!
//! A [`RegistrySnapshot`] is a point-in-time, by-value copy of one
//! process's aggregate state. Registries are never shared across process
//! boundaries; the exporter merges these snapshots instead. All types are
//! serializable to JSON for transport.

use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Fully-resolved label mapping for one series. Ordered so that equal
/// label sets compare and hash identically regardless of insertion order.
pub type LabelSet = BTreeMap<String, String>;

/// The three metric kinds supported by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    /// Exposition `# TYPE` label for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }
}

/// Cumulative count of observations at or below a finite boundary.
///
/// The `+Inf` bucket is not carried on the wire; it always equals the
/// histogram's total count and is reconstructed at render time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketCount {
    pub le: f64,
    pub count: u64,
}

/// Aggregate value of one series at snapshot time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SeriesValue {
    /// Monotonic total.
    Counter { total: f64 },
    /// Last-set value with its capture timestamp (epoch milliseconds).
    Gauge { value: f64, stamp_ms: u64 },
    /// Observation count, exact sum, and cumulative bucket counts.
    Histogram {
        count: u64,
        sum: f64,
        buckets: Vec<BucketCount>,
    },
}

/// One series: a label set and its aggregate value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub labels: LabelSet,
    pub value: SeriesValue,
}

/// All series of one named metric, with its help text and kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricFamily {
    pub name: String,
    pub kind: MetricKind,
    pub help: String,
    pub series: Vec<SeriesPoint>,
}

/// Point-in-time copy of one process's registry, tagged with the
/// reporting process's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub source: String,
    pub captured_ms: u64,
    pub families: Vec<MetricFamily>,
}

/// Milliseconds since the Unix epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

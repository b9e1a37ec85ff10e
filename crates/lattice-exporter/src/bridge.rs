//! Snapshot collection and cross-process merge.
//!
//! The bridge retains the most recent [`RegistrySnapshot`] per source
//! process and merges them by value on demand: counters and histogram
//! fields are summed, gauges resolve to the most recent value. No state
//! is shared across process boundaries and no cross-process locking is
//! involved — merging works purely on independently-collected copies.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use lattice_metrics::{LabelSet, MetricFamily, MetricKind, RegistrySnapshot, SeriesPoint, SeriesValue};

/// Collects per-process snapshots and merges them for exposition.
///
/// Cloning is cheap and shares the underlying state.
#[derive(Clone, Default)]
pub struct ExporterBridge {
    /// Latest snapshot per source id. A `BTreeMap` so merge order (and
    /// therefore gauge tie-breaking) is deterministic regardless of
    /// report arrival order.
    snapshots: Arc<RwLock<BTreeMap<String, RegistrySnapshot>>>,
}

impl ExporterBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the retained snapshot for the reporting source.
    pub fn report(&self, snapshot: RegistrySnapshot) {
        debug!(
            source = %snapshot.source,
            families = snapshot.families.len(),
            "snapshot received"
        );
        let mut snapshots = self.snapshots.write().expect("snapshots lock");
        snapshots.insert(snapshot.source.clone(), snapshot);
    }

    /// Source ids that have reported at least once.
    pub fn sources(&self) -> Vec<String> {
        let snapshots = self.snapshots.read().expect("snapshots lock");
        snapshots.keys().cloned().collect()
    }

    /// Merge all retained snapshots into one family list, sorted by
    /// metric name and label set.
    ///
    /// Series sharing `(name, labels)` across sources are combined:
    /// counter totals and histogram count/sum/buckets are summed; gauges
    /// keep the value with the latest timestamp, ties going to the
    /// lexicographically greatest source id.
    pub fn merged(&self) -> Vec<MetricFamily> {
        let snapshots = self.snapshots.read().expect("snapshots lock");

        struct Accum {
            kind: MetricKind,
            help: String,
            series: BTreeMap<LabelSet, SeriesValue>,
        }
        let mut accums: BTreeMap<String, Accum> = BTreeMap::new();

        for snapshot in snapshots.values() {
            for family in &snapshot.families {
                let accum = accums.entry(family.name.clone()).or_insert_with(|| Accum {
                    kind: family.kind,
                    help: family.help.clone(),
                    series: BTreeMap::new(),
                });
                if accum.kind != family.kind {
                    warn!(
                        metric = %family.name,
                        source = %snapshot.source,
                        "metric kind mismatch across sources, skipping"
                    );
                    continue;
                }
                for point in &family.series {
                    match accum.series.get_mut(&point.labels) {
                        None => {
                            accum.series.insert(point.labels.clone(), point.value.clone());
                        }
                        Some(existing) => merge_value(existing, &point.value, &family.name),
                    }
                }
            }
        }

        accums
            .into_iter()
            .map(|(name, accum)| MetricFamily {
                name,
                kind: accum.kind,
                help: accum.help,
                series: accum
                    .series
                    .into_iter()
                    .map(|(labels, value)| SeriesPoint { labels, value })
                    .collect(),
            })
            .collect()
    }

    /// Render the merged snapshot as Prometheus exposition text.
    pub fn render(&self) -> String {
        lattice_metrics::prometheus::render(&self.merged())
    }
}

fn merge_value(into: &mut SeriesValue, from: &SeriesValue, metric: &str) {
    match (into, from) {
        (SeriesValue::Counter { total }, SeriesValue::Counter { total: other }) => {
            *total += other;
        }
        (
            SeriesValue::Gauge { value, stamp_ms },
            SeriesValue::Gauge { value: other, stamp_ms: other_stamp },
        ) => {
            // Sources are visited in ascending id order, so `>=` gives
            // ties to the greatest source id.
            if *other_stamp >= *stamp_ms {
                *value = *other;
                *stamp_ms = *other_stamp;
            }
        }
        (
            SeriesValue::Histogram { count, sum, buckets },
            SeriesValue::Histogram { count: other_count, sum: other_sum, buckets: other_buckets },
        ) => {
            let same_shape = buckets.len() == other_buckets.len()
                && buckets.iter().zip(other_buckets).all(|(a, b)| a.le == b.le);
            if !same_shape {
                warn!(metric, "histogram boundary mismatch across sources, skipping");
                return;
            }
            *count += other_count;
            *sum += other_sum;
            for (bucket, other_bucket) in buckets.iter_mut().zip(other_buckets) {
                bucket.count += other_bucket.count;
            }
        }
        _ => warn!(metric, "series kind mismatch across sources, skipping"),
    }
}

//! Per-process metric registry and aggregation engine.
//!
//! The registry owns every metric created in this process and its live
//! series table. Each recording resolves a full label set (default tags,
//! then runtime tags, then context-injected system keys) and updates the
//! matching series aggregate in place.
//!
//! Concurrency: the metric map and each per-metric series map sit behind
//! `std::sync::RwLock`; individual series cells are `Arc<Mutex<_>>`, so
//! recordings against distinct series only share read locks. [`Registry::collect`]
//! copies aggregates out under the same short critical sections and never
//! blocks writers for long.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::context;
use crate::error::{MetricsError, MetricsResult};
use crate::handle::{Counter, Gauge, Histogram};
use crate::snapshot::{
    epoch_millis, BucketCount, LabelSet, MetricFamily, MetricKind, RegistrySnapshot, SeriesPoint,
    SeriesValue,
};

/// Tag keys injected from the active [`context::ObservationContext`].
///
/// These are implicitly part of every metric's schema and never need to
/// be declared in `tag_keys`.
pub const SYSTEM_TAG_KEYS: [&str; 3] = ["deployment", "replica", "route"];

/// One metric's definition, default tags, and live series table.
pub(crate) struct MetricEntry {
    pub(crate) name: String,
    pub(crate) kind: MetricKind,
    pub(crate) help: String,
    pub(crate) tag_keys: Vec<String>,
    /// Histogram bucket boundaries; empty for counters and gauges.
    pub(crate) boundaries: Vec<f64>,
    default_tags: RwLock<LabelSet>,
    series: RwLock<HashMap<LabelSet, Arc<Mutex<SeriesCell>>>>,
}

impl MetricEntry {
    fn new(name: String, kind: MetricKind, help: String, tag_keys: Vec<String>, boundaries: Vec<f64>) -> Self {
        Self {
            name,
            kind,
            help,
            tag_keys,
            boundaries,
            default_tags: RwLock::new(LabelSet::new()),
            series: RwLock::new(HashMap::new()),
        }
    }

    /// Reject any tag key that was not declared at creation.
    fn validate(&self, tags: &[(&str, &str)]) -> MetricsResult<()> {
        for (key, _) in tags {
            if !self.tag_keys.iter().any(|declared| declared.as_str() == *key) {
                return Err(MetricsError::UnknownTagKey {
                    metric: self.name.clone(),
                    key: (*key).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Overwrite the default tags used for subsequent recordings.
    pub(crate) fn set_default_tags(&self, tags: &[(&str, &str)]) -> MetricsResult<()> {
        self.validate(tags)?;
        let mut defaults = self.default_tags.write().expect("default tags lock");
        *defaults = tags
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Ok(())
    }

    /// Resolve the full label set for one recording: defaults, overridden
    /// by runtime tags, overridden by whatever system keys the active
    /// observation context carries.
    pub(crate) fn resolve(&self, tags: &[(&str, &str)]) -> MetricsResult<LabelSet> {
        self.validate(tags)?;

        let mut labels = self.default_tags.read().expect("default tags lock").clone();
        for (key, value) in tags {
            labels.insert((*key).to_string(), (*value).to_string());
        }

        let ctx = context::current();
        if let Some(deployment) = ctx.deployment {
            labels.insert("deployment".to_string(), deployment);
        }
        if let Some(replica) = ctx.replica {
            labels.insert("replica".to_string(), replica);
        }
        if let Some(route) = ctx.route {
            labels.insert("route".to_string(), route);
        }
        Ok(labels)
    }

    /// Fetch or create the series cell for a resolved label set.
    pub(crate) fn cell(&self, labels: LabelSet) -> Arc<Mutex<SeriesCell>> {
        if let Some(cell) = self.series.read().expect("series lock").get(&labels) {
            return cell.clone();
        }
        let mut series = self.series.write().expect("series lock");
        series
            .entry(labels)
            .or_insert_with(|| Arc::new(Mutex::new(SeriesCell::empty(self.kind, self.boundaries.len()))))
            .clone()
    }
}

/// Running aggregate for one `(metric, label set)` pair.
pub(crate) enum SeriesCell {
    Counter { total: f64 },
    Gauge { value: f64, stamp_ms: u64 },
    Histogram { count: u64, sum: f64, buckets: Vec<u64> },
}

impl SeriesCell {
    fn empty(kind: MetricKind, bucket_count: usize) -> Self {
        match kind {
            MetricKind::Counter => SeriesCell::Counter { total: 0.0 },
            MetricKind::Gauge => SeriesCell::Gauge { value: 0.0, stamp_ms: 0 },
            MetricKind::Histogram => SeriesCell::Histogram {
                count: 0,
                sum: 0.0,
                buckets: vec![0; bucket_count],
            },
        }
    }

    pub(crate) fn add(&mut self, amount: f64) {
        if let SeriesCell::Counter { total } = self {
            *total += amount;
        }
    }

    pub(crate) fn set(&mut self, new_value: f64) {
        if let SeriesCell::Gauge { value, stamp_ms } = self {
            *value = new_value;
            *stamp_ms = epoch_millis();
        }
    }

    /// Record into every cumulative bucket whose boundary admits `value`.
    pub(crate) fn observe(&mut self, value: f64, boundaries: &[f64]) {
        if let SeriesCell::Histogram { count, sum, buckets } = self {
            *count += 1;
            *sum += value;
            for (bucket, boundary) in buckets.iter_mut().zip(boundaries) {
                if value <= *boundary {
                    *bucket += 1;
                }
            }
        }
    }

    fn snapshot_value(&self, boundaries: &[f64]) -> SeriesValue {
        match self {
            SeriesCell::Counter { total } => SeriesValue::Counter { total: *total },
            SeriesCell::Gauge { value, stamp_ms } => SeriesValue::Gauge {
                value: *value,
                stamp_ms: *stamp_ms,
            },
            SeriesCell::Histogram { count, sum, buckets } => SeriesValue::Histogram {
                count: *count,
                sum: *sum,
                buckets: boundaries
                    .iter()
                    .zip(buckets)
                    .map(|(le, count)| BucketCount { le: *le, count: *count })
                    .collect(),
            },
        }
    }
}

struct RegistryInner {
    /// Identity of the owning process, stamped on every snapshot.
    source: String,
    metrics: RwLock<HashMap<String, Arc<MetricEntry>>>,
}

/// Process-owned registry of all metric handles and their aggregates.
///
/// Cloning is cheap and shares the underlying state. A registry is never
/// shared across process boundaries; cross-process aggregation happens
/// only through [`Registry::collect`] snapshots.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

impl Registry {
    /// Create a registry for the process identified by `source`.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                source: source.into(),
                metrics: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The owning process identity.
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Register a monotonic counter.
    pub fn counter(&self, name: &str, help: &str, tag_keys: &[&str]) -> MetricsResult<Counter> {
        let entry = self.register(name, MetricKind::Counter, help, tag_keys, Vec::new())?;
        Ok(Counter::new(entry))
    }

    /// Register a last-write-wins gauge.
    pub fn gauge(&self, name: &str, help: &str, tag_keys: &[&str]) -> MetricsResult<Gauge> {
        let entry = self.register(name, MetricKind::Gauge, help, tag_keys, Vec::new())?;
        Ok(Gauge::new(entry))
    }

    /// Register a histogram with the given cumulative bucket boundaries.
    pub fn histogram(
        &self,
        name: &str,
        help: &str,
        boundaries: &[f64],
        tag_keys: &[&str],
    ) -> MetricsResult<Histogram> {
        if boundaries.is_empty() || boundaries.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(MetricsError::InvalidBoundaries(name.to_string()));
        }
        let entry = self.register(name, MetricKind::Histogram, help, tag_keys, boundaries.to_vec())?;
        Ok(Histogram::new(entry))
    }

    fn register(
        &self,
        name: &str,
        kind: MetricKind,
        help: &str,
        tag_keys: &[&str],
        boundaries: Vec<f64>,
    ) -> MetricsResult<Arc<MetricEntry>> {
        let mut metrics = self.inner.metrics.write().expect("metrics lock");
        if metrics.contains_key(name) {
            return Err(MetricsError::DuplicateName(name.to_string()));
        }
        let entry = Arc::new(MetricEntry::new(
            name.to_string(),
            kind,
            help.to_string(),
            tag_keys.iter().map(|key| (*key).to_string()).collect(),
            boundaries,
        ));
        metrics.insert(name.to_string(), entry.clone());
        debug!(metric = name, kind = kind.as_str(), source = %self.inner.source, "registered metric");
        Ok(entry)
    }

    /// Consistent point-in-time copy of every series in this registry,
    /// sorted by metric name and label set for deterministic output.
    pub fn collect(&self) -> RegistrySnapshot {
        let metrics = self.inner.metrics.read().expect("metrics lock");
        let mut families: Vec<MetricFamily> = metrics
            .values()
            .map(|entry| {
                let series_map = entry.series.read().expect("series lock");
                let mut series: Vec<SeriesPoint> = series_map
                    .iter()
                    .map(|(labels, cell)| SeriesPoint {
                        labels: labels.clone(),
                        value: cell
                            .lock()
                            .expect("series cell lock")
                            .snapshot_value(&entry.boundaries),
                    })
                    .collect();
                series.sort_by(|a, b| a.labels.cmp(&b.labels));
                MetricFamily {
                    name: entry.name.clone(),
                    kind: entry.kind,
                    help: entry.help.clone(),
                    series,
                }
            })
            .collect();
        families.sort_by(|a, b| a.name.cmp(&b.name));
        RegistrySnapshot {
            source: self.inner.source.clone(),
            captured_ms: epoch_millis(),
            families,
        }
    }
}

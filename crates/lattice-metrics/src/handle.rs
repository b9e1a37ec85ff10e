//! Metric handles — the typed recording points handed out by the registry.
//!
//! A handle is cheap to clone and safe to record through from any task.
//! Every recording resolves its label set (defaults, runtime tags, active
//! observation context) and updates the matching series aggregate; a
//! rejected recording changes nothing.

use std::sync::Arc;

use crate::error::{MetricsError, MetricsResult};
use crate::registry::MetricEntry;

/// Monotonic counter. Totals never decrease within a process lifetime.
#[derive(Clone)]
pub struct Counter {
    entry: Arc<MetricEntry>,
}

impl std::fmt::Debug for Counter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter").field("name", &self.entry.name).finish()
    }
}

impl Counter {
    pub(crate) fn new(entry: Arc<MetricEntry>) -> Self {
        Self { entry }
    }

    /// The metric name this handle records under.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Overwrite the default tags applied to subsequent recordings.
    pub fn set_default_tags(&self, tags: &[(&str, &str)]) -> MetricsResult<()> {
        self.entry.set_default_tags(tags)
    }

    /// Increment by one with no runtime tags.
    pub fn inc(&self) -> MetricsResult<()> {
        self.inc_by(1.0, &[])
    }

    /// Increment by `amount` under the given runtime tags.
    pub fn inc_by(&self, amount: f64, tags: &[(&str, &str)]) -> MetricsResult<()> {
        if amount < 0.0 {
            return Err(MetricsError::NegativeIncrement {
                metric: self.entry.name.clone(),
                amount,
            });
        }
        let labels = self.entry.resolve(tags)?;
        self.entry.cell(labels).lock().expect("series cell lock").add(amount);
        Ok(())
    }
}

/// Last-write-wins gauge with a capture timestamp per set.
#[derive(Clone)]
pub struct Gauge {
    entry: Arc<MetricEntry>,
}

impl Gauge {
    pub(crate) fn new(entry: Arc<MetricEntry>) -> Self {
        Self { entry }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn set_default_tags(&self, tags: &[(&str, &str)]) -> MetricsResult<()> {
        self.entry.set_default_tags(tags)
    }

    /// Overwrite the current value under the given runtime tags.
    pub fn set(&self, value: f64, tags: &[(&str, &str)]) -> MetricsResult<()> {
        let labels = self.entry.resolve(tags)?;
        self.entry.cell(labels).lock().expect("series cell lock").set(value);
        Ok(())
    }
}

/// Latency-bucketed histogram with cumulative bucket counts.
#[derive(Clone)]
pub struct Histogram {
    entry: Arc<MetricEntry>,
}

impl Histogram {
    pub(crate) fn new(entry: Arc<MetricEntry>) -> Self {
        Self { entry }
    }

    pub fn name(&self) -> &str {
        &self.entry.name
    }

    pub fn set_default_tags(&self, tags: &[(&str, &str)]) -> MetricsResult<()> {
        self.entry.set_default_tags(tags)
    }

    /// Record one observation under the given runtime tags.
    ///
    /// Every bucket whose boundary is `>= value` is incremented; count and
    /// sum always are.
    pub fn observe(&self, value: f64, tags: &[(&str, &str)]) -> MetricsResult<()> {
        let labels = self.entry.resolve(tags)?;
        self.entry
            .cell(labels)
            .lock()
            .expect("series cell lock")
            .observe(value, &self.entry.boundaries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::Registry;
    use crate::snapshot::SeriesValue;

    #[test]
    fn counter_sums_exactly() {
        let registry = Registry::new("test");
        let counter = registry.counter("reqs", "requests", &[]).unwrap();
        counter.inc().unwrap();
        counter.inc_by(2.5, &[]).unwrap();
        counter.inc_by(0.0, &[]).unwrap();

        assert_eq!(
            registry.collect().families[0].series[0].value,
            SeriesValue::Counter { total: 3.5 }
        );
    }

    #[test]
    fn negative_increment_rejected_and_total_unchanged() {
        let registry = Registry::new("test");
        let counter = registry.counter("reqs", "requests", &[]).unwrap();
        counter.inc_by(5.0, &[]).unwrap();
        assert!(counter.inc_by(-1.0, &[]).is_err());
        assert_eq!(
            registry.collect().families[0].series[0].value,
            SeriesValue::Counter { total: 5.0 }
        );
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let registry = Registry::new("test");
        let histogram = registry
            .histogram("lat", "latency", &[100.0, 200.0, 400.0], &[])
            .unwrap();
        for value in [50.0, 150.0, 150.0, 500.0] {
            histogram.observe(value, &[]).unwrap();
        }

        let snapshot = registry.collect();
        let SeriesValue::Histogram { count, sum, buckets } = &snapshot.families[0].series[0].value
        else {
            panic!("expected histogram");
        };
        assert_eq!(*count, 4);
        assert_eq!(*sum, 850.0);
        assert_eq!(buckets[0].count, 1); // <= 100
        assert_eq!(buckets[1].count, 3); // <= 200
        assert_eq!(buckets[2].count, 3); // <= 400
        // Cumulative counts never decrease across boundaries.
        assert!(buckets.windows(2).all(|pair| pair[0].count <= pair[1].count));
    }

    #[test]
    fn boundary_value_lands_in_its_bucket() {
        let registry = Registry::new("test");
        let histogram = registry.histogram("lat", "latency", &[100.0, 200.0], &[]).unwrap();
        histogram.observe(100.0, &[]).unwrap();

        let snapshot = registry.collect();
        let SeriesValue::Histogram { buckets, .. } = &snapshot.families[0].series[0].value else {
            panic!("expected histogram");
        };
        assert_eq!(buckets[0].count, 1);
    }

    #[test]
    fn gauge_last_write_wins() {
        let registry = Registry::new("test");
        let gauge = registry.gauge("depth", "queue depth", &[]).unwrap();
        gauge.set(3.0, &[]).unwrap();
        gauge.set(7.0, &[]).unwrap();

        let SeriesValue::Gauge { value, stamp_ms } = registry.collect().families[0].series[0].value
        else {
            panic!("expected gauge");
        };
        assert_eq!(value, 7.0);
        assert!(stamp_ms > 0);
    }

    #[test]
    fn default_tags_can_be_overwritten_later() {
        let registry = Registry::new("test");
        let counter = registry.counter("reqs", "requests", &["tier"]).unwrap();
        counter.set_default_tags(&[("tier", "fast")]).unwrap();
        counter.inc().unwrap();
        counter.set_default_tags(&[("tier", "slow")]).unwrap();
        counter.inc().unwrap();

        let family = &registry.collect().families[0];
        assert_eq!(family.series.len(), 2);
    }
}

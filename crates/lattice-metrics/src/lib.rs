//! lattice-metrics — metrics core for the Lattice serving platform.
//!
//! Collects counters, histograms, and gauges from concurrently-running
//! platform components, labels them with request-scoped context, and
//! aggregates them per process for exposition by the exporter.
//!
//! # Architecture
//!
//! ```text
//! Registry (one per process)
//!   ├── counter()/gauge()/histogram() → typed handles
//!   ├── merge-on-write: defaults ∪ runtime tags ∪ ObservationContext
//!   └── collect() → RegistrySnapshot (by value, for the exporter)
//!
//! context
//!   └── scope(ctx, fut) → task-local request context across .await
//!
//! prometheus
//!   └── render() → text exposition for the /metrics endpoint
//! ```

pub mod catalog;
pub mod context;
pub mod error;
pub mod handle;
pub mod prometheus;
pub mod registry;
pub mod snapshot;

pub use context::ObservationContext;
pub use error::{MetricsError, MetricsResult};
pub use handle::{Counter, Gauge, Histogram};
pub use registry::{Registry, SYSTEM_TAG_KEYS};
pub use snapshot::{
    BucketCount, LabelSet, MetricFamily, MetricKind, RegistrySnapshot, SeriesPoint, SeriesValue,
};

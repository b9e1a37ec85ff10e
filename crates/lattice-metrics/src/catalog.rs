//! Standard metric catalog for the Lattice platform.
//!
//! Well-known metric names and label schemas used by the router, HTTP
//! ingress, deployment replicas, and call handles. The names are part of
//! the platform's monitoring contract; dashboards and alerts key on them,
//! so they are reproduced here verbatim rather than assembled at runtime.
//!
//! Each bundle registers its metrics against the process's [`Registry`]
//! and pre-sets the default tags that are static for the owning component
//! (deployment name, replica identity). Request-scoped labels (route,
//! error code) arrive via runtime tags or the observation context.

use crate::error::MetricsResult;
use crate::handle::{Counter, Gauge, Histogram};
use crate::registry::Registry;

/// Default latency histogram boundaries, in milliseconds.
pub const DEFAULT_LATENCY_BUCKETS_MS: [f64; 12] = [
    1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0, 200.0, 500.0, 1000.0, 2000.0, 5000.0,
];

/// Metrics recorded by the request router.
pub struct RouterMetrics {
    pub num_router_requests: Counter,
}

impl RouterMetrics {
    pub fn register(registry: &Registry) -> MetricsResult<Self> {
        Ok(Self {
            num_router_requests: registry.counter(
                "lattice_num_router_requests",
                "The number of requests processed by the router.",
                &["deployment"],
            )?,
        })
    }
}

/// Metrics recorded by the HTTP ingress.
pub struct HttpMetrics {
    pub num_http_requests: Counter,
    pub num_http_error_requests: Counter,
    pub num_deployment_http_error_requests: Counter,
    pub http_request_latency_ms: Histogram,
}

impl HttpMetrics {
    pub fn register(registry: &Registry) -> MetricsResult<Self> {
        Ok(Self {
            num_http_requests: registry.counter(
                "lattice_num_http_requests",
                "The number of HTTP requests processed.",
                &["route", "method"],
            )?,
            num_http_error_requests: registry.counter(
                "lattice_num_http_error_requests",
                "The number of non-200 HTTP responses.",
                &["route", "method", "error_code"],
            )?,
            num_deployment_http_error_requests: registry.counter(
                "lattice_num_deployment_http_error_requests",
                "The number of non-200 HTTP responses returned by each deployment.",
                &["deployment", "route", "method", "error_code"],
            )?,
            http_request_latency_ms: registry.histogram(
                "lattice_http_request_latency_ms",
                "The end-to-end latency of HTTP requests.",
                &DEFAULT_LATENCY_BUCKETS_MS,
                &["route"],
            )?,
        })
    }
}

/// Per-deployment metrics recorded inside a replica.
pub struct DeploymentMetrics {
    pub queued_queries: Gauge,
    pub request_counter: Counter,
    pub error_counter: Counter,
    pub replica_starts: Counter,
    pub processing_latency_ms: Histogram,
}

impl DeploymentMetrics {
    pub fn register(registry: &Registry, deployment: &str) -> MetricsResult<Self> {
        let queued_queries = registry.gauge(
            "lattice_deployment_queued_queries",
            "The current number of queries queued in deployment replicas.",
            &["deployment"],
        )?;
        queued_queries.set_default_tags(&[("deployment", deployment)])?;

        let request_counter = registry.counter(
            "lattice_deployment_request_counter",
            "The number of queries processed by this replica.",
            &["deployment", "route"],
        )?;
        request_counter.set_default_tags(&[("deployment", deployment)])?;

        let error_counter = registry.counter(
            "lattice_deployment_error_counter",
            "The number of exceptions raised in this replica.",
            &["deployment", "route"],
        )?;
        error_counter.set_default_tags(&[("deployment", deployment)])?;

        let replica_starts = registry.counter(
            "lattice_deployment_replica_starts",
            "The number of times this replica has been restarted due to failure.",
            &["deployment"],
        )?;
        replica_starts.set_default_tags(&[("deployment", deployment)])?;

        let processing_latency_ms = registry.histogram(
            "lattice_deployment_processing_latency_ms",
            "The latency of queries processed in deployment replicas.",
            &DEFAULT_LATENCY_BUCKETS_MS,
            &["deployment", "route"],
        )?;
        processing_latency_ms.set_default_tags(&[("deployment", deployment)])?;

        Ok(Self {
            queued_queries,
            request_counter,
            error_counter,
            replica_starts,
            processing_latency_ms,
        })
    }
}

/// Per-replica liveness metrics.
pub struct ReplicaMetrics {
    pub processing_queries: Gauge,
    pub healthy: Gauge,
}

impl ReplicaMetrics {
    pub fn register(registry: &Registry, deployment: &str, replica: &str) -> MetricsResult<Self> {
        let processing_queries = registry.gauge(
            "lattice_replica_processing_queries",
            "The current number of queries being processed by this replica.",
            &["deployment", "replica"],
        )?;
        processing_queries.set_default_tags(&[("deployment", deployment), ("replica", replica)])?;

        let healthy = registry.gauge(
            "lattice_replica_healthy",
            "Whether this replica is healthy (1) or not (0).",
            &["deployment", "replica"],
        )?;
        healthy.set_default_tags(&[("deployment", deployment), ("replica", replica)])?;

        Ok(Self {
            processing_queries,
            healthy,
        })
    }
}

/// Metrics recorded by deployment call handles.
///
/// A process may hold handles to several deployments, so the deployment
/// is a runtime tag rather than a registration-time default.
pub struct HandleMetrics {
    pub request_counter: Counter,
}

impl HandleMetrics {
    pub fn register(registry: &Registry) -> MetricsResult<Self> {
        Ok(Self {
            request_counter: registry.counter(
                "lattice_handle_request_counter",
                "The number of requests issued through deployment handles.",
                &["deployment", "route"],
            )?,
        })
    }
}

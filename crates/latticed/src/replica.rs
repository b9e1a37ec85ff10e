//! Simulated deployment replica.
//!
//! Each replica is its own logical process: it owns a registry, records
//! the deployment and replica metric catalogs, and processes requests
//! under the caller's observation context extended with its identity,
//! the same shape a real worker process would have on the other side of
//! a remote call.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use lattice_metrics::catalog::{DeploymentMetrics, ReplicaMetrics};
use lattice_metrics::{context, MetricsResult, ObservationContext, Registry};

pub struct ReplicaWorker {
    deployment: String,
    replica: String,
    registry: Registry,
    deployment_metrics: DeploymentMetrics,
    replica_metrics: ReplicaMetrics,
}

impl ReplicaWorker {
    /// Bring up one replica of `deployment` and mark it healthy.
    pub fn start(deployment: &str, index: u32) -> MetricsResult<Self> {
        let replica = format!("{deployment}#{index}");
        let registry = Registry::new(replica.clone());
        let deployment_metrics = DeploymentMetrics::register(&registry, deployment)?;
        let replica_metrics = ReplicaMetrics::register(&registry, deployment, &replica)?;

        deployment_metrics.replica_starts.inc()?;
        deployment_metrics.queued_queries.set(0.0, &[])?;
        replica_metrics.healthy.set(1.0, &[])?;
        debug!(deployment, replica, "replica started");

        Ok(Self {
            deployment: deployment.to_string(),
            replica,
            registry,
            deployment_metrics,
            replica_metrics,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Process one request under the caller's context, extended with
    /// this replica's identity for the duration of the call.
    pub async fn handle(&self, inherited: ObservationContext) -> String {
        let ctx = inherited
            .with_deployment(self.deployment.clone())
            .with_replica(self.replica.clone());
        context::scope(ctx, self.process()).await
    }

    async fn process(&self) -> String {
        let start = Instant::now();
        if let Err(err) = self.replica_metrics.processing_queries.set(1.0, &[]) {
            warn!(error = %err, replica = %self.replica, "metrics recording failed");
        }

        // Simulated work.
        tokio::time::sleep(Duration::from_millis(1)).await;

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        if let Err(err) = self.record_processed(latency_ms) {
            warn!(error = %err, replica = %self.replica, "metrics recording failed");
        }
        format!("hello from {}", self.replica)
    }

    fn record_processed(&self, latency_ms: f64) -> MetricsResult<()> {
        self.deployment_metrics.request_counter.inc()?;
        self.deployment_metrics.processing_latency_ms.observe(latency_ms, &[])?;
        self.replica_metrics.processing_queries.set(0.0, &[])?;
        Ok(())
    }
}

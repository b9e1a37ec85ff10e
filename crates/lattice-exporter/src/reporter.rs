//! Per-process reporter loop.
//!
//! Each participating process runs one `Reporter` that snapshots its
//! local registry on a fixed interval and pushes the copy to the bridge.
//! The exported state is therefore never staler than one interval.

use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use lattice_metrics::Registry;

use crate::bridge::ExporterBridge;

/// Default report interval.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Periodically reports one registry's snapshot to the exporter bridge.
pub struct Reporter {
    registry: Registry,
    bridge: ExporterBridge,
    interval: Duration,
}

impl Reporter {
    pub fn new(registry: Registry, bridge: ExporterBridge, interval: Duration) -> Self {
        Self {
            registry,
            bridge,
            interval,
        }
    }

    /// Snapshot the registry and push it to the bridge immediately.
    pub fn report_once(&self) {
        self.bridge.report(self.registry.collect());
    }

    /// Run the report loop until the shutdown signal fires, pushing one
    /// final snapshot on the way out.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            source = self.registry.source(),
            interval_ms = self.interval.as_millis() as u64,
            "metrics reporter started"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.report_once();
                }
                _ = shutdown.changed() => {
                    info!(source = self.registry.source(), "metrics reporter shutting down");
                    self.report_once();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lattice_metrics::SeriesValue;

    #[test]
    fn report_once_pushes_current_state() {
        let registry = Registry::new("replica-0");
        let counter = registry.counter("reqs", "requests", &[]).unwrap();
        counter.inc().unwrap();

        let bridge = ExporterBridge::new();
        let reporter = Reporter::new(registry, bridge.clone(), DEFAULT_REPORT_INTERVAL);
        reporter.report_once();

        assert_eq!(bridge.sources(), vec!["replica-0"]);
        assert_eq!(bridge.merged()[0].series[0].value, SeriesValue::Counter { total: 1.0 });
    }

    #[tokio::test]
    async fn run_reports_final_snapshot_on_shutdown() {
        let registry = Registry::new("replica-0");
        let counter = registry.counter("reqs", "requests", &[]).unwrap();

        let bridge = ExporterBridge::new();
        let reporter = Reporter::new(registry.clone(), bridge.clone(), Duration::from_secs(3600));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move { reporter.run(shutdown_rx).await });

        counter.inc().unwrap();
        shutdown_tx.send(true).unwrap();
        task.await.unwrap();

        // The pre-shutdown increment made it out without waiting a full interval.
        assert_eq!(bridge.merged()[0].series[0].value, SeriesValue::Counter { total: 1.0 });
    }

    #[tokio::test]
    async fn run_reports_on_interval() {
        let registry = Registry::new("replica-0");
        let counter = registry.counter("reqs", "requests", &[]).unwrap();
        counter.inc().unwrap();

        let bridge = ExporterBridge::new();
        let reporter = Reporter::new(registry, bridge.clone(), Duration::from_millis(10));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { reporter.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(bridge.sources(), vec!["replica-0"]);

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }
}

//! Demo platform assembly.
//!
//! Wires the ingress router, per-deployment replica workers, and the
//! exporter bridge into one runnable unit. Each replica keeps its own
//! registry and reporter; the ingress process has its own for the HTTP,
//! router, and handle catalogs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{middleware, Router};
use tracing::warn;

use lattice_exporter::{ExporterBridge, Reporter};
use lattice_ingress::{track, IngressMetrics};
use lattice_metrics::catalog::{HandleMetrics, RouterMetrics};
use lattice_metrics::{context, MetricsResult, Registry};

use crate::config::LatticeConfig;
use crate::replica::ReplicaWorker;

/// The assembled demo platform.
pub struct Demo {
    pub app: Router,
    pub bridge: ExporterBridge,
    pub reporters: Vec<Reporter>,
}

/// Round-robin dispatch from the ingress to one deployment's replicas.
struct Dispatcher {
    deployment: String,
    workers: Vec<Arc<ReplicaWorker>>,
    next: AtomicUsize,
    router_metrics: Arc<RouterMetrics>,
    handle_metrics: Arc<HandleMetrics>,
}

impl Dispatcher {
    async fn dispatch(&self) -> String {
        if let Err(err) = self.record_dispatch() {
            warn!(error = %err, deployment = %self.deployment, "metrics recording failed");
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        // Capture the caller's context and hand it across the call
        // boundary, as a remote invocation would.
        self.workers[index].handle(context::current()).await
    }

    fn record_dispatch(&self) -> MetricsResult<()> {
        let tags = [("deployment", self.deployment.as_str())];
        self.router_metrics.num_router_requests.inc_by(1.0, &tags)?;
        self.handle_metrics.request_counter.inc_by(1.0, &tags)?;
        Ok(())
    }
}

/// Build the ingress app, replica workers, and reporters from config.
pub fn build(config: &LatticeConfig) -> anyhow::Result<Demo> {
    let bridge = ExporterBridge::new();
    let interval = Duration::from_millis(config.exporter.report_interval_ms);

    let proxy_registry = Registry::new("ingress");
    let ingress_metrics = Arc::new(IngressMetrics::register(&proxy_registry)?);
    let router_metrics = Arc::new(RouterMetrics::register(&proxy_registry)?);
    let handle_metrics = Arc::new(HandleMetrics::register(&proxy_registry)?);

    let mut reporters = vec![Reporter::new(proxy_registry.clone(), bridge.clone(), interval)];
    let mut app = Router::new();

    for deployment in &config.deployments {
        let mut workers = Vec::new();
        for index in 0..deployment.replicas {
            let worker = ReplicaWorker::start(&deployment.name, index)?;
            reporters.push(Reporter::new(worker.registry().clone(), bridge.clone(), interval));
            workers.push(Arc::new(worker));
        }
        ingress_metrics.set_route(&deployment.route, &deployment.name);

        let dispatcher = Arc::new(Dispatcher {
            deployment: deployment.name.clone(),
            workers,
            next: AtomicUsize::new(0),
            router_metrics: router_metrics.clone(),
            handle_metrics: handle_metrics.clone(),
        });
        app = app.route(
            &deployment.route,
            get(move || {
                let dispatcher = dispatcher.clone();
                async move { dispatcher.dispatch().await }
            }),
        );
    }

    let app = app.layer(middleware::from_fn_with_state(ingress_metrics, track));
    Ok(Demo {
        app,
        bridge,
        reporters,
    })
}

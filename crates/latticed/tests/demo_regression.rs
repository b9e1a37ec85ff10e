//! Demo platform regression tests.
//!
//! Assembles ingress + replica + exporter from the library crates the
//! same way the daemon does and validates the full catalog comes out of
//! the exposition endpoint with the right labels.

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use axum::{middleware, Router};
use tower::ServiceExt;

use lattice_exporter::{ExporterBridge, Reporter, DEFAULT_REPORT_INTERVAL};
use lattice_ingress::{track, IngressMetrics};
use lattice_metrics::catalog::{
    DeploymentMetrics, HandleMetrics, ReplicaMetrics, RouterMetrics,
};
use lattice_metrics::{context, Registry};

struct DemoPlatform {
    app: Router,
    proxy_registry: Registry,
    replica_registry: Registry,
}

/// One-deployment platform: ingress in one "process", a replica in another.
fn demo_platform() -> DemoPlatform {
    let proxy_registry = Registry::new("ingress");
    let ingress_metrics = Arc::new(IngressMetrics::register(&proxy_registry).unwrap());
    ingress_metrics.set_route("/app1", "app1");
    let router_metrics = Arc::new(RouterMetrics::register(&proxy_registry).unwrap());
    let handle_metrics = Arc::new(HandleMetrics::register(&proxy_registry).unwrap());

    let replica_registry = Registry::new("app1#r0");
    let deployment_metrics = Arc::new(DeploymentMetrics::register(&replica_registry, "app1").unwrap());
    let replica_metrics = Arc::new(ReplicaMetrics::register(&replica_registry, "app1", "app1#r0").unwrap());
    deployment_metrics.replica_starts.inc().unwrap();
    deployment_metrics.queued_queries.set(0.0, &[]).unwrap();
    replica_metrics.healthy.set(1.0, &[]).unwrap();

    let app = Router::new()
        .route(
            "/app1",
            get(move || {
                let router_metrics = router_metrics.clone();
                let handle_metrics = handle_metrics.clone();
                let deployment_metrics = deployment_metrics.clone();
                let replica_metrics = replica_metrics.clone();
                async move {
                    let tags = [("deployment", "app1")];
                    router_metrics.num_router_requests.inc_by(1.0, &tags).unwrap();
                    handle_metrics.request_counter.inc_by(1.0, &tags).unwrap();

                    // The replica inherits the request context and adds
                    // its own identity for the duration of the call.
                    let ctx = context::current()
                        .with_deployment("app1")
                        .with_replica("app1#r0");
                    context::scope(ctx, async move {
                        replica_metrics.processing_queries.set(1.0, &[]).unwrap();
                        deployment_metrics.request_counter.inc().unwrap();
                        deployment_metrics.processing_latency_ms.observe(5.0, &[]).unwrap();
                        replica_metrics.processing_queries.set(0.0, &[]).unwrap();
                        "hello"
                    })
                    .await
                }
            }),
        )
        .layer(middleware::from_fn_with_state(ingress_metrics, track));

    DemoPlatform {
        app,
        proxy_registry,
        replica_registry,
    }
}

async fn scrape(bridge: ExporterBridge) -> String {
    let resp = lattice_exporter::router(bridge)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn standard_metrics_appear_after_traffic() {
    let platform = demo_platform();

    for _ in 0..10 {
        let resp = platform
            .app
            .clone()
            .oneshot(Request::builder().uri("/app1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let bridge = ExporterBridge::new();
    Reporter::new(platform.proxy_registry.clone(), bridge.clone(), DEFAULT_REPORT_INTERVAL)
        .report_once();
    Reporter::new(platform.replica_registry.clone(), bridge.clone(), DEFAULT_REPORT_INTERVAL)
        .report_once();

    let text = scrape(bridge).await;
    let expected_metrics = [
        // counters
        "lattice_num_router_requests",
        "lattice_num_http_requests",
        "lattice_deployment_request_counter",
        "lattice_deployment_replica_starts",
        // histograms
        "lattice_deployment_processing_latency_ms_bucket",
        "lattice_deployment_processing_latency_ms_count",
        "lattice_deployment_processing_latency_ms_sum",
        "lattice_http_request_latency_ms_bucket",
        // gauges
        "lattice_deployment_queued_queries",
        "lattice_replica_processing_queries",
        "lattice_replica_healthy",
        // handle
        "lattice_handle_request_counter",
    ];
    for metric in expected_metrics {
        assert!(text.contains(metric), "missing {metric} in:\n{text}");
    }
}

#[tokio::test]
async fn request_context_labels_flow_to_the_replica() {
    let platform = demo_platform();

    for _ in 0..3 {
        platform
            .app
            .clone()
            .oneshot(Request::builder().uri("/app1").body(Body::empty()).unwrap())
            .await
            .unwrap();
    }

    let bridge = ExporterBridge::new();
    bridge.report(platform.replica_registry.collect());
    bridge.report(platform.proxy_registry.collect());
    let text = scrape(bridge).await;

    // Replica-side counters carry the route the request entered under.
    assert!(text.contains(
        "lattice_deployment_request_counter{deployment=\"app1\",replica=\"app1#r0\",route=\"/app1\"} 3"
    ));
    // Router-side counters pick the route up from the ingress scope.
    assert!(text.contains(
        "lattice_num_router_requests{deployment=\"app1\",route=\"/app1\"} 3"
    ));
    assert!(text.contains(
        "lattice_handle_request_counter{deployment=\"app1\",route=\"/app1\"} 3"
    ));
    // Proxy-side HTTP counters label by route and method.
    assert!(text.contains("lattice_num_http_requests{method=\"GET\",route=\"/app1\"} 3"));
}

#[tokio::test]
async fn errors_surface_in_http_error_counters() {
    let platform = demo_platform();

    // Unrouted request produces a 404 tracked under its raw path.
    platform
        .app
        .clone()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let bridge = ExporterBridge::new();
    bridge.report(platform.proxy_registry.collect());
    let text = scrape(bridge).await;

    assert!(text.contains(
        "lattice_num_http_error_requests{error_code=\"404\",method=\"GET\",route=\"/nope\"} 1"
    ));
    // No deployment owns that path, so no deployment-level error series.
    assert!(!text.contains("lattice_num_deployment_http_error_requests{"));
}

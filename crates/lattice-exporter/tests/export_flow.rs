//! End-to-end export flow: replicas record under request context, report
//! their registries, and the merged state comes out of the scrape endpoint.

use axum::body::Body;
use axum::http::Request;
use tower::ServiceExt;

use lattice_exporter::{ExporterBridge, Reporter, DEFAULT_REPORT_INTERVAL};
use lattice_metrics::catalog::DeploymentMetrics;
use lattice_metrics::{context, ObservationContext, Registry, SeriesValue};

/// Simulate one replica process handling `requests` requests for `route`.
async fn run_replica(deployment: &str, replica: &str, route: &str, requests: usize) -> Registry {
    let registry = Registry::new(replica);
    let metrics = DeploymentMetrics::register(&registry, deployment).unwrap();

    for _ in 0..requests {
        let ctx = ObservationContext::new()
            .with_deployment(deployment)
            .with_replica(replica)
            .with_route(route);
        context::scope(ctx, async {
            metrics.request_counter.inc().unwrap();
            metrics.processing_latency_ms.observe(150.0, &[]).unwrap();
        })
        .await;
    }
    registry
}

#[tokio::test]
async fn replicas_of_one_deployment_merge_into_one_series() {
    let bridge = ExporterBridge::new();

    // Two replica processes of the same deployment, same route.
    let first = run_replica("app1", "app1#r0", "/app1", 5).await;
    let second = run_replica("app1", "app1#r1", "/app1", 7).await;

    Reporter::new(first, bridge.clone(), DEFAULT_REPORT_INTERVAL).report_once();
    Reporter::new(second, bridge.clone(), DEFAULT_REPORT_INTERVAL).report_once();

    let merged = bridge.merged();
    let family = merged
        .iter()
        .find(|f| f.name == "lattice_deployment_request_counter")
        .unwrap();

    // The replica label keeps the two replicas' series distinct; summing
    // across them is the scraper's job. Drop the replica dimension by
    // checking totals per label set.
    let total: f64 = family
        .series
        .iter()
        .map(|point| match point.value {
            SeriesValue::Counter { total } => total,
            _ => 0.0,
        })
        .sum();
    assert_eq!(total, 12.0);
    for point in &family.series {
        assert_eq!(point.labels["deployment"], "app1");
        assert_eq!(point.labels["route"], "/app1");
    }
}

#[tokio::test]
async fn same_label_series_across_processes_sum_in_exposition() {
    let bridge = ExporterBridge::new();

    // Two processes record the same counter with identical label sets.
    for (source, count) in [("proxy-0", 5), ("proxy-1", 7)] {
        let registry = Registry::new(source);
        let counter = registry.counter("reqs", "requests", &["route"]).unwrap();
        for _ in 0..count {
            counter.inc_by(1.0, &[("route", "/a")]).unwrap();
        }
        bridge.report(registry.collect());
    }

    let resp = lattice_exporter::router(bridge)
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    assert!(text.contains("reqs{route=\"/a\"} 12"));
}

#[tokio::test]
async fn histogram_exposition_matches_recorded_distribution() {
    let bridge = ExporterBridge::new();
    let registry = run_replica("app1", "app1#r0", "/app1", 4).await;
    bridge.report(registry.collect());

    let text = bridge.render();
    // 150ms observations fall into the 200ms bucket and above.
    assert!(text.contains(
        "lattice_deployment_processing_latency_ms_bucket{deployment=\"app1\",replica=\"app1#r0\",route=\"/app1\",le=\"100\"} 0"
    ));
    assert!(text.contains(
        "lattice_deployment_processing_latency_ms_bucket{deployment=\"app1\",replica=\"app1#r0\",route=\"/app1\",le=\"200\"} 4"
    ));
    assert!(text.contains(
        "lattice_deployment_processing_latency_ms_count{deployment=\"app1\",replica=\"app1#r0\",route=\"/app1\"} 4"
    ));
    assert!(text.contains(
        "lattice_deployment_processing_latency_ms_sum{deployment=\"app1\",replica=\"app1#r0\",route=\"/app1\"} 600"
    ));
}

#[tokio::test]
async fn concurrent_request_chains_keep_their_own_labels() {
    let registry = Registry::new("replica-0");
    let counter = registry.counter("reqs", "requests", &[]).unwrap();

    let spawn_chain = |counter: lattice_metrics::Counter, deployment: &'static str| {
        tokio::spawn(context::scope(
            ObservationContext::new().with_deployment(deployment),
            async move {
                for _ in 0..100 {
                    counter.inc().unwrap();
                    tokio::task::yield_now().await;
                }
            },
        ))
    };

    let (a, b) = tokio::join!(
        spawn_chain(counter.clone(), "app-a"),
        spawn_chain(counter.clone(), "app-b")
    );
    a.unwrap();
    b.unwrap();

    let family = &registry.collect().families[0];
    assert_eq!(family.series.len(), 2);
    for point in &family.series {
        // Each chain's 100 increments landed under its own deployment label.
        assert_eq!(point.value, SeriesValue::Counter { total: 100.0 });
    }
}

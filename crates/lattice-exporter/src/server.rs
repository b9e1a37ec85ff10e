//! Exposition endpoint.
//!
//! Serves the merged snapshot as Prometheus text on `GET /metrics`.
//! Rendering happens lazily per scrape from the latest reported
//! snapshots. Out-of-process workers push their snapshots to
//! `POST /report`; in-process workers hand them to the bridge directly.

use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::watch;
use tracing::info;

use lattice_metrics::RegistrySnapshot;

use crate::bridge::ExporterBridge;

/// Content type of the exposition format.
const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Build the exporter router.
pub fn router(bridge: ExporterBridge) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/report", post(report_handler))
        .with_state(bridge)
}

/// Bind and serve the exporter endpoint until the shutdown signal fires.
pub async fn serve(
    addr: SocketAddr,
    bridge: ExporterBridge,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "exporter endpoint listening");
    axum::serve(listener, router(bridge))
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await?;
    Ok(())
}

/// GET /metrics
async fn metrics_handler(State(bridge): State<ExporterBridge>) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], bridge.render())
}

/// GET /health
async fn health_handler() -> &'static str {
    "ok"
}

/// POST /report, snapshot push from an out-of-process worker.
async fn report_handler(
    State(bridge): State<ExporterBridge>,
    Json(snapshot): Json<RegistrySnapshot>,
) -> StatusCode {
    bridge.report(snapshot);
    StatusCode::ACCEPTED
}

//! Request tracking middleware.
//!
//! Wraps every dispatched request in an observation context scope (route
//! set from the matched path, other attributes inherited from the
//! upstream hop's context header) and records the HTTP metric catalog
//! once the response is ready. A rejected recording is logged and never
//! affects the response.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

use lattice_metrics::catalog::HttpMetrics;
use lattice_metrics::{context, MetricsResult, ObservationContext, Registry};

/// Header carrying the encoded observation context across HTTP hops.
pub const CONTEXT_HEADER: &str = "x-lattice-context";

/// Ingress-side metric state: the HTTP catalog bundle plus the route
/// table used to attribute errors to deployments.
pub struct IngressMetrics {
    http: HttpMetrics,
    /// route → deployment serving it.
    routes: RwLock<HashMap<String, String>>,
}

impl IngressMetrics {
    /// Register the HTTP metric catalog against the ingress's registry.
    pub fn register(registry: &Registry) -> MetricsResult<Self> {
        Ok(Self {
            http: HttpMetrics::register(registry)?,
            routes: RwLock::new(HashMap::new()),
        })
    }

    /// Associate a route with the deployment serving it.
    pub fn set_route(&self, route: &str, deployment: &str) {
        let mut routes = self.routes.write().expect("routes lock");
        routes.insert(route.to_string(), deployment.to_string());
    }

    /// Remove a route (deployment undeployed).
    pub fn remove_route(&self, route: &str) {
        let mut routes = self.routes.write().expect("routes lock");
        routes.remove(route);
    }

    fn deployment_for(&self, route: &str) -> Option<String> {
        let routes = self.routes.read().expect("routes lock");
        routes.get(route).cloned()
    }

    /// Record one finished request. Deployment-level error counters are
    /// only recorded when the route maps to a known deployment; an
    /// unmatched 404 has no deployment to blame.
    pub fn record(&self, route: &str, method: &str, status: StatusCode, latency_ms: f64) {
        if let Err(err) = self.try_record(route, method, status, latency_ms) {
            warn!(error = %err, route, "http metrics recording failed");
        }
    }

    fn try_record(
        &self,
        route: &str,
        method: &str,
        status: StatusCode,
        latency_ms: f64,
    ) -> MetricsResult<()> {
        self.http
            .num_http_requests
            .inc_by(1.0, &[("route", route), ("method", method)])?;
        self.http
            .http_request_latency_ms
            .observe(latency_ms, &[("route", route)])?;

        if status.is_client_error() || status.is_server_error() {
            let code = status.as_u16().to_string();
            self.http.num_http_error_requests.inc_by(
                1.0,
                &[("route", route), ("method", method), ("error_code", &code)],
            )?;
            if let Some(deployment) = self.deployment_for(route) {
                self.http.num_deployment_http_error_requests.inc_by(
                    1.0,
                    &[
                        ("deployment", &deployment),
                        ("route", route),
                        ("method", method),
                        ("error_code", &code),
                    ],
                )?;
            }
        }
        Ok(())
    }
}

/// Axum middleware: enter the request's observation context, dispatch,
/// then record the outcome.
///
/// Install with `axum::middleware::from_fn_with_state(metrics, track)`.
pub async fn track(
    State(metrics): State<Arc<IngressMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let method = req.method().as_str().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    // Inherit the upstream hop's context, then stamp the matched route.
    let inherited = req
        .headers()
        .get(CONTEXT_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| ObservationContext::decode(raw).ok())
        .unwrap_or_default();
    let ctx = inherited.with_route(route.clone());

    let start = Instant::now();
    let resp = context::scope(ctx, next.run(req)).await;
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

    metrics.record(&route, &method, resp.status(), latency_ms);
    resp
}

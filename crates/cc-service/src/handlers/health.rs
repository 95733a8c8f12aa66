//! Operational endpoints.

use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

/// Liveness probe handler.
///
/// Returns a simple "OK" to indicate the process is running. Does not
/// check any dependencies.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Prometheus metrics endpoint.
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;

use crate::AppState;

pub struct MetricsState {
    pub handle: PrometheusHandle,
}

/// Set up the Prometheus metrics recorder
pub fn setup_metrics_recorder() -> Result<MetricsState, String> {
    let builder = PrometheusBuilder::new();

    // Configure histogram buckets for latency (in seconds)
    let builder = builder
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .map_err(|e| format!("failed to set histogram buckets: {}", e))?
        .set_buckets_for_metric(
            Matcher::Full("pharmacy_search_results".to_string()),
            &[0.0, 1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0],
        )
        .map_err(|e| format!("failed to set histogram buckets: {}", e))?;

    let handle = builder
        .install_recorder()
        .map_err(|e| format!("failed to install Prometheus recorder: {}", e))?;

    Ok(MetricsState { handle })
}

#[cfg(test)]
impl MetricsState {
    /// A handle backed by a recorder that is not installed globally.
    pub fn detached() -> Self {
        MetricsState {
            handle: PrometheusBuilder::new().build_recorder().handle(),
        }
    }
}

/// Handler for the /metrics endpoint
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Prometheus text exposition", body = String)
    ),
    tag = "health"
)]
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    // Render metrics in Prometheus format
    let metrics = state.metrics.handle.render();
    (StatusCode::OK, metrics)
}

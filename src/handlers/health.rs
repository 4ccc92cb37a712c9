use axum::{extract::State, http::StatusCode, Json};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::{store::Store, AppState};

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// Pins the uptime origin to process start rather than the first health probe.
pub fn mark_started() {
    Lazy::force(&START_TIME);
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and store are reachable"),
        (status = 503, description = "Store is unreachable")
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    let uptime_seconds = START_TIME.elapsed().as_secs();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "store": "ok",
                "uptimeSeconds": uptime_seconds
            })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "degraded",
                    "store": "unavailable",
                    "uptimeSeconds": uptime_seconds
                })),
            )
        }
    }
}

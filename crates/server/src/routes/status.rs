use crate::error::{ServerError, ServerResult};
use crate::state::ServerState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;

/// Global server start time for uptime calculation
static SERVER_START_TIME: once_cell::sync::Lazy<SystemTime> =
    once_cell::sync::Lazy::new(SystemTime::now);

fn uptime_seconds() -> u64 {
    SERVER_START_TIME
        .elapsed()
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Liveness check. Never touches the store.
pub async fn status() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness check
/// Returns 200 if the aggregate store answers a ping, 503 otherwise
pub async fn readiness(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let store = state.accumulator.store_name();
    let (status, overall, store_status) = match state.accumulator.ping().await {
        Ok(()) => (StatusCode::OK, "ready", "ready".to_string()),
        Err(err) => {
            tracing::warn!(store, error = %err, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable", err.to_string())
        }
    };

    (
        status,
        Json(json!({
            "status": overall,
            "service": "centroid-server",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "uptime_seconds": uptime_seconds(),
            "dim": state.accumulator.dim(),
            "components": {
                "api": "ready",
                "store": {
                    "backend": store,
                    "status": store_status,
                },
            }
        })),
    )
}

/// Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<ServerState>>) -> ServerResult<impl IntoResponse> {
    let handle = state.metrics.as_ref().ok_or(ServerError::NotFound)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

use crate::error::ServerResult;
use crate::middleware::RequestId;
use crate::state::ServerState;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

/// Body of `POST /centroid`
#[derive(Debug, Deserialize)]
pub struct CentroidRequest {
    pub vectors: Vec<Vec<f64>>,
}

/// Fold a batch into the running aggregate and return the batch centroid.
///
/// The body is decoded by hand so that malformed JSON maps onto the
/// standard error envelope instead of axum's plain-text rejection.
pub async fn ingest_centroid(
    State(state): State<Arc<ServerState>>,
    Extension(request_id): Extension<RequestId>,
    body: Bytes,
) -> ServerResult<impl IntoResponse> {
    let request: CentroidRequest = serde_json::from_slice(&body)?;
    let rows = request.vectors.len();

    let outcome = state.accumulator.ingest(request.vectors).await?;

    tracing::debug!(
        request_id = %request_id.0,
        rows,
        attempts = outcome.attempts,
        mean = ?outcome.statistics.mean,
        stdev = ?outcome.statistics.stdev,
        "batch committed"
    );

    Ok(Json(outcome.statistics.centroid))
}

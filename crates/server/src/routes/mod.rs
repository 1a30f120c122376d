//! API route handlers
//!
//! - `status`: liveness, readiness, and Prometheus metrics
//! - `centroid`: batch ingestion

pub mod centroid;
pub mod status;

use crate::error::ServerError;

/// 404 Not Found handler
///
/// Returns a standardized error response for undefined routes.
pub async fn not_found() -> ServerError {
    ServerError::NotFound
}

/// 405 handler for known paths hit with the wrong method.
pub async fn method_not_allowed() -> ServerError {
    ServerError::MethodNotAllowed
}

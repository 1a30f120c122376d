use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use batch::BatchError;
use centroid::AccumulatorError;
use serde::{Deserialize, Serialize};

pub type ServerResult<T> = Result<T, ServerError>;

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid batch: {0}")]
    InvalidBatch(#[from] BatchError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Store contention: gave up after {attempts} attempts, retry the request")]
    StoreContention { attempts: u32 },

    #[error("Persisted aggregate is unusable: {0}")]
    CorruptState(String),

    #[error("Batch would overflow the running total of column {column}")]
    AggregateOverflow { column: usize },

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Request timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_)
            | ServerError::InvalidBatch(_)
            | ServerError::AggregateOverflow { .. } => StatusCode::BAD_REQUEST,
            ServerError::StoreUnavailable(_) | ServerError::StoreContention { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ServerError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::CorruptState(_) | ServerError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::InvalidBatch(_) => "INVALID_BATCH",
            ServerError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ServerError::StoreContention { .. } => "STORE_CONTENTION",
            ServerError::CorruptState(_) => "CORRUPT_STATE",
            ServerError::AggregateOverflow { .. } => "AGGREGATE_OVERFLOW",
            ServerError::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ServerError::Timeout => "REQUEST_TIMEOUT",
            ServerError::Config(_) => "CONFIG_ERROR",
            ServerError::NotFound => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.to_string(),
            },
        });

        let mut response = (status, body).into_response();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

impl From<AccumulatorError> for ServerError {
    fn from(err: AccumulatorError) -> Self {
        match err {
            AccumulatorError::Batch(err) => ServerError::InvalidBatch(err),
            AccumulatorError::StoreUnavailable(msg) => ServerError::StoreUnavailable(msg),
            AccumulatorError::StoreContention { attempts } => {
                ServerError::StoreContention { attempts }
            }
            AccumulatorError::CorruptState(msg) => ServerError::CorruptState(msg),
            AccumulatorError::TotalOverflow { column } => ServerError::AggregateOverflow { column },
            AccumulatorError::InvalidConfig(err) => ServerError::Config(err.to_string()),
        }
    }
}

impl From<store::StoreError> for ServerError {
    fn from(err: store::StoreError) -> Self {
        match err {
            store::StoreError::Config(msg) => ServerError::Config(msg),
            other => AccumulatorError::from(other).into(),
        }
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_bad_requests() {
        let err: ServerError = AccumulatorError::Batch(BatchError::EmptyBatch).into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_BATCH");
    }

    #[test]
    fn store_failures_are_service_unavailable() {
        let unavailable: ServerError = AccumulatorError::StoreUnavailable("down".into()).into();
        let contention: ServerError = AccumulatorError::StoreContention { attempts: 16 }.into();
        assert_eq!(unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(contention.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(contention.error_code(), "STORE_CONTENTION");
    }

    #[test]
    fn service_unavailable_sets_retry_after() {
        let response = ServerError::StoreUnavailable("down".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn json_errors_are_bad_requests() {
        let err: ServerError = serde_json::from_str::<Vec<f64>>("[1,").unwrap_err().into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn total_overflow_is_a_bad_request() {
        let err: ServerError = AccumulatorError::TotalOverflow { column: 1 }.into();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "AGGREGATE_OVERFLOW");
    }

    #[test]
    fn timeout_maps_to_408() {
        assert_eq!(ServerError::Timeout.status_code(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(ServerError::Timeout.error_code(), "REQUEST_TIMEOUT");
    }

    #[test]
    fn method_not_allowed_maps_to_405() {
        assert_eq!(
            ServerError::MethodNotAllowed.status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
    }
}

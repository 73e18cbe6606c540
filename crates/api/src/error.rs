use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::error::{CoreError, StoreError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Every reading of a push request was rejected.
    #[error("All {} readings rejected", .0.len())]
    RejectedReadings(Vec<ValidationDetail>),

    #[error("Payload too large")]
    PayloadTooLarge,

    #[error("Degenerate geometry: {0}")]
    Unprocessable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationDetail {
    pub field: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut details = None;
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::MalformedPayload(msg) => (StatusCode::BAD_REQUEST, "malformed_payload", msg),
            ApiError::RejectedReadings(rejected) => {
                let message = format!("All {} readings rejected", rejected.len());
                details = Some(rejected);
                (StatusCode::BAD_REQUEST, "malformed_payload", message)
            }
            ApiError::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "payload_too_large",
                "Request body exceeds the configured limit".into(),
            ),
            ApiError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "geometry_degenerate", msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
            ApiError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", msg)
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SourceUnavailable(msg) => ApiError::ServiceUnavailable(msg),
            CoreError::MalformedPayload(msg) => ApiError::MalformedPayload(msg),
            CoreError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            CoreError::GeometryDegenerate(msg) => ApiError::Unprocessable(msg),
            CoreError::ConcurrentAnalysisConflict(id) => {
                ApiError::Conflict(format!("Analysis already running for equipment {id}"))
            }
            CoreError::NotFound(msg) => ApiError::NotFound(msg),
            CoreError::InvalidRange(msg) => ApiError::Validation(msg),
            CoreError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        CoreError::from(err).into()
    }
}

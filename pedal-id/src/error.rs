//! Error types for pedal-id
//!
//! Every handler error becomes a JSON body of the form
//! `{"error": {"code": "...", "message": "..."}}` with a matching status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message shown to the user whenever identification fails, whatever the cause
pub const IDENTIFY_FAILED_MESSAGE: &str =
    "Could not identify pedals. Please try another image.";

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conflict (409) - e.g., identification already running
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Upstream vision provider failed (502)
    #[error("Identification failed: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(String),

    /// pedal-common error
    #[error(transparent)]
    Common(#[from] pedal_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use pedal_common::Error as CommonError;

        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "IDENTIFICATION_FAILED",
                IDENTIFY_FAILED_MESSAGE.to_string(),
            ),
            ApiError::Common(err) => match err {
                CommonError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg),
                CommonError::InvalidState(msg) => (StatusCode::BAD_REQUEST, "INVALID_STATE", msg),
                CommonError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
                CommonError::MalformedResult(_) => (
                    StatusCode::BAD_GATEWAY,
                    "IDENTIFICATION_FAILED",
                    IDENTIFY_FAILED_MESSAGE.to_string(),
                ),
                other => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "COMMON_ERROR",
                    other.to_string(),
                ),
            },
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

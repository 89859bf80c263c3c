//! API error types and JSON error response formatting.
//!
//! Every error response carries `{error, message, code}` where `code` repeats
//! the HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use mentor_core::error::MentorError;
use mentor_tasks::TaskError;

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error code (e.g. "bad_request").
    pub error: String,
    pub message: String,
    /// HTTP status code.
    pub code: u16,
}

/// API error type that maps to HTTP status codes and JSON responses.
#[derive(Debug)]
pub enum ApiError {
    /// 400 - invalid input or a session the caller does not own.
    BadRequest(String),
    /// 401 - missing or invalid credentials.
    Unauthorized(String),
    /// 404 - resource does not exist.
    NotFound(String),
    /// 409 - e.g. username already registered.
    Conflict(String),
    /// 500 - unexpected server error.
    Internal(String),
    /// 503 - task queue not accepting work.
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, message) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg),
            ApiError::Unauthorized(msg) => ("unauthorized", msg),
            ApiError::NotFound(msg) => ("not_found", msg),
            ApiError::Conflict(msg) => ("conflict", msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal API error");
                ("internal_error", msg)
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg),
        };

        let body = ErrorBody {
            error: error_code.to_string(),
            message,
            code: status.as_u16(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<MentorError> for ApiError {
    fn from(err: MentorError) -> Self {
        match err {
            MentorError::NotFound(msg) => ApiError::NotFound(msg),
            MentorError::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::NotFound(id) => ApiError::NotFound(format!("Task not found: {}", id)),
            TaskError::Queue(msg) => ApiError::ServiceUnavailable(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

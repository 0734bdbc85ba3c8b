// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Covers both the test-session core and the HTTP layer around it.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized (bad or foreign credentials)
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    /// The test has no questions. Fatal to session start, never retried.
    NoQuestions,

    /// Submission attempted without an identity. The session is kept as is.
    AuthRequired,

    /// Writing the result failed. The session and its resume snapshot are kept.
    SubmissionIo(String),

    /// Operation not allowed in the session's current phase.
    InvalidState(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NoQuestions => write!(f, "This test has no questions"),
            AppError::AuthRequired => write!(f, "Sign in to submit this test"),
            AppError::SubmissionIo(msg) => write!(f, "Failed to save result: {}", msg),
            AppError::InvalidState(msg) => write!(f, "Invalid session state: {}", msg),
            other => write!(f, "{:?}", other),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::NoQuestions => (StatusCode::UNPROCESSABLE_ENTITY, self.to_string()),
            AppError::AuthRequired => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::SubmissionIo(ref msg) => {
                tracing::warn!("Submission failed: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Resource not found".to_string()),
            other => AppError::InternalServerError(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

// src/error.rs

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request (malformed or invalid payload)
    BadRequest(String),

    // 401 Unauthorized (missing or invalid identity)
    AuthError(String),

    // 403 Forbidden (not enrolled, not the session owner)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (concurrent writes kept racing)
    Conflict(String),

    // 409 Operation not allowed in the current session/exam state
    InvalidState(String),

    // 403 Results are withheld until the exam window closes
    NotYetAvailable { scheduled_end: DateTime<Utc> },

    // 409 Window closed but the session never reached a terminal state
    StillInProgress(String),
}

impl AppError {
    /// Stable machine-readable kind, sent alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InternalServerError(_) => "internal",
            AppError::BadRequest(_) => "validation",
            AppError::AuthError(_) => "unauthenticated",
            AppError::Forbidden(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidState(_) => "invalid_state",
            AppError::NotYetAvailable { .. } => "not_yet_available",
            AppError::StillInProgress(_) => "still_in_progress",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message, scheduled_end) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                    None,
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::InvalidState(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::NotYetAvailable { scheduled_end } => (
                StatusCode::FORBIDDEN,
                "Results are hidden until the exam period is over".to_string(),
                Some(scheduled_end),
            ),
            AppError::StillInProgress(msg) => (StatusCode::CONFLICT, msg, None),
        };

        let body = match scheduled_end {
            Some(end) => json!({
                "error": error_message,
                "code": code,
                "scheduled_end": end,
            }),
            None => json!({
                "error": error_message,
                "code": code,
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Malformed or wrongly typed request bodies surface as validation errors.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_maps_to_conflict() {
        let response = AppError::InvalidState("Session already submitted".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn not_yet_available_is_forbidden() {
        let response = AppError::NotYetAvailable {
            scheduled_end: Utc::now(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::InternalServerError("connection reset".into());
        assert_eq!(err.code(), "internal");
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

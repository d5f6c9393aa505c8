// Crate-wide API error type
// Every route renders the same structured JSON error body; upstream failures
// are logged with full detail but surface a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{message}")]
    Validation { code: u32, message: String },

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream service error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Validation error with a client-facing error code (e.g. 1001 "email exists")
    pub fn validation(code: u32, message: impl Into<String>) -> Self {
        ApiError::Validation {
            code,
            message: message.into(),
        }
    }

    /// Validation error without a specific code
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::Validation {
            code: 0,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            ApiError::Validation { code, message } => (StatusCode::BAD_REQUEST, code, message),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, 0, "Unauthorized".to_string()),
            ApiError::Forbidden => (StatusCode::FORBIDDEN, 0, "Forbidden".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, 0, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, 0, msg),
            ApiError::Upstream(msg) => {
                tracing::error!("Upstream service error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    0,
                    "Upstream service error".to_string(),
                )
            },
            ApiError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    0,
                    "Internal server error".to_string(),
                )
            },
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                0,
                "Internal server error".to_string(),
            ),
        };

        let body = if code != 0 {
            Json(json!({
                "error": error_message,
                "code": code,
                "status": status.as_u16()
            }))
        } else {
            Json(json!({
                "error": error_message,
                "status": status.as_u16()
            }))
        };

        (status, body).into_response()
    }
}

impl From<diesel::result::Error> for ApiError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => ApiError::NotFound("Resource not found".to_string()),
            _ => ApiError::Database(error.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(error: validator::ValidationErrors) -> Self {
        ApiError::bad_request(error.to_string())
    }
}

impl From<crate::utils::password::PasswordError> for ApiError {
    fn from(error: crate::utils::password::PasswordError) -> Self {
        tracing::error!("Password hashing error: {}", error);
        ApiError::Internal
    }
}

/// Pool checkout failures map to a database error
impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for ApiError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        ApiError::Database(error.to_string())
    }
}

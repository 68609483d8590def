//! Error taxonomy shared by every layer of the service.
//!
//! Three kinds, each carrying a machine-checkable code and a human message:
//! `BadRequest` (400, malformed input), `Validation` (422, an entity failed
//! a field rule), and `Unexpected` (500, a storage collaborator failed).
//! Layers return the first error they encounter and never reinterpret a
//! lower layer's kind.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Application error types that map to HTTP responses
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AppError {
    #[error("bad request: {message}")]
    BadRequest { code: String, message: String },

    #[error("validation error: {message}")]
    Validation { code: String, message: String },

    #[error("unexpected error: {message}")]
    Unexpected { code: String, message: String },
}

impl AppError {
    /// Malformed input: undecodable body, non-multipart content type,
    /// unparseable boundary, missing required file part.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: "bad_request".to_string(),
            message: message.into(),
        }
    }

    /// An entity failed a field rule, or a supplied id is not a UUID.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// A storage collaborator failed in any way.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            code: "unexpected_error".to_string(),
            message: message.into(),
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            AppError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::unexpected(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc().to_string();
        let status = self.status();

        let (error_code, message) = match self {
            AppError::BadRequest { code, message }
            | AppError::Validation { code, message }
            | AppError::Unexpected { code, message } => (code, message),
        };

        tracing::error!(
            error_id = %error_id,
            error_code = %error_code,
            status_code = %status.as_u16(),
            "Request error"
        );

        // In production, we might want to hide internal error details
        let message = if cfg!(not(debug_assertions)) && status == StatusCode::INTERNAL_SERVER_ERROR
        {
            "An internal server error occurred".to_string()
        } else {
            message
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message,
                "trace_id": error_id.to_string(),
                "timestamp": timestamp
            }
        });

        (status, Json(error_response)).into_response()
    }
}

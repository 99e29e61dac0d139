//! Error types for the service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Service-wide errors
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or out-of-range input
    #[error("{0}")]
    Validation(String),

    /// Missing, expired, or invalid credentials
    #[error("{0}")]
    Authentication(String),

    /// Valid identity but insufficient rights or cross-user access
    #[error("{0}")]
    Authorization(String),

    /// User, document, session, or config setting not found
    #[error("{0}")]
    NotFound(String),

    /// Duplicate username or email on registration
    #[error("{0}")]
    Conflict(String),

    /// Uploaded file exceeds the configured size limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// Unsupported upload file type
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Text extraction from an uploaded file failed
    #[error("Failed to extract text from '{filename}': {message}")]
    Extraction { filename: String, message: String },

    /// Embedding provider failure
    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    /// Chat completion failure; `retryable` drives the engine's retry policy
    #[error("Chat completion failed: {message}")]
    ChatCompletion { message: String, retryable: bool },

    /// Vector index failure
    #[error("Vector index error: {0}")]
    VectorIndex(String),

    /// Record store failure
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create a non-retryable chat completion error
    pub fn chat(message: impl Into<String>) -> Self {
        Self::ChatCompletion {
            message: message.into(),
            retryable: false,
        }
    }

    /// Create a retryable chat completion error
    pub fn chat_transient(message: impl Into<String>) -> Self {
        Self::ChatCompletion {
            message: message.into(),
            retryable: true,
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the generation retry loop should attempt again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ChatCompletion { retryable: true, .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Internal(format!("HTTP request error: {err}"))
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "ValidationError", msg.clone()),
            Error::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, "AuthenticationError", msg.clone())
            }
            Error::Authorization(msg) => (StatusCode::FORBIDDEN, "AuthorizationError", msg.clone()),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NotFoundError", msg.clone()),
            Error::Conflict(msg) => (StatusCode::BAD_REQUEST, "ConflictError", msg.clone()),
            Error::PayloadTooLarge(msg) => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "PayloadTooLargeError",
                msg.clone(),
            ),
            Error::UnsupportedFileType(ext) => (
                StatusCode::BAD_REQUEST,
                "ValidationError",
                format!("Unsupported file type: {ext}. Only PDF, DOCX, and TXT files are supported."),
            ),
            Error::Extraction { filename, message } => (
                StatusCode::BAD_REQUEST,
                "ExtractionError",
                format!("Failed to extract text from '{filename}': {message}"),
            ),
            Error::Embedding(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UpstreamError",
                msg.clone(),
            ),
            Error::ChatCompletion { message, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UpstreamError",
                message.clone(),
            ),
            Error::VectorIndex(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "UpstreamError",
                msg.clone(),
            ),
            Error::Database(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg.clone())
            }
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", msg.clone())
            }
        };

        let request_id = Uuid::new_v4();
        if status.is_server_error() {
            tracing::error!(%request_id, error = %self, "request failed");
        } else {
            tracing::warn!(%request_id, error = %self, "request rejected");
        }

        let body = Json(json!({
            "error": error_type,
            "message": message,
            "details": { "request_id": request_id.to_string() },
            "timestamp": Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

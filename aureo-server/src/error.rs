//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use aureo_core::{PoolError, SealError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Payload too large - upload exceeds the configured limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Request timeout - operation took too long
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Service unavailable - worker queue is full or shut down
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Seal core error - error from embedding or detection
    #[error("Seal error: {0}")]
    Seal(#[from] SealError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::PayloadTooLarge(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    /// Create a service unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Seal(ref e) => match e {
                // Client-provided invalid input → 400
                SealError::UnreadableImage(_)
                | SealError::InvalidAuthor(_)
                | SealError::InvalidGeometry(_)
                | SealError::InvalidSealId(_) => StatusCode::BAD_REQUEST,

                // Valid image the seal cannot be applied to → 422
                SealError::Composition(_) | SealError::ExtractionOutOfBounds { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }

                SealError::Cancelled { .. } => StatusCode::REQUEST_TIMEOUT,

                SealError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            Self::Timeout(_) => "TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            Self::Seal(ref e) => match e {
                SealError::UnreadableImage(_) => "UNREADABLE_IMAGE",
                SealError::InvalidAuthor(_) => "INVALID_AUTHOR",
                SealError::InvalidGeometry(_) => "INVALID_GEOMETRY",
                SealError::InvalidSealId(_) => "INVALID_SEAL_ID",
                SealError::Composition(_) => "COMPOSITION_FAILED",
                SealError::ExtractionOutOfBounds { .. } => "EXTRACTION_OUT_OF_BOUNDS",
                SealError::Cancelled { .. } => "CANCELLED",
                SealError::Serialization(_) => "SERIALIZATION_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Seal(SealError::Serialization(_)) => "Seal serialization error".to_string(),
            Self::Seal(e) => e.to_string(),
            _ => self.to_string(),
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Timeout(_) => "timeout",
            Self::Internal(_) => "internal",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Seal(_) => "seal",
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::QueueFull { .. } | PoolError::Closed => {
                Self::service_unavailable(err.to_string())
            }
            PoolError::TimedOut(_) => Self::timeout(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        // All error responses include a `code` field for programmatic error handling
        let body = serde_json::json!({
            "error": client_message,
            "code": code,
        });

        (status, Json(body)).into_response()
    }
}

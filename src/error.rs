//! Domain error types for the energy bill server.
//!
//! Uses thiserror for ergonomic error handling with automatic Display implementations.
//!
//! The variants fall into three groups that the HTTP boundary maps to
//! distinct status codes: client errors (bad input, duplicates, oversized
//! payloads), not-found, and processing errors (anything that fails after a
//! bill record exists).

use actix_web::{HttpResponse, ResponseError};
use std::fmt;

/// Application-level errors.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Resource not found
    #[error("{0} not found")]
    NotFound(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Duplicate bill (fingerprint already stored)
    #[error("Duplicate bill: {0}")]
    Duplicate(String),

    /// Upload exceeds the configured size limit
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Extraction call or response validation failed
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// Filesystem operation failed
    #[error("File system error: {0}")]
    FileSystem(String),
}

impl AppError {
    /// Client errors are raised before any bill record exists and map to 4xx.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::InvalidInput(_) | AppError::Duplicate(_) | AppError::PayloadTooLarge(_)
        )
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_code, response_message) = match self {
            AppError::Database(err_str) => {
                tracing::error!("Database error: {}", err_str);
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "An internal database error occurred".to_string(),
                )
            }
            AppError::NotFound(_) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                self.to_string(),
            ),
            AppError::InvalidInput(_) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                self.to_string(),
            ),
            AppError::Duplicate(_) => (
                actix_web::http::StatusCode::CONFLICT,
                "DUPLICATE_BILL",
                self.to_string(),
            ),
            AppError::PayloadTooLarge(_) => (
                actix_web::http::StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                self.to_string(),
            ),
            AppError::Extraction(_) => (
                actix_web::http::StatusCode::UNPROCESSABLE_ENTITY,
                "EXTRACTION_FAILED",
                self.to_string(),
            ),
            AppError::FileSystem(_) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "FILE_SYSTEM_ERROR",
                self.to_string(),
            ),
        };

        HttpResponse::build(status).json(ErrorResponse {
            error: error_code.to_string(),
            message: response_message,
        })
    }
}

/// Error response body matching OpenAPI schema.
#[derive(Debug, serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

// Conversion implementations for common error types

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::InvalidInput(format!("Invalid UUID: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(AppError::InvalidInput("bad".into()).is_client_error());
        assert!(AppError::Duplicate("seen".into()).is_client_error());
        assert!(AppError::PayloadTooLarge("big".into()).is_client_error());
        assert!(!AppError::Extraction("boom".into()).is_client_error());
        assert!(!AppError::NotFound("bill".into()).is_client_error());
        assert!(!AppError::Database("down".into()).is_client_error());
    }
}

// Error handling module for the Platter API
// Provides the top-level error type for infrastructure and request-context
// failures; each domain module carries its own richer taxonomy.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error};

/// Top-level error type for requests that fail before reaching a domain
/// service (identity headers, bad query parameters, infrastructure).
#[derive(Debug)]
pub enum ApiError {
    /// Request validation failures
    /// Maps to HTTP 400 Bad Request
    ValidationError(String),

    /// Missing or malformed tenancy headers
    /// Maps to HTTP 400 Bad Request
    MissingContext(String),

    /// Resource not found by ID
    /// Maps to HTTP 404 Not Found
    NotFound { resource: String, id: String },

    /// Database operation errors
    /// Maps to HTTP 500; details are logged, never sent to the client
    DatabaseError(sqlx::Error),

    /// Internal server errors
    /// Maps to HTTP 500; details are logged, never sent to the client
    InternalError(String),
}

/// Consistent error response structure shared by every surface.
#[derive(Serialize)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "VALIDATION_ERROR")
    pub error_code: String,

    /// Human-readable error message
    pub message: String,

    /// ISO 8601 timestamp of when the error occurred
    pub timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = self.to_error_response();
        (status, Json(error_response)).into_response()
    }
}

impl ApiError {
    fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        match self {
            ApiError::ValidationError(message) => {
                debug!("Validation error: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error_code: "VALIDATION_ERROR".to_string(),
                        message: message.clone(),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::MissingContext(message) => {
                debug!("Missing request context: {}", message);
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        error_code: "MISSING_CONTEXT".to_string(),
                        message: message.clone(),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::NotFound { resource, id } => {
                debug!("Resource not found: {} with id {}", resource, id);
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse {
                        error_code: "NOT_FOUND".to_string(),
                        message: format!("{} with id {} not found", resource, id),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::DatabaseError(db_error) => {
                // Full details stay in the log; clients get a generic message.
                error!("Database error: {:?}", db_error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error_code: "DATABASE_ERROR".to_string(),
                        message: "A database error occurred".to_string(),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
            ApiError::InternalError(internal_msg) => {
                error!("Internal error: {}", internal_msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error_code: "INTERNAL_ERROR".to_string(),
                        message: "An internal server error occurred".to_string(),
                        timestamp: Utc::now().to_rfc3339(),
                    },
                )
            }
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(error: sqlx::Error) -> Self {
        ApiError::DatabaseError(error)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(errors.to_string())
    }
}

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Error types for coupon operations
#[derive(Debug, thiserror::Error)]
pub enum CouponError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Coupon not found: {0}")]
    NotFound(String),

    #[error("Coupon code already exists: {0}")]
    DuplicateCode(String),

    #[error("Coupon invalid: {0}")]
    CouponInvalid(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for CouponError {
    fn from(err: sqlx::Error) -> Self {
        CouponError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for CouponError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            CouponError::DatabaseError(msg) => {
                tracing::error!("Coupon database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            CouponError::NotFound(code) => (
                StatusCode::NOT_FOUND,
                format!("Coupon '{}' not found", code),
            ),
            CouponError::DuplicateCode(code) => (
                StatusCode::CONFLICT,
                format!("Coupon code '{}' already exists", code),
            ),
            CouponError::CouponInvalid(reason) => (StatusCode::UNPROCESSABLE_ENTITY, reason),
            CouponError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

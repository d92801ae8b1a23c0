// Order error taxonomy
//
// Every failure the order lifecycle can produce, mapped to a structured
// JSON response with a machine-readable code so callers can render a
// specific, actionable message. Price and total mismatches are always
// recoverable by a client refresh and are never silently corrected.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use crate::orders::OrderStatus;

/// Error types for order operations
#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Order not found")]
    NotFound,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Price validation failed for items: {item_ids:?}")]
    PriceValidationFailed { item_ids: Vec<Uuid> },

    #[error("Client total {client_total} does not match server total {server_total}")]
    TotalMismatch {
        client_total: Decimal,
        server_total: Decimal,
    },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order is not cancellable")]
    NotCancellable,

    #[error("Cancellation window has expired")]
    CancellationWindowExpired,

    #[error("Coupon invalid: {0}")]
    CouponInvalid(String),

    #[error("Refund failed: {0}")]
    RefundFailed(String),

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Restaurant profile not found")]
    ProfileNotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}

impl From<sqlx::Error> for OrderError {
    fn from(err: sqlx::Error) -> Self {
        OrderError::DatabaseError(err.to_string())
    }
}

impl From<crate::cache::CacheError> for OrderError {
    fn from(err: crate::cache::CacheError) -> Self {
        OrderError::CacheError(err.to_string())
    }
}

impl From<crate::catalog::CatalogError> for OrderError {
    fn from(err: crate::catalog::CatalogError) -> Self {
        match err {
            crate::catalog::CatalogError::UpstreamTimeout(msg) => OrderError::UpstreamTimeout(msg),
            other => OrderError::DatabaseError(other.to_string()),
        }
    }
}

impl From<crate::coupons::CouponError> for OrderError {
    fn from(err: crate::coupons::CouponError) -> Self {
        match err {
            crate::coupons::CouponError::NotFound(code) => {
                OrderError::CouponInvalid(format!("Coupon '{}' not found", code))
            }
            crate::coupons::CouponError::CouponInvalid(reason) => OrderError::CouponInvalid(reason),
            crate::coupons::CouponError::ValidationError(msg) => OrderError::ValidationError(msg),
            other => OrderError::DatabaseError(other.to_string()),
        }
    }
}

impl From<crate::cart::CartError> for OrderError {
    fn from(err: crate::cart::CartError) -> Self {
        match err {
            crate::cart::CartError::CacheError(msg) => OrderError::CacheError(msg),
            other => OrderError::ValidationError(other.to_string()),
        }
    }
}

impl OrderError {
    /// Machine-readable code included in every error response.
    pub fn error_code(&self) -> &'static str {
        match self {
            OrderError::ValidationError(_) => "VALIDATION_ERROR",
            OrderError::NotFound => "NOT_FOUND",
            OrderError::EmptyCart => "EMPTY_CART",
            OrderError::PriceValidationFailed { .. } => "PRICE_VALIDATION_FAILED",
            OrderError::TotalMismatch { .. } => "TOTAL_MISMATCH",
            OrderError::InvalidSchedule(_) => "INVALID_SCHEDULE",
            OrderError::InvalidTransition { .. } => "INVALID_TRANSITION",
            OrderError::NotCancellable => "NOT_CANCELLABLE",
            OrderError::CancellationWindowExpired => "CANCELLATION_WINDOW_EXPIRED",
            OrderError::CouponInvalid(_) => "COUPON_INVALID",
            OrderError::RefundFailed(_) => "REFUND_FAILED",
            OrderError::UpstreamTimeout(_) => "UPSTREAM_TIMEOUT",
            OrderError::ProfileNotFound => "PROFILE_NOT_FOUND",
            OrderError::DatabaseError(_) => "DATABASE_ERROR",
            OrderError::CacheError(_) => "CACHE_ERROR",
        }
    }
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let (status, message, details) = match &self {
            OrderError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            OrderError::NotFound => (StatusCode::NOT_FOUND, "Order not found".to_string(), None),
            OrderError::EmptyCart => (
                StatusCode::BAD_REQUEST,
                "Cannot create an order from an empty cart".to_string(),
                None,
            ),
            OrderError::PriceValidationFailed { item_ids } => (
                StatusCode::CONFLICT,
                "Menu prices have changed, please refresh and try again".to_string(),
                Some(json!({ "item_ids": item_ids })),
            ),
            OrderError::TotalMismatch {
                client_total,
                server_total,
            } => (
                StatusCode::CONFLICT,
                "Cart total has changed, please refresh and resubmit".to_string(),
                Some(json!({
                    "client_total": client_total,
                    "server_total": server_total,
                })),
            ),
            OrderError::InvalidSchedule(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            OrderError::InvalidTransition { from, to } => (
                StatusCode::BAD_REQUEST,
                format!("Invalid status transition from {} to {}", from, to),
                Some(json!({ "from": from, "to": to })),
            ),
            OrderError::NotCancellable => (
                StatusCode::CONFLICT,
                "Order can no longer be cancelled".to_string(),
                None,
            ),
            OrderError::CancellationWindowExpired => (
                StatusCode::CONFLICT,
                "The cancellation window for this order has expired".to_string(),
                None,
            ),
            OrderError::CouponInvalid(reason) => {
                (StatusCode::UNPROCESSABLE_ENTITY, reason.clone(), None)
            }
            OrderError::RefundFailed(_) => {
                tracing::error!("{}", self);
                (
                    StatusCode::BAD_GATEWAY,
                    "Refund could not be issued; the order was not cancelled. Please contact support."
                        .to_string(),
                    None,
                )
            }
            OrderError::UpstreamTimeout(msg) => {
                tracing::error!("Order upstream timeout: {}", msg);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    "An upstream service timed out".to_string(),
                    None,
                )
            }
            OrderError::ProfileNotFound => (
                StatusCode::NOT_FOUND,
                "Restaurant profile not found".to_string(),
                None,
            ),
            OrderError::DatabaseError(msg) => {
                tracing::error!("Order database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                    None,
                )
            }
            OrderError::CacheError(msg) => {
                tracing::error!("Order cache error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A cache error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(json!({
            "error_code": self.error_code(),
            "error": message,
            "details": details,
            "timestamp": Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

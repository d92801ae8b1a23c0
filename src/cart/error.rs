use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::catalog::CatalogError;

/// Error types for cart operations
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Menu item not found: {0}")]
    MenuItemNotFound(Uuid),

    #[error("Menu item unavailable: {0}")]
    ItemUnavailable(Uuid),

    #[error("Price mismatch for item {item_id}: {detail}")]
    PriceMismatch { item_id: Uuid, detail: String },

    #[error("Cart line not found: {0}")]
    LineNotFound(Uuid),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Restaurant profile not found")]
    ProfileNotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Upstream error: {0}")]
    UpstreamError(String),
}

impl From<crate::cache::CacheError> for CartError {
    fn from(err: crate::cache::CacheError) -> Self {
        CartError::CacheError(err.to_string())
    }
}

impl From<CatalogError> for CartError {
    fn from(err: CatalogError) -> Self {
        CartError::UpstreamError(err.to_string())
    }
}

impl IntoResponse for CartError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            CartError::MenuItemNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Menu item with id {} not found", id),
            ),
            CartError::ItemUnavailable(id) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Menu item {} is currently unavailable", id),
            ),
            CartError::PriceMismatch { .. } => (
                StatusCode::CONFLICT,
                // Never auto-adjust: the client must refresh the menu and resubmit.
                "Menu prices have changed, please refresh and try again".to_string(),
            ),
            CartError::LineNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Cart line with id {} not found", id),
            ),
            CartError::InvalidQuantity(msg) => (StatusCode::BAD_REQUEST, msg),
            CartError::ProfileNotFound => (
                StatusCode::NOT_FOUND,
                "Restaurant profile not found".to_string(),
            ),
            CartError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            CartError::CacheError(msg) => {
                tracing::error!("Cart cache error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A cache error occurred".to_string(),
                )
            }
            CartError::UpstreamError(msg) => {
                tracing::error!("Cart upstream error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "An upstream service failed".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

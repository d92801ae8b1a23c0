use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

/// Error types for catalog operations
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Menu item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Restaurant profile not found")]
    ProfileNotFound,

    #[error("Upstream timeout: {0}")]
    UpstreamTimeout(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

impl From<sqlx::Error> for CatalogError {
    fn from(err: sqlx::Error) -> Self {
        CatalogError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for CatalogError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            CatalogError::DatabaseError(msg) => {
                tracing::error!("Catalog database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "A database error occurred".to_string(),
                )
            }
            CatalogError::ItemNotFound(id) => (
                StatusCode::NOT_FOUND,
                format!("Menu item with id {} not found", id),
            ),
            CatalogError::ProfileNotFound => (
                StatusCode::NOT_FOUND,
                "Restaurant profile not found".to_string(),
            ),
            CatalogError::UpstreamTimeout(msg) => {
                tracing::error!("Catalog upstream timeout: {}", msg);
                (StatusCode::GATEWAY_TIMEOUT, "Upstream timeout".to_string())
            }
            CatalogError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

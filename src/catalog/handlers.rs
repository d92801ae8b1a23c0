// HTTP handlers for menu read models

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::cache::etag;
use crate::catalog::{CatalogError, MenuItem, UpdateMenuItemRequest};
use crate::context::TenantContext;

/// Handler for GET /api/menu
///
/// Serves the cached menu listing. A request whose If-None-Match matches
/// the current content hash short-circuits to 304 without touching the
/// body.
pub async fn get_menu_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    headers: HeaderMap,
) -> Result<Response, CatalogError> {
    let listing = state
        .catalog_service
        .menu_listing(ctx.tenant_id, ctx.restaurant_id)
        .await?;

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok());

    if etag::matches(if_none_match, &listing.etag) {
        return Ok((
            StatusCode::NOT_MODIFIED,
            [(header::ETAG, listing.etag.clone())],
        )
            .into_response());
    }

    Ok((
        StatusCode::OK,
        [(header::ETAG, listing.etag.clone())],
        Json(listing.body),
    )
        .into_response())
}

/// Handler for PATCH /api/menu/items/{item_id}
///
/// Updates the price/availability fields the ordering core re-validates
/// against; the whole restaurant cache namespace is invalidated before the
/// response is sent.
pub async fn update_menu_item_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(item_id): Path<Uuid>,
    Json(request): Json<UpdateMenuItemRequest>,
) -> Result<Json<MenuItem>, CatalogError> {
    request
        .validate()
        .map_err(|e| CatalogError::ValidationError(e.to_string()))?;

    let item = state
        .catalog_service
        .update_item(ctx.tenant_id, ctx.restaurant_id, item_id, &request)
        .await?;

    tracing::info!("Updated menu item {} for restaurant {}", item_id, ctx.restaurant_id);
    Ok(Json(item))
}

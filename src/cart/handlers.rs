// HTTP handlers for cart endpoints

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::cart::{
    AddItemRequest, CalculatedTotalResponse, CartError, CartResponse, UpdateQuantityRequest,
};
use crate::context::TenantContext;

/// Mutations carry their idempotency key in this header; a repeated request
/// with the same key within the replay window returns the prior result.
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-idempotency-key";

fn idempotency_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Query parameters for total calculation
#[derive(Debug, Deserialize)]
pub struct CalculateTotalQuery {
    pub coupon_code: Option<String>,
}

/// Handler for GET /api/cart
/// Returns the current cart with freshly computed totals
#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "Current cart contents", body = CartResponse),
        (status = 400, description = "Missing or malformed identity headers")
    ),
    tag = "cart"
)]
pub async fn get_cart_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
) -> Result<Json<CartResponse>, CartError> {
    let response = state.cart_service.get_cart(&ctx).await?;
    Ok(Json(response))
}

/// Handler for POST /api/cart/items
/// Adds an item to the cart after price re-validation against the live menu
#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 201, description = "Item added, cart returned", body = CartResponse),
        (status = 409, description = "Submitted price no longer matches the menu"),
        (status = 422, description = "Item unavailable")
    ),
    tag = "cart"
)]
pub async fn add_item_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    headers: HeaderMap,
    Json(request): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<CartResponse>), CartError> {
    request
        .validate()
        .map_err(|e| CartError::ValidationError(e.to_string()))?;

    let response = state
        .cart_service
        .add_item(&ctx, request, idempotency_key(&headers))
        .await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for PATCH /api/cart/items/{line_id}
/// Updates a line's quantity; zero removes the line
#[utoipa::path(
    patch,
    path = "/api/cart/items/{line_id}",
    params(("line_id" = Uuid, Path, description = "Cart line ID")),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Cart after the update", body = CartResponse),
        (status = 404, description = "Cart line not found")
    ),
    tag = "cart"
)]
pub async fn update_quantity_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(line_id): Path<Uuid>,
    headers: HeaderMap,
    Json(request): Json<UpdateQuantityRequest>,
) -> Result<Json<CartResponse>, CartError> {
    request
        .validate()
        .map_err(|e| CartError::ValidationError(e.to_string()))?;

    let response = state
        .cart_service
        .update_quantity(&ctx, line_id, request, idempotency_key(&headers))
        .await?;

    Ok(Json(response))
}

/// Handler for DELETE /api/cart/items/{line_id}
pub async fn remove_item_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(line_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<CartResponse>, CartError> {
    let response = state
        .cart_service
        .remove_item(&ctx, line_id, idempotency_key(&headers))
        .await?;

    Ok(Json(response))
}

/// Handler for DELETE /api/cart
pub async fn clear_cart_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
) -> Result<Json<CartResponse>, CartError> {
    let response = state.cart_service.clear(&ctx).await?;
    Ok(Json(response))
}

/// Handler for GET /api/cart/total
/// Display-only total calculation, optionally applying a coupon code
#[utoipa::path(
    get,
    path = "/api/cart/total",
    params(("coupon_code" = Option<String>, Query, description = "Coupon code to preview")),
    responses(
        (status = 200, description = "Computed totals", body = CalculatedTotalResponse)
    ),
    tag = "cart"
)]
pub async fn calculate_total_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Query(query): Query<CalculateTotalQuery>,
) -> Result<Json<CalculatedTotalResponse>, CartError> {
    let response = state
        .cart_service
        .calculate_total(&ctx, query.coupon_code.as_deref())
        .await?;

    Ok(Json(response))
}

// HTTP handlers for order endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::context::TenantContext;
use crate::orders::{
    BulkOperateRequest, BulkOperationReport, CancelOrderRequest, CancellationEligibility,
    CreateOrderRequest, DeliveryMetadata, HourlyBucket, Order, OrderError, OrderStatus, TopItem,
    UpdateStatusRequest,
};

/// Query parameters for order history
#[derive(Debug, Deserialize)]
pub struct OrderHistoryQuery {
    pub status: Option<OrderStatus>,
}

/// Handler for POST /api/orders
/// Creates an order from the user's stored cart, idempotently
pub async fn create_order_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let order = state.order_service.create_order(&ctx, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Handler for GET /api/orders
/// Order history for the requesting user, optionally filtered by status
pub async fn list_orders_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Query(query): Query<OrderHistoryQuery>,
) -> Result<Json<Vec<Order>>, OrderError> {
    let orders = state.order_service.list_orders(&ctx, query.status).await?;
    Ok(Json(orders))
}

/// Handler for GET /api/orders/{order_id}
pub async fn get_order_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<Order>, OrderError> {
    let order = state.order_service.get_order(&ctx, order_id).await?;
    Ok(Json(order))
}

/// Handler for PATCH /api/orders/{order_id}/status
/// Applies a status transition (restaurant staff surface)
pub async fn update_status_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(order_id): Path<Uuid>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let actor_id = ctx.user_id;
    let order = state
        .order_service
        .update_status(&ctx, order_id, request, actor_id)
        .await?;
    Ok(Json(order))
}

/// Handler for PATCH /api/orders/{order_id}/delivery
/// Merges delivery assignment fields, independent of status
pub async fn update_delivery_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(order_id): Path<Uuid>,
    Json(request): Json<DeliveryMetadata>,
) -> Result<Json<Order>, OrderError> {
    let order = state
        .order_service
        .update_delivery(&ctx, order_id, request)
        .await?;
    Ok(Json(order))
}

/// Handler for POST /api/orders/{order_id}/cancel
pub async fn cancel_order_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(order_id): Path<Uuid>,
    Json(request): Json<CancelOrderRequest>,
) -> Result<Json<Order>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let actor_id = ctx.user_id;
    let order = state
        .order_service
        .cancel(&ctx, order_id, request, actor_id)
        .await?;
    Ok(Json(order))
}

/// Handler for GET /api/orders/{order_id}/cancellation-eligibility
pub async fn cancellation_eligibility_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Path(order_id): Path<Uuid>,
) -> Result<Json<CancellationEligibility>, OrderError> {
    let eligibility = state
        .order_service
        .check_cancellation_eligibility(&ctx, order_id)
        .await?;
    Ok(Json(eligibility))
}

/// Handler for POST /api/orders/bulk
/// Applies one action across many orders with a partial-success tally
pub async fn bulk_operate_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Json(request): Json<BulkOperateRequest>,
) -> Result<Json<BulkOperationReport>, OrderError> {
    request
        .validate()
        .map_err(|e| OrderError::ValidationError(e.to_string()))?;

    let actor_id = ctx.user_id;
    let report = state
        .order_service
        .bulk_operate(&ctx, request, actor_id)
        .await?;
    Ok(Json(report))
}

/// Query parameters for the hourly breakdown
#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    pub date: NaiveDate,
}

/// Handler for GET /api/analytics/orders/hourly
pub async fn hourly_breakdown_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Query(query): Query<HourlyQuery>,
) -> Result<Json<Vec<HourlyBucket>>, OrderError> {
    let buckets = state
        .analytics
        .hourly_breakdown(ctx.tenant_id, ctx.restaurant_id, query.date)
        .await?;
    Ok(Json(buckets))
}

/// Query parameters for the top-items report
#[derive(Debug, Deserialize)]
pub struct TopItemsQuery {
    pub limit: Option<i64>,
}

/// Handler for GET /api/analytics/orders/top-items
pub async fn top_items_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Query(query): Query<TopItemsQuery>,
) -> Result<Json<Vec<TopItem>>, OrderError> {
    let items = state
        .analytics
        .top_items(
            ctx.tenant_id,
            ctx.restaurant_id,
            query.limit.unwrap_or(10).clamp(1, 100),
        )
        .await?;
    Ok(Json(items))
}

// HTTP handlers for coupon endpoints

use axum::{extract::State, http::StatusCode, Json};
use serde_json::json;
use validator::Validate;

use crate::context::TenantContext;
use crate::coupons::{Coupon, CouponError, CreateCouponRequest, ValidateCouponRequest};

/// Handler for POST /api/coupons
/// Creates a coupon for the restaurant (staff surface)
pub async fn create_coupon_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Json(request): Json<CreateCouponRequest>,
) -> Result<(StatusCode, Json<Coupon>), CouponError> {
    request
        .validate()
        .map_err(|e| CouponError::ValidationError(e.to_string()))?;

    let coupon = state
        .coupon_service
        .create(ctx.tenant_id, ctx.restaurant_id, request)
        .await?;

    tracing::info!("Created coupon {} for restaurant {}", coupon.code, ctx.restaurant_id);
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Handler for GET /api/coupons
pub async fn list_coupons_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
) -> Result<Json<Vec<Coupon>>, CouponError> {
    let coupons = state
        .coupon_service
        .list(ctx.tenant_id, ctx.restaurant_id)
        .await?;
    Ok(Json(coupons))
}

/// Handler for POST /api/coupons/validate
///
/// Reports whether a code would apply to an order value, and the discount
/// it would grant. Never consumes a use.
pub async fn validate_coupon_handler(
    State(state): State<crate::AppState>,
    ctx: TenantContext,
    Json(request): Json<ValidateCouponRequest>,
) -> Result<Json<serde_json::Value>, CouponError> {
    let (validation, discount) = state
        .coupon_service
        .validate(
            ctx.tenant_id,
            ctx.restaurant_id,
            ctx.user_id,
            &request.code,
            request.order_value,
        )
        .await?;

    Ok(Json(json!({
        "valid": validation.valid,
        "reason": validation.reason,
        "discount": discount,
    })))
}

// Coupon service
//
// Orchestrates validation, quoting and redemption over the persisted
// coupon entity. Discount amounts are quoted without side effects;
// consuming a use happens only through the store's atomic redeem at
// checkout time.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::cache::{self, SharedCache};
use crate::coupons::error::CouponError;
use crate::coupons::models::{Coupon, CouponQuote, CouponValidation, CreateCouponRequest};
use crate::coupons::repository::{CouponStore, OrderHistory};
use crate::coupons::validator::{CouponValidator, UsageContext};

/// Service for coupon business logic
#[derive(Clone)]
pub struct CouponService {
    store: Arc<dyn CouponStore>,
    orders: Arc<dyn OrderHistory>,
    cache: SharedCache,
}

impl CouponService {
    pub fn new(
        store: Arc<dyn CouponStore>,
        orders: Arc<dyn OrderHistory>,
        cache: SharedCache,
    ) -> Self {
        Self {
            store,
            orders,
            cache,
        }
    }

    /// Quote the discount a coupon grants on an order value.
    ///
    /// No side effects: the quote holds until a racing checkout consumes the
    /// last use, which `redeem` will catch. An absent code is `NotFound`; a
    /// failing check is `CouponInvalid` carrying the validator's reason.
    pub async fn quote(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        user_id: Uuid,
        code: &str,
        order_value: Decimal,
    ) -> Result<CouponQuote, CouponError> {
        let coupon = self
            .store
            .find_by_code(tenant_id, restaurant_id, code)
            .await?
            .ok_or_else(|| CouponError::NotFound(code.to_string()))?;

        let usage = self.usage_context(&coupon, user_id).await?;
        let validation = CouponValidator::validate(&coupon, order_value, &usage, Utc::now());
        if !validation.valid {
            return Err(CouponError::CouponInvalid(
                validation
                    .reason
                    .unwrap_or_else(|| "Coupon is not valid".to_string()),
            ));
        }

        let discount = CouponValidator::calculate_discount(&coupon, order_value, &usage, Utc::now());
        Ok(CouponQuote {
            coupon_id: coupon.id,
            code: coupon.code,
            discount,
        })
    }

    /// Validation outcome without an error channel, for display surfaces.
    pub async fn validate(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        user_id: Uuid,
        code: &str,
        order_value: Decimal,
    ) -> Result<(CouponValidation, Decimal), CouponError> {
        match self
            .quote(tenant_id, restaurant_id, user_id, code, order_value)
            .await
        {
            Ok(quote) => Ok((CouponValidation::ok(), quote.discount)),
            Err(CouponError::NotFound(_)) => Ok((
                CouponValidation::rejected("Coupon not found"),
                Decimal::ZERO,
            )),
            Err(CouponError::CouponInvalid(reason)) => {
                Ok((CouponValidation::rejected(reason), Decimal::ZERO))
            }
            Err(other) => Err(other),
        }
    }

    /// Consume one use of a coupon for an order.
    ///
    /// The conditional increment is the only guard that matters when two
    /// checkouts race on the last remaining use; the loser gets
    /// `CouponInvalid` and must not apply the discount.
    pub async fn redeem(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), CouponError> {
        let redeemed = self.store.redeem(coupon_id, user_id, order_id).await?;
        if !redeemed {
            return Err(CouponError::CouponInvalid(
                "Coupon usage limit reached".to_string(),
            ));
        }
        Ok(())
    }

    /// Return a consumed use after losing an order-creation race.
    pub async fn release(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), CouponError> {
        self.store.release(coupon_id, user_id, order_id).await
    }

    /// Create a coupon and eagerly invalidate the restaurant's cache namespace.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        request: CreateCouponRequest,
    ) -> Result<Coupon, CouponError> {
        if request.valid_to <= request.valid_from {
            return Err(CouponError::ValidationError(
                "valid_to must be after valid_from".to_string(),
            ));
        }
        if request.discount_value < Decimal::ZERO {
            return Err(CouponError::ValidationError(
                "Discount value must be non-negative".to_string(),
            ));
        }

        let coupon = Coupon {
            id: Uuid::new_v4(),
            tenant_id,
            restaurant_id,
            code: request.code,
            discount_type: request.discount_type,
            discount_value: request.discount_value,
            min_order_value: request.min_order_value,
            valid_from: request.valid_from,
            valid_to: request.valid_to,
            max_usage: request.max_usage,
            current_usage: 0,
            per_user_usage_cap: request.per_user_usage_cap,
            new_users_only: request.new_users_only,
            is_active: true,
            created_at: Utc::now(),
        };

        let created = self.store.create(&coupon).await?;

        // Coupon data feeds cached pricing snapshots; clear the namespace
        // before acknowledging the write.
        let ns = cache::restaurant_namespace(tenant_id, restaurant_id);
        if let Err(err) = self.cache.invalidate_pattern(&format!("{}:*", ns)).await {
            tracing::warn!("Cache invalidation after coupon create failed: {}", err);
        }

        Ok(created)
    }

    pub async fn list(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Vec<Coupon>, CouponError> {
        self.store.list(tenant_id, restaurant_id).await
    }

    async fn usage_context(
        &self,
        coupon: &Coupon,
        user_id: Uuid,
    ) -> Result<UsageContext, CouponError> {
        let user_redemptions = self.store.redemptions_for_user(coupon.id, user_id).await?;
        // Prior-order lookup only matters for new-user coupons; skip the
        // query otherwise.
        let user_prior_orders = if coupon.new_users_only {
            self.orders
                .user_order_count(coupon.tenant_id, user_id)
                .await?
        } else {
            0
        };
        Ok(UsageContext {
            user_redemptions,
            user_prior_orders,
        })
    }
}

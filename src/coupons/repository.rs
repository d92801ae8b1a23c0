// Coupon persistence
//
// The one operation that matters under concurrency is `redeem`: a
// conditional increment that can never push `current_usage` past
// `max_usage`, so two checkouts racing on the last remaining use resolve
// to exactly one winner.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::coupons::error::CouponError;
use crate::coupons::models::Coupon;

/// Persistence interface for coupons.
#[async_trait]
pub trait CouponStore: Send + Sync {
    async fn find_by_code(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        code: &str,
    ) -> Result<Option<Coupon>, CouponError>;

    /// Times a user has redeemed a coupon (enforces the per-user cap).
    async fn redemptions_for_user(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, CouponError>;

    /// Atomically consume one use of a coupon for an order.
    ///
    /// Returns `false` when the cap is already exhausted; the increment and
    /// the cap check happen in one conditional update, never read-then-write.
    async fn redeem(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<bool, CouponError>;

    /// Release a previously consumed use (compensation for an order-creation
    /// race lost after redemption).
    async fn release(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), CouponError>;

    async fn create(&self, coupon: &Coupon) -> Result<Coupon, CouponError>;

    async fn list(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Vec<Coupon>, CouponError>;
}

/// How many orders a user has previously placed with a tenant.
///
/// Consumed by the coupon service for new-users-only coupons; implemented
/// by the order store.
#[async_trait]
pub trait OrderHistory: Send + Sync {
    async fn user_order_count(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64, CouponError>;
}

const COUPON_COLUMNS: &str = "id, tenant_id, restaurant_id, code, discount_type, discount_value, \
     min_order_value, valid_from, valid_to, max_usage, current_usage, per_user_usage_cap, \
     new_users_only, is_active, created_at";

/// Postgres-backed coupon store.
#[derive(Clone)]
pub struct PgCouponStore {
    pool: PgPool,
}

impl PgCouponStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponStore for PgCouponStore {
    async fn find_by_code(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        code: &str,
    ) -> Result<Option<Coupon>, CouponError> {
        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE tenant_id = $1 AND restaurant_id = $2 AND code = $3",
            COUPON_COLUMNS
        ))
        .bind(tenant_id)
        .bind(restaurant_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(coupon)
    }

    async fn redemptions_for_user(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
    ) -> Result<i64, CouponError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = $1 AND user_id = $2",
        )
        .bind(coupon_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn redeem(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<bool, CouponError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE coupons
            SET current_usage = current_usage + 1
            WHERE id = $1 AND current_usage < max_usage
            "#,
        )
        .bind(coupon_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            // Cap exhausted; nothing to commit.
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO coupon_redemptions (coupon_id, user_id, order_id) VALUES ($1, $2, $3)",
        )
        .bind(coupon_id)
        .bind(user_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn release(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<(), CouponError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM coupon_redemptions WHERE coupon_id = $1 AND user_id = $2 AND order_id = $3",
        )
        .bind(coupon_id)
        .bind(user_id)
        .bind(order_id)
        .execute(&mut *tx)
        .await?;

        if removed.rows_affected() > 0 {
            sqlx::query(
                "UPDATE coupons SET current_usage = current_usage - 1 WHERE id = $1 AND current_usage > 0",
            )
            .bind(coupon_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn create(&self, coupon: &Coupon) -> Result<Coupon, CouponError> {
        let created = sqlx::query_as::<_, Coupon>(&format!(
            r#"
            INSERT INTO coupons (id, tenant_id, restaurant_id, code, discount_type,
                discount_value, min_order_value, valid_from, valid_to, max_usage,
                current_usage, per_user_usage_cap, new_users_only, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0, $11, $12, TRUE, NOW())
            ON CONFLICT (tenant_id, restaurant_id, code) DO NOTHING
            RETURNING {}
            "#,
            COUPON_COLUMNS
        ))
        .bind(coupon.id)
        .bind(coupon.tenant_id)
        .bind(coupon.restaurant_id)
        .bind(&coupon.code)
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.min_order_value)
        .bind(coupon.valid_from)
        .bind(coupon.valid_to)
        .bind(coupon.max_usage)
        .bind(coupon.per_user_usage_cap)
        .bind(coupon.new_users_only)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CouponError::DuplicateCode(coupon.code.clone()))?;

        Ok(created)
    }

    async fn list(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
    ) -> Result<Vec<Coupon>, CouponError> {
        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {} FROM coupons WHERE tenant_id = $1 AND restaurant_id = $2 ORDER BY created_at DESC",
            COUPON_COLUMNS
        ))
        .bind(tenant_id)
        .bind(restaurant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }
}

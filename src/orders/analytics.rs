// Order analytics
//
// Read-only reporting queries over persisted order history. These sit
// entirely outside the transactional core: grouped aggregations, no state
// machine involvement, cancelled orders excluded from revenue.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::orders::error::OrderError;

/// Orders and revenue for one hour of a day.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct HourlyBucket {
    pub hour: i32,
    pub orders: i64,
    pub revenue: Decimal,
}

/// One menu item ranked by quantity sold.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TopItem {
    pub item_id: Uuid,
    pub name: String,
    pub quantity_sold: i64,
    pub revenue: Decimal,
}

/// Read-only reporting over order history.
#[derive(Clone)]
pub struct OrderAnalytics {
    pool: PgPool,
}

impl OrderAnalytics {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Orders and revenue per hour of the given day.
    pub async fn hourly_breakdown(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<HourlyBucket>, OrderError> {
        let buckets = sqlx::query_as::<_, HourlyBucket>(
            r#"
            SELECT EXTRACT(HOUR FROM created_at)::int AS hour,
                   COUNT(*) AS orders,
                   COALESCE(SUM(total), 0) AS revenue
            FROM orders
            WHERE tenant_id = $1
              AND restaurant_id = $2
              AND created_at::date = $3
              AND status <> 'cancelled'
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(tenant_id)
        .bind(restaurant_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(buckets)
    }

    /// The restaurant's best-selling items by quantity.
    pub async fn top_items(
        &self,
        tenant_id: Uuid,
        restaurant_id: Uuid,
        limit: i64,
    ) -> Result<Vec<TopItem>, OrderError> {
        let items = sqlx::query_as::<_, TopItem>(
            r#"
            SELECT (line->>'item_id')::uuid AS item_id,
                   line->>'name' AS name,
                   SUM((line->>'quantity')::bigint)::bigint AS quantity_sold,
                   COALESCE(SUM((line->>'computed_total_price')::numeric), 0) AS revenue
            FROM orders, jsonb_array_elements(items) AS line
            WHERE tenant_id = $1
              AND restaurant_id = $2
              AND status <> 'cancelled'
            GROUP BY 1, 2
            ORDER BY quantity_sold DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id)
        .bind(restaurant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}

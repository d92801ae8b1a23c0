// Order persistence
//
// The OrderStore trait is the seam between the lifecycle manager and
// storage. The Postgres implementation leans on two storage-level
// guarantees: the unique idempotency index makes create exactly-once
// under concurrent retries, and status writes are conditional on the
// expected current status so two racing transitions cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::cart::CartLine;
use crate::coupons::{CouponError, OrderHistory};
use crate::orders::error::OrderError;
use crate::orders::models::{
    CancellationMetadata, DeliveryMetadata, Order, OrderStatus, TimelineEntry,
};
use crate::pricing::CartTotal;

/// Result of an idempotent insert attempt.
#[derive(Debug)]
pub enum InsertOutcome {
    /// This call created the order.
    Created(Order),
    /// An order with the same (tenant, user, idempotency key) already
    /// existed; this is the winner's row, returned unchanged.
    Existing(Order),
}

/// Persistence interface for orders.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Insert an order atomically against the idempotency index.
    ///
    /// A race between two requests bearing the same key yields exactly one
    /// row; the loser reads back the winner's order instead of erroring.
    async fn insert(&self, order: &Order) -> Result<InsertOutcome, OrderError>;

    async fn find_by_id(&self, tenant_id: Uuid, order_id: Uuid)
        -> Result<Option<Order>, OrderError>;

    async fn find_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Order>, OrderError>;

    async fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError>;

    /// Apply a validated status transition and append its timeline entry.
    ///
    /// Conditional on the order still being in `from`; a concurrent
    /// transition that got there first surfaces as `InvalidTransition`
    /// against the actual current status.
    async fn transition(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        entry: TimelineEntry,
        actual_delivery_time: Option<DateTime<Utc>>,
    ) -> Result<Order, OrderError>;

    /// Move the order to `cancelled` with its refund metadata.
    async fn record_cancellation(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        metadata: CancellationMetadata,
        entry: TimelineEntry,
    ) -> Result<Order, OrderError>;

    /// Merge delivery fields into the order without touching status.
    async fn merge_delivery_metadata(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        metadata: &DeliveryMetadata,
    ) -> Result<Order, OrderError>;

    async fn count_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64, OrderError>;
}

#[derive(FromRow)]
struct OrderRow {
    id: Uuid,
    tenant_id: Uuid,
    restaurant_id: Uuid,
    user_id: Uuid,
    status: OrderStatus,
    items: Json<Vec<CartLine>>,
    totals: Json<CartTotal>,
    coupon_code: Option<String>,
    payment_reference: Option<String>,
    idempotency_key: String,
    estimated_delivery_time: DateTime<Utc>,
    scheduled_for: Option<DateTime<Utc>>,
    actual_delivery_time: Option<DateTime<Utc>>,
    cancellation: Option<Json<CancellationMetadata>>,
    delivery_metadata: Option<Json<DeliveryMetadata>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, timeline: Vec<TimelineEntry>) -> Order {
        Order {
            id: self.id,
            tenant_id: self.tenant_id,
            restaurant_id: self.restaurant_id,
            user_id: self.user_id,
            status: self.status,
            items: self.items.0,
            totals: self.totals.0,
            coupon_code: self.coupon_code,
            payment_reference: self.payment_reference,
            idempotency_key: self.idempotency_key,
            estimated_delivery_time: self.estimated_delivery_time,
            scheduled_for: self.scheduled_for,
            actual_delivery_time: self.actual_delivery_time,
            cancellation: self.cancellation.map(|c| c.0),
            delivery_metadata: self.delivery_metadata.map(|d| d.0),
            timeline,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct TimelineRow {
    status: OrderStatus,
    at: DateTime<Utc>,
    actor_id: Uuid,
    notes: Option<String>,
}

impl From<TimelineRow> for TimelineEntry {
    fn from(row: TimelineRow) -> Self {
        TimelineEntry {
            status: row.status,
            at: row.at,
            actor_id: row.actor_id,
            notes: row.notes,
        }
    }
}

const ORDER_COLUMNS: &str = "id, tenant_id, restaurant_id, user_id, status, items, totals, \
     coupon_code, payment_reference, idempotency_key, estimated_delivery_time, scheduled_for, \
     actual_delivery_time, cancellation, delivery_metadata, created_at, updated_at";

/// Postgres-backed order store.
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_timeline(&self, order_id: Uuid) -> Result<Vec<TimelineEntry>, OrderError> {
        let rows = sqlx::query_as::<_, TimelineRow>(
            "SELECT status, at, actor_id, notes FROM order_timeline WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TimelineEntry::from).collect())
    }

    async fn append_timeline(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        order_id: Uuid,
        entry: &TimelineEntry,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO order_timeline (order_id, status, at, actor_id, notes) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order_id)
        .bind(entry.status)
        .bind(entry.at)
        .bind(entry.actor_id)
        .bind(&entry.notes)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn insert(&self, order: &Order) -> Result<InsertOutcome, OrderError> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (id, tenant_id, restaurant_id, user_id, status, items, totals,
                total, coupon_code, payment_reference, idempotency_key, estimated_delivery_time,
                scheduled_for, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14)
            ON CONFLICT (tenant_id, user_id, idempotency_key) DO NOTHING
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(order.id)
        .bind(order.tenant_id)
        .bind(order.restaurant_id)
        .bind(order.user_id)
        .bind(order.status)
        .bind(Json(&order.items))
        .bind(Json(&order.totals))
        .bind(order.totals.total)
        .bind(&order.coupon_code)
        .bind(&order.payment_reference)
        .bind(&order.idempotency_key)
        .bind(order.estimated_delivery_time)
        .bind(order.scheduled_for)
        .bind(order.created_at)
        .fetch_optional(&mut *tx)
        .await?;

        match inserted {
            Some(row) => {
                for entry in &order.timeline {
                    Self::append_timeline(&mut tx, order.id, entry).await?;
                }
                tx.commit().await?;
                Ok(InsertOutcome::Created(row.into_order(order.timeline.clone())))
            }
            None => {
                // Lost the race: read back the winner's row.
                tx.rollback().await?;
                let existing = self
                    .find_by_idempotency_key(
                        order.tenant_id,
                        order.user_id,
                        &order.idempotency_key,
                    )
                    .await?
                    .ok_or(OrderError::NotFound)?;
                Ok(InsertOutcome::Existing(existing))
            }
        }
    }

    async fn find_by_id(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
    ) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE tenant_id = $1 AND id = $2",
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let timeline = self.load_timeline(order_id).await?;
                Ok(Some(row.into_order(timeline)))
            }
            None => Ok(None),
        }
    }

    async fn find_by_idempotency_key(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<Order>, OrderError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE tenant_id = $1 AND user_id = $2 AND idempotency_key = $3",
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(user_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let order_id = row.id;
                let timeline = self.load_timeline(order_id).await?;
                Ok(Some(row.into_order(timeline)))
            }
            None => Ok(None),
        }
    }

    async fn list_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        status: Option<OrderStatus>,
    ) -> Result<Vec<Order>, OrderError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {} FROM orders WHERE tenant_id = $1 AND user_id = $2 AND status = $3 ORDER BY created_at DESC",
                    ORDER_COLUMNS
                ))
                .bind(tenant_id)
                .bind(user_id)
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, OrderRow>(&format!(
                    "SELECT {} FROM orders WHERE tenant_id = $1 AND user_id = $2 ORDER BY created_at DESC",
                    ORDER_COLUMNS
                ))
                .bind(tenant_id)
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let timeline = self.load_timeline(row.id).await?;
            orders.push(row.into_order(timeline));
        }
        Ok(orders)
    }

    async fn transition(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        to: OrderStatus,
        entry: TimelineEntry,
        actual_delivery_time: Option<DateTime<Utc>>,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET status = $4,
                actual_delivery_time = COALESCE(actual_delivery_time, $5),
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND status = $3
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(order_id)
        .bind(from)
        .bind(to)
        .bind(actual_delivery_time)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            tx.rollback().await?;
            // Either gone, or a concurrent transition moved it first.
            let current = self
                .find_by_id(tenant_id, order_id)
                .await?
                .ok_or(OrderError::NotFound)?;
            return Err(OrderError::InvalidTransition {
                from: current.status,
                to,
            });
        };

        Self::append_timeline(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        let timeline = self.load_timeline(order_id).await?;
        Ok(row.into_order(timeline))
    }

    async fn record_cancellation(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        from: OrderStatus,
        metadata: CancellationMetadata,
        entry: TimelineEntry,
    ) -> Result<Order, OrderError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET status = $4, cancellation = $5, updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2 AND status = $3
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(order_id)
        .bind(from)
        .bind(OrderStatus::Cancelled)
        .bind(Json(&metadata))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = updated else {
            tx.rollback().await?;
            let current = self
                .find_by_id(tenant_id, order_id)
                .await?
                .ok_or(OrderError::NotFound)?;
            return Err(OrderError::InvalidTransition {
                from: current.status,
                to: OrderStatus::Cancelled,
            });
        };

        Self::append_timeline(&mut tx, order_id, &entry).await?;
        tx.commit().await?;

        let timeline = self.load_timeline(order_id).await?;
        Ok(row.into_order(timeline))
    }

    async fn merge_delivery_metadata(
        &self,
        tenant_id: Uuid,
        order_id: Uuid,
        metadata: &DeliveryMetadata,
    ) -> Result<Order, OrderError> {
        // jsonb || merges only the provided keys; absent fields are
        // skipped during serialization and therefore left untouched.
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            UPDATE orders
            SET delivery_metadata = COALESCE(delivery_metadata, '{{}}'::jsonb) || $3,
                updated_at = NOW()
            WHERE tenant_id = $1 AND id = $2
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(tenant_id)
        .bind(order_id)
        .bind(Json(metadata))
        .fetch_optional(&self.pool)
        .await?
        .ok_or(OrderError::NotFound)?;

        let timeline = self.load_timeline(order_id).await?;
        Ok(row.into_order(timeline))
    }

    async fn count_for_user(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64, OrderError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE tenant_id = $1 AND user_id = $2")
                .bind(tenant_id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

#[async_trait]
impl OrderHistory for PgOrderStore {
    async fn user_order_count(&self, tenant_id: Uuid, user_id: Uuid) -> Result<i64, CouponError> {
        self.count_for_user(tenant_id, user_id)
            .await
            .map_err(|e| CouponError::DatabaseError(e.to_string()))
    }
}

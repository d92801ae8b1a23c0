// Audit trail
//
// Records who did what to orders and coupons. Audit failures are logged
// and swallowed; they never block the primary operation.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// Audit recording contract.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, tenant_id: Uuid, actor_id: Uuid, action: &str, details: JsonValue);
}

/// Postgres-backed audit sink.
#[derive(Clone)]
pub struct PgAuditSink {
    pool: PgPool,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for PgAuditSink {
    async fn record(&self, tenant_id: Uuid, actor_id: Uuid, action: &str, details: JsonValue) {
        let result = sqlx::query(
            "INSERT INTO audit_log (tenant_id, actor_id, action, details) VALUES ($1, $2, $3, $4)",
        )
        .bind(tenant_id)
        .bind(actor_id)
        .bind(action)
        .bind(details)
        .execute(&self.pool)
        .await;

        if let Err(err) = result {
            tracing::warn!("Failed to record audit entry for action '{}': {}", action, err);
        }
    }
}

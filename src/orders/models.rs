use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::cart::CartLine;
use crate::pricing::CartTotal;

/// Order status enum representing the lifecycle of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// All statuses, for exhaustive table checks.
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "confirmed" => Ok(OrderStatus::Confirmed),
            "preparing" => Ok(OrderStatus::Preparing),
            "ready" => Ok(OrderStatus::Ready),
            "out_for_delivery" => Ok(OrderStatus::OutForDelivery),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }

    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry in an order's append-only timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub status: OrderStatus,
    pub at: DateTime<Utc>,
    pub actor_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Cancellation outcome recorded on the order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationMetadata {
    pub reason: String,
    pub refund_amount: Decimal,
    pub refund_percentage: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_id: Option<String>,
}

/// Delivery assignment details, merged independently of status transitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DeliveryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_person: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta: Option<DateTime<Utc>>,
}

/// Persisted order: an immutable snapshot of the cart and its validated
/// totals at creation time, plus the status machine state around it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub restaurant_id: Uuid,
    pub user_id: Uuid,
    pub status: OrderStatus,
    pub items: Vec<CartLine>,
    pub totals: CartTotal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    pub idempotency_key: String,
    pub estimated_delivery_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_delivery_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<CancellationMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_metadata: Option<DeliveryMetadata>,
    pub timeline: Vec<TimelineEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for creating an order from the stored cart.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    /// The total the client displayed at checkout; compared against the
    /// server-side recomputation, never trusted.
    pub client_total: Decimal,
    pub coupon_code: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    #[validate(length(min = 8, max = 128, message = "Idempotency key must be 8-128 characters"))]
    pub idempotency_key: String,
}

/// Request DTO for updating order status
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
    pub notes: Option<String>,
}

/// Request DTO for cancelling an order
#[derive(Debug, Deserialize, Validate)]
pub struct CancelOrderRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
    pub notes: Option<String>,
}

/// Cancellation eligibility, reported without mutating the order.
#[derive(Debug, Clone, Serialize)]
pub struct CancellationEligibility {
    pub cancellable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_percentage: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Actions available to bulk operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    UpdateStatus,
    Cancel,
    Assign,
}

/// Request DTO for bulk order operations
#[derive(Debug, Deserialize, Validate)]
pub struct BulkOperateRequest {
    #[validate(length(min = 1, max = 100, message = "Between 1 and 100 order ids"))]
    pub order_ids: Vec<Uuid>,
    pub action: BulkAction,
    pub status: Option<OrderStatus>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub delivery_metadata: Option<DeliveryMetadata>,
    #[serde(default)]
    pub dry_run: bool,
}

/// One failed order in a bulk operation.
#[derive(Debug, Clone, Serialize)]
pub struct BulkError {
    pub order_id: Uuid,
    pub error: String,
}

/// Partial-success tally for bulk operations: one failing order never
/// blocks the others.
#[derive(Debug, Clone, Serialize)]
pub struct BulkOperationReport {
    pub processed: u32,
    pub failed: u32,
    pub errors: Vec<BulkError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in OrderStatus::ALL {
            assert_eq!(OrderStatus::from_str(status.as_str()), Ok(status));
        }
    }

    #[test]
    fn test_out_for_delivery_uses_snake_case() {
        assert_eq!(OrderStatus::OutForDelivery.as_str(), "out_for_delivery");
        let json = serde_json::to_string(&OrderStatus::OutForDelivery).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::OutForDelivery.is_terminal());
    }

    #[test]
    fn test_invalid_status_string() {
        assert!(OrderStatus::from_str("completed").is_err());
    }
}

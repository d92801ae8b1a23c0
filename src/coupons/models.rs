use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// How a coupon discounts the order value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

impl DiscountType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "percentage",
            DiscountType::Fixed => "fixed",
        }
    }
}

impl std::fmt::Display for DiscountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted coupon entity.
///
/// `current_usage` is mutated only by the atomic increment in the
/// repository's `redeem`; it never exceeds `max_usage`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Coupon {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub restaurant_id: Uuid,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_value: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub max_usage: i32,
    pub current_usage: i32,
    pub per_user_usage_cap: i32,
    pub new_users_only: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Request DTO for creating a coupon.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCouponRequest {
    #[validate(
        length(min = 3, max = 32, message = "Code must be 3-32 characters"),
        custom = "crate::validation::validate_coupon_code"
    )]
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub min_order_value: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    #[validate(range(min = 1, message = "Max usage must be at least 1"))]
    pub max_usage: i32,
    #[serde(default = "default_per_user_cap")]
    pub per_user_usage_cap: i32,
    #[serde(default)]
    pub new_users_only: bool,
}

fn default_per_user_cap() -> i32 {
    1
}

/// Request DTO for validating a coupon against an order value.
#[derive(Debug, Deserialize, Validate)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub order_value: Decimal,
}

/// Outcome of coupon validation: either usable, or a specific reason why not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CouponValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// A validated coupon quote: the discount the order would receive.
#[derive(Debug, Clone, Serialize)]
pub struct CouponQuote {
    pub coupon_id: Uuid,
    pub code: String,
    pub discount: Decimal,
}

// Coupon validation and discount calculation
//
// Pure checks over a coupon snapshot: no I/O, deterministic given `now`.
// The first failing check short-circuits with its specific reason so the
// caller can render an actionable message. Actual usage accounting happens
// in the repository's atomic redeem, never here.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::coupons::models::{Coupon, CouponValidation, DiscountType};
use crate::pricing::round2;

/// Per-user usage facts the validator needs alongside the coupon itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageContext {
    /// Times this user has already redeemed this coupon.
    pub user_redemptions: i64,
    /// Orders this user has placed with this tenant (any restaurant).
    pub user_prior_orders: i64,
}

/// Service for coupon eligibility and discount calculation
pub struct CouponValidator;

impl CouponValidator {
    /// Check a coupon against an order value and user usage.
    ///
    /// Checks run in a fixed order and the first failure wins: active flag,
    /// not-yet-valid window, expiry, usage cap, per-user cap, new-users-only,
    /// minimum order value.
    pub fn validate(
        coupon: &Coupon,
        order_value: Decimal,
        usage: &UsageContext,
        now: DateTime<Utc>,
    ) -> CouponValidation {
        if !coupon.is_active {
            return CouponValidation::rejected("Coupon is not active");
        }
        if now < coupon.valid_from {
            return CouponValidation::rejected("Coupon is not yet valid");
        }
        if now > coupon.valid_to {
            return CouponValidation::rejected("Coupon has expired");
        }
        if coupon.current_usage >= coupon.max_usage {
            return CouponValidation::rejected("Coupon usage limit reached");
        }
        if usage.user_redemptions >= i64::from(coupon.per_user_usage_cap) {
            return CouponValidation::rejected("You have already used this coupon");
        }
        if coupon.new_users_only && usage.user_prior_orders > 0 {
            return CouponValidation::rejected("Coupon is only valid for new users");
        }
        if order_value < coupon.min_order_value {
            return CouponValidation::rejected(format!(
                "Minimum order value for this coupon is {}",
                coupon.min_order_value
            ));
        }
        CouponValidation::ok()
    }

    /// The discount a coupon grants on an order value; 0 when validation fails.
    ///
    /// Percentage coupons round to 2 decimals; fixed coupons never exceed
    /// the order value.
    pub fn calculate_discount(
        coupon: &Coupon,
        order_value: Decimal,
        usage: &UsageContext,
        now: DateTime<Utc>,
    ) -> Decimal {
        if !Self::validate(coupon, order_value, usage, now).valid {
            return Decimal::ZERO;
        }
        match coupon.discount_type {
            DiscountType::Percentage => {
                round2(order_value * coupon.discount_value / Decimal::from(100))
            }
            DiscountType::Fixed => coupon.discount_value.min(order_value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn coupon(now: DateTime<Utc>) -> Coupon {
        Coupon {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            code: "WELCOME50".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: dec!(50),
            min_order_value: dec!(200),
            valid_from: now - Duration::days(1),
            valid_to: now + Duration::days(1),
            max_usage: 100,
            current_usage: 0,
            per_user_usage_cap: 1,
            new_users_only: false,
            is_active: true,
            created_at: now - Duration::days(1),
        }
    }

    #[test]
    fn test_valid_coupon_passes() {
        let now = Utc::now();
        let result =
            CouponValidator::validate(&coupon(now), dec!(500), &UsageContext::default(), now);
        assert!(result.valid);
        assert!(result.reason.is_none());
    }

    #[test]
    fn test_inactive_coupon_short_circuits_first() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.is_active = false;
        c.current_usage = c.max_usage; // would also fail the cap check
        let result = CouponValidator::validate(&c, dec!(500), &UsageContext::default(), now);
        assert_eq!(result.reason.as_deref(), Some("Coupon is not active"));
    }

    #[test]
    fn test_not_yet_valid() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.valid_from = now + Duration::hours(1);
        let result = CouponValidator::validate(&c, dec!(500), &UsageContext::default(), now);
        assert_eq!(result.reason.as_deref(), Some("Coupon is not yet valid"));
    }

    #[test]
    fn test_expired() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.valid_to = now - Duration::hours(1);
        let result = CouponValidator::validate(&c, dec!(500), &UsageContext::default(), now);
        assert_eq!(result.reason.as_deref(), Some("Coupon has expired"));
    }

    #[test]
    fn test_usage_cap_reached() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.current_usage = c.max_usage;
        let result = CouponValidator::validate(&c, dec!(500), &UsageContext::default(), now);
        assert_eq!(result.reason.as_deref(), Some("Coupon usage limit reached"));
    }

    #[test]
    fn test_per_user_cap() {
        let now = Utc::now();
        let usage = UsageContext {
            user_redemptions: 1,
            user_prior_orders: 3,
        };
        let result = CouponValidator::validate(&coupon(now), dec!(500), &usage, now);
        assert_eq!(
            result.reason.as_deref(),
            Some("You have already used this coupon")
        );
    }

    #[test]
    fn test_new_users_only() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.new_users_only = true;
        let usage = UsageContext {
            user_redemptions: 0,
            user_prior_orders: 2,
        };
        let result = CouponValidator::validate(&c, dec!(500), &usage, now);
        assert_eq!(
            result.reason.as_deref(),
            Some("Coupon is only valid for new users")
        );
    }

    #[test]
    fn test_below_min_order_value() {
        let now = Utc::now();
        let result =
            CouponValidator::validate(&coupon(now), dec!(150), &UsageContext::default(), now);
        assert!(!result.valid);
        assert!(result
            .reason
            .unwrap()
            .contains("Minimum order value"));
    }

    #[test]
    fn test_percentage_discount_rounds() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.discount_value = dec!(15);
        // 15% of 333.33 = 49.9995 -> 50.00
        let discount =
            CouponValidator::calculate_discount(&c, dec!(333.33), &UsageContext::default(), now);
        assert_eq!(discount, dec!(50.00));
    }

    #[test]
    fn test_fixed_discount_capped_at_order_value() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.discount_type = DiscountType::Fixed;
        c.discount_value = dec!(300);
        c.min_order_value = dec!(0);
        let discount =
            CouponValidator::calculate_discount(&c, dec!(250), &UsageContext::default(), now);
        assert_eq!(discount, dec!(250));
    }

    #[test]
    fn test_invalid_coupon_discounts_zero() {
        let now = Utc::now();
        let mut c = coupon(now);
        c.is_active = false;
        let discount =
            CouponValidator::calculate_discount(&c, dec!(500), &UsageContext::default(), now);
        assert_eq!(discount, Decimal::ZERO);
    }
}

// Pricing engine
//
// Pure computation of cart totals: subtotal, GST breakdown, delivery fee,
// discount clamp, rounding adjustment and grand total. No I/O; the same
// inputs always produce the same CartTotal, which is what lets order
// creation recompute and compare against a client-submitted total.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One already-priced cart line as seen by the pricing engine.
///
/// The engine does not know about menu items or modifiers; it trusts the
/// caller to have derived `line_total` server-side.
#[derive(Debug, Clone, Copy)]
pub struct PricedLine {
    pub line_total: Decimal,
    pub quantity: u32,
}

/// GST split policy.
///
/// The split strategy is pluggable rather than hard-coded: intrastate
/// sales split the tax evenly into CGST and SGST, interstate sales charge
/// the whole amount as IGST. Which policy applies to a given order is the
/// caller's decision, not this engine's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxSplit {
    #[default]
    Intrastate,
    Interstate,
}

/// GST component breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TaxBreakdown {
    pub cgst: Decimal,
    pub sgst: Decimal,
    pub igst: Decimal,
}

impl TaxBreakdown {
    pub fn zero() -> Self {
        Self {
            cgst: Decimal::ZERO,
            sgst: Decimal::ZERO,
            igst: Decimal::ZERO,
        }
    }

    pub fn sum(&self) -> Decimal {
        self.cgst + self.sgst + self.igst
    }
}

/// Pricing snapshot for a cart. Transient read model, never authoritative:
/// order creation always recomputes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartTotal {
    pub subtotal: Decimal,
    pub tax_breakdown: TaxBreakdown,
    pub tax: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub rounding_adjustment: Decimal,
    pub total: Decimal,
    pub item_count: u32,
}

impl CartTotal {
    /// The all-zero total for an empty cart.
    pub fn empty() -> Self {
        Self {
            subtotal: Decimal::ZERO,
            tax_breakdown: TaxBreakdown::zero(),
            tax: Decimal::ZERO,
            delivery_fee: Decimal::ZERO,
            discount: Decimal::ZERO,
            rounding_adjustment: Decimal::ZERO,
            total: Decimal::ZERO,
            item_count: 0,
        }
    }
}

/// Restaurant-level pricing parameters, sourced from the restaurant profile.
#[derive(Debug, Clone, Copy)]
pub struct PricingConfig {
    /// Tax rate in [0, 1].
    pub tax_rate: Decimal,
    pub tax_split: TaxSplit,
    /// Orders with a positive subtotal below this threshold pay the fee.
    pub delivery_fee_threshold: Decimal,
    pub delivery_fee_amount: Decimal,
}

/// Tolerance when comparing a client-displayed unit price or modifier
/// delta against the live menu.
pub const PRICE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Tolerance when comparing a client-submitted grand total against the
/// server-side recomputation. Beyond it the order is rejected, never
/// silently corrected.
pub const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(2, 0, 0, false, 2);

/// Round to 2 decimals, midpoints away from zero (paisa-exact GST rounding).
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Service computing cart totals.
pub struct PricingEngine;

impl PricingEngine {
    /// Compute the full pricing snapshot for a list of priced lines.
    ///
    /// `discount` is the amount already computed by the coupon validator;
    /// it is clamped to `[0, subtotal]` here. A tax rate outside [0, 1] or
    /// a negative discount is a programmer error, not user input, and
    /// fails fast.
    pub fn compute_total(lines: &[PricedLine], config: &PricingConfig, discount: Decimal) -> CartTotal {
        assert!(
            config.tax_rate >= Decimal::ZERO && config.tax_rate <= Decimal::ONE,
            "tax rate must be within [0, 1], got {}",
            config.tax_rate
        );
        assert!(
            discount >= Decimal::ZERO,
            "discount must be non-negative, got {}",
            discount
        );

        if lines.is_empty() {
            return CartTotal::empty();
        }

        let subtotal = round2(lines.iter().map(|line| line.line_total).sum());
        let item_count: u32 = lines.iter().map(|line| line.quantity).sum();

        let tax_amount = subtotal * config.tax_rate;
        let tax_breakdown = match config.tax_split {
            TaxSplit::Intrastate => {
                let half = round2(tax_amount / Decimal::from(2));
                TaxBreakdown {
                    cgst: half,
                    sgst: half,
                    igst: Decimal::ZERO,
                }
            }
            TaxSplit::Interstate => TaxBreakdown {
                cgst: Decimal::ZERO,
                sgst: Decimal::ZERO,
                igst: round2(tax_amount),
            },
        };
        let tax = tax_breakdown.sum();

        let delivery_fee = if subtotal > Decimal::ZERO && subtotal < config.delivery_fee_threshold {
            config.delivery_fee_amount
        } else {
            Decimal::ZERO
        };

        let discount = discount.min(subtotal);

        let pre_round_total = subtotal + tax + delivery_fee - discount;
        let total = round2(pre_round_total).max(Decimal::ZERO);
        let rounding_adjustment = total - pre_round_total;

        CartTotal {
            subtotal,
            tax_breakdown,
            tax,
            delivery_fee,
            discount,
            rounding_adjustment,
            total,
            item_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn config(tax_rate: Decimal, threshold: Decimal, fee: Decimal) -> PricingConfig {
        PricingConfig {
            tax_rate,
            tax_split: TaxSplit::Intrastate,
            delivery_fee_threshold: threshold,
            delivery_fee_amount: fee,
        }
    }

    fn line(total: Decimal, quantity: u32) -> PricedLine {
        PricedLine {
            line_total: total,
            quantity,
        }
    }

    #[test]
    fn test_empty_cart_is_all_zero() {
        let total = PricingEngine::compute_total(
            &[],
            &config(dec!(0.05), dec!(200), dec!(30)),
            Decimal::ZERO,
        );
        assert_eq!(total, CartTotal::empty());
    }

    #[test]
    fn test_gst_split_scenario() {
        // subtotal 199.50 at 5% tax: 9.975 halves to 4.9875, rounded 4.99
        let total = PricingEngine::compute_total(
            &[line(dec!(199.50), 1)],
            &config(dec!(0.05), dec!(100), dec!(30)),
            Decimal::ZERO,
        );
        assert_eq!(total.subtotal, dec!(199.50));
        assert_eq!(total.tax_breakdown.cgst, dec!(4.99));
        assert_eq!(total.tax_breakdown.sgst, dec!(4.99));
        assert_eq!(total.tax_breakdown.igst, dec!(0));
        assert_eq!(total.tax, dec!(9.98));
        assert_eq!(total.delivery_fee, dec!(0));
        assert_eq!(total.total, dec!(209.48));
        assert_eq!(total.rounding_adjustment, dec!(0));
    }

    #[test]
    fn test_interstate_split_charges_igst_only() {
        let total = PricingEngine::compute_total(
            &[line(dec!(199.50), 1)],
            &PricingConfig {
                tax_rate: dec!(0.05),
                tax_split: TaxSplit::Interstate,
                delivery_fee_threshold: dec!(100),
                delivery_fee_amount: dec!(30),
            },
            Decimal::ZERO,
        );
        assert_eq!(total.tax_breakdown.cgst, dec!(0));
        assert_eq!(total.tax_breakdown.sgst, dec!(0));
        assert_eq!(total.tax_breakdown.igst, dec!(9.98));
        assert_eq!(total.tax, dec!(9.98));
    }

    #[test]
    fn test_delivery_fee_below_threshold() {
        let total = PricingEngine::compute_total(
            &[line(dec!(150), 2)],
            &config(dec!(0), dec!(200), dec!(30)),
            Decimal::ZERO,
        );
        assert_eq!(total.delivery_fee, dec!(30));
        assert_eq!(total.total, dec!(180));
    }

    #[test]
    fn test_delivery_fee_waived_at_threshold() {
        let total = PricingEngine::compute_total(
            &[line(dec!(250), 2)],
            &config(dec!(0), dec!(200), dec!(30)),
            Decimal::ZERO,
        );
        assert_eq!(total.delivery_fee, dec!(0));
        assert_eq!(total.total, dec!(250));
    }

    #[test]
    fn test_discount_clamped_to_subtotal() {
        let total = PricingEngine::compute_total(
            &[line(dec!(100), 1)],
            &config(dec!(0), dec!(50), dec!(30)),
            dec!(500),
        );
        assert_eq!(total.discount, dec!(100));
        assert!(total.total >= Decimal::ZERO);
    }

    #[test]
    fn test_item_count_sums_quantities() {
        let total = PricingEngine::compute_total(
            &[line(dec!(10), 2), line(dec!(20), 3)],
            &config(dec!(0.05), dec!(200), dec!(30)),
            Decimal::ZERO,
        );
        assert_eq!(total.item_count, 5);
    }

    #[test]
    #[should_panic(expected = "tax rate must be within [0, 1]")]
    fn test_tax_rate_out_of_range_fails_fast() {
        PricingEngine::compute_total(
            &[line(dec!(10), 1)],
            &config(dec!(1.5), dec!(200), dec!(30)),
            Decimal::ZERO,
        );
    }

    #[test]
    #[should_panic(expected = "discount must be non-negative")]
    fn test_negative_discount_fails_fast() {
        PricingEngine::compute_total(
            &[line(dec!(10), 1)],
            &config(dec!(0.05), dec!(200), dec!(30)),
            dec!(-1),
        );
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn cents(value: u32) -> Decimal {
        Decimal::from(value) / Decimal::from(100)
    }

    /// Total always reconciles: total == round2(subtotal + tax + fee - discount).
    #[test]
    fn prop_total_reconciles() {
        proptest!(|(
            line_cents in prop::collection::vec(1u32..=100_000, 1..=12),
            discount_cents in 0u32..=50_000,
        )| {
            let lines: Vec<PricedLine> = line_cents
                .iter()
                .map(|&c| PricedLine { line_total: cents(c), quantity: 1 })
                .collect();
            let config = PricingConfig {
                tax_rate: dec!(0.05),
                tax_split: TaxSplit::Intrastate,
                delivery_fee_threshold: dec!(200),
                delivery_fee_amount: dec!(30),
            };

            let total = PricingEngine::compute_total(&lines, &config, cents(discount_cents));

            let expected = round2(
                total.subtotal + total.tax + total.delivery_fee - total.discount,
            )
            .max(Decimal::ZERO);
            prop_assert_eq!(total.total, expected);
        });
    }

    /// Totals are never negative, even when the discount exceeds the subtotal.
    #[test]
    fn prop_total_is_non_negative() {
        proptest!(|(
            line_cents in prop::collection::vec(1u32..=10_000, 1..=6),
            discount_cents in 0u32..=1_000_000,
        )| {
            let lines: Vec<PricedLine> = line_cents
                .iter()
                .map(|&c| PricedLine { line_total: cents(c), quantity: 1 })
                .collect();
            let config = PricingConfig {
                tax_rate: dec!(0.05),
                tax_split: TaxSplit::Intrastate,
                delivery_fee_threshold: dec!(200),
                delivery_fee_amount: dec!(30),
            };

            let total = PricingEngine::compute_total(&lines, &config, cents(discount_cents));
            prop_assert!(total.total >= Decimal::ZERO);
        });
    }

    /// The breakdown always sums to the reported tax, under either split.
    #[test]
    fn prop_breakdown_sums_to_tax() {
        proptest!(|(
            line_cents in prop::collection::vec(1u32..=100_000, 1..=8),
            interstate in any::<bool>(),
        )| {
            let lines: Vec<PricedLine> = line_cents
                .iter()
                .map(|&c| PricedLine { line_total: cents(c), quantity: 1 })
                .collect();
            let config = PricingConfig {
                tax_rate: dec!(0.18),
                tax_split: if interstate { TaxSplit::Interstate } else { TaxSplit::Intrastate },
                delivery_fee_threshold: dec!(200),
                delivery_fee_amount: dec!(30),
            };

            let total = PricingEngine::compute_total(&lines, &config, Decimal::ZERO);
            prop_assert_eq!(total.tax, total.tax_breakdown.sum());
            if interstate {
                prop_assert_eq!(total.tax_breakdown.cgst, Decimal::ZERO);
                prop_assert_eq!(total.tax_breakdown.sgst, Decimal::ZERO);
            } else {
                prop_assert_eq!(total.tax_breakdown.cgst, total.tax_breakdown.sgst);
                prop_assert_eq!(total.tax_breakdown.igst, Decimal::ZERO);
            }
        });
    }

    /// The rounding adjustment is bounded by a cent either way.
    #[test]
    fn prop_rounding_adjustment_is_bounded() {
        proptest!(|(
            line_cents in prop::collection::vec(1u32..=100_000, 1..=8),
        )| {
            let lines: Vec<PricedLine> = line_cents
                .iter()
                .map(|&c| PricedLine { line_total: cents(c), quantity: 1 })
                .collect();
            let config = PricingConfig {
                tax_rate: dec!(0.05),
                tax_split: TaxSplit::Intrastate,
                delivery_fee_threshold: dec!(200),
                delivery_fee_amount: dec!(30),
            };

            let total = PricingEngine::compute_total(&lines, &config, Decimal::ZERO);
            prop_assert!(total.rounding_adjustment.abs() <= dec!(0.02));
        });
    }
}

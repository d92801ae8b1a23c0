use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::pricing::CartTotal;

/// A modifier option selected on a cart line, with its price delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SelectedModifier {
    pub modifier_id: Uuid,
    pub option_id: Uuid,
    pub price_delta: Decimal,
}

/// One line in a cart.
///
/// `computed_unit_price` and `computed_total_price` are always re-derived
/// server-side from the live menu; client-submitted values are only ever
/// compared against them, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub id: Uuid,
    pub item_id: Uuid,
    pub name: String,
    pub unit_base_price: Decimal,
    pub selected_modifiers: Vec<SelectedModifier>,
    pub quantity: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    pub computed_unit_price: Decimal,
    pub computed_total_price: Decimal,
}

impl CartLine {
    /// Build a line with server-derived prices.
    pub fn derive(
        item_id: Uuid,
        name: String,
        unit_base_price: Decimal,
        selected_modifiers: Vec<SelectedModifier>,
        quantity: u32,
        special_instructions: Option<String>,
    ) -> Self {
        let modifier_total: Decimal = selected_modifiers.iter().map(|m| m.price_delta).sum();
        let computed_unit_price = unit_base_price + modifier_total;
        let computed_total_price = computed_unit_price * Decimal::from(quantity);
        Self {
            id: Uuid::new_v4(),
            item_id,
            name,
            unit_base_price,
            selected_modifiers,
            quantity,
            special_instructions,
            computed_unit_price,
            computed_total_price,
        }
    }

    /// Update the quantity and re-derive the line total.
    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.computed_total_price = self.computed_unit_price * Decimal::from(quantity);
    }

    /// The unordered identity of this line's modifier selection.
    ///
    /// A set comparison, not a string match, so two selections that differ
    /// only in ordering are the same line.
    pub fn modifier_set(&self) -> BTreeSet<(Uuid, Uuid)> {
        self.selected_modifiers
            .iter()
            .map(|m| (m.modifier_id, m.option_id))
            .collect()
    }

    /// Whether another line is the same item with the same modifier set.
    pub fn merges_with(&self, other: &CartLine) -> bool {
        self.item_id == other.item_id && self.modifier_set() == other.modifier_set()
    }
}

/// A user's cart for one restaurant.
///
/// Owned by (tenant, user); tagged with the restaurant it was built
/// against. Switching restaurants discards the cart entirely rather than
/// mixing items from two menus.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Cart {
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub items: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(tenant_id: Uuid, user_id: Uuid, restaurant_id: Uuid) -> Self {
        Self {
            tenant_id,
            user_id,
            restaurant_id,
            items: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Merge a line into an existing equivalent line or append it.
    ///
    /// Returns the resulting quantity of the affected line.
    pub fn merge_or_push(&mut self, line: CartLine) -> u32 {
        if let Some(existing) = self.items.iter_mut().find(|l| l.merges_with(&line)) {
            let merged = existing.quantity + line.quantity;
            existing.set_quantity(merged);
            merged
        } else {
            let quantity = line.quantity;
            self.items.push(line);
            quantity
        }
    }

    pub fn find_line_mut(&mut self, line_id: Uuid) -> Option<&mut CartLine> {
        self.items.iter_mut().find(|l| l.id == line_id)
    }

    pub fn remove_line(&mut self, line_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|l| l.id != line_id);
        self.items.len() != before
    }
}

/// Modifier selection as submitted by the client, including the price delta
/// it displayed. The delta is validated against the live menu, not trusted.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SelectedModifierInput {
    pub modifier_id: Uuid,
    pub option_id: Uuid,
    pub price_delta: Decimal,
}

/// Request DTO for adding an item to the cart.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    pub item_id: Uuid,
    /// The unit base price the client displayed, re-validated server-side.
    pub unit_base_price: Decimal,
    #[serde(default)]
    pub selected_modifiers: Vec<SelectedModifierInput>,
    #[validate(range(min = 1, max = 50, message = "Quantity must be between 1 and 50"))]
    pub quantity: u32,
    #[validate(length(max = 500, message = "Special instructions must be at most 500 characters"))]
    pub special_instructions: Option<String>,
}

/// Request DTO for changing a line's quantity. Zero removes the line.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    #[validate(range(max = 50, message = "Quantity must be at most 50"))]
    pub quantity: u32,
}

/// Cart contents plus the freshly recomputed pricing snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CartResponse {
    pub restaurant_id: Uuid,
    pub items: Vec<CartLine>,
    pub totals: CartTotal,
    pub updated_at: DateTime<Utc>,
}

/// Coupon outcome attached to a calculated total.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AppliedCoupon {
    pub code: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub discount: Decimal,
}

/// Response DTO for the display-only total calculation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CalculatedTotalResponse {
    pub totals: CartTotal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon: Option<AppliedCoupon>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn modifier(delta: Decimal) -> SelectedModifier {
        SelectedModifier {
            modifier_id: Uuid::new_v4(),
            option_id: Uuid::new_v4(),
            price_delta: delta,
        }
    }

    #[test]
    fn test_derive_computes_unit_and_total() {
        let line = CartLine::derive(
            Uuid::new_v4(),
            "Masala Dosa".to_string(),
            dec!(120),
            vec![modifier(dec!(25)), modifier(dec!(10))],
            3,
            None,
        );
        assert_eq!(line.computed_unit_price, dec!(155));
        assert_eq!(line.computed_total_price, dec!(465));
    }

    #[test]
    fn test_set_quantity_rederives_total() {
        let mut line = CartLine::derive(
            Uuid::new_v4(),
            "Chai".to_string(),
            dec!(30),
            vec![],
            1,
            None,
        );
        line.set_quantity(4);
        assert_eq!(line.computed_total_price, dec!(120));
    }

    #[test]
    fn test_modifier_set_is_order_insensitive() {
        let m1 = modifier(dec!(5));
        let m2 = modifier(dec!(10));
        let item_id = Uuid::new_v4();

        let a = CartLine::derive(
            item_id,
            "Wrap".to_string(),
            dec!(100),
            vec![m1.clone(), m2.clone()],
            1,
            None,
        );
        let b = CartLine::derive(
            item_id,
            "Wrap".to_string(),
            dec!(100),
            vec![m2, m1],
            2,
            None,
        );
        assert!(a.merges_with(&b));
    }

    #[test]
    fn test_different_modifier_sets_do_not_merge() {
        let item_id = Uuid::new_v4();
        let a = CartLine::derive(
            item_id,
            "Wrap".to_string(),
            dec!(100),
            vec![modifier(dec!(5))],
            1,
            None,
        );
        let b = CartLine::derive(item_id, "Wrap".to_string(), dec!(100), vec![], 1, None);
        assert!(!a.merges_with(&b));
    }

    #[test]
    fn test_merge_or_push_sums_quantities() {
        let item_id = Uuid::new_v4();
        let mut cart = Cart::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let a = CartLine::derive(item_id, "Wrap".to_string(), dec!(100), vec![], 2, None);
        let b = CartLine::derive(item_id, "Wrap".to_string(), dec!(100), vec![], 3, None);

        cart.merge_or_push(a);
        let merged = cart.merge_or_push(b);

        assert_eq!(merged, 5);
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.items[0].computed_total_price, dec!(500));
    }

    #[test]
    fn test_remove_line() {
        let mut cart = Cart::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let line = CartLine::derive(Uuid::new_v4(), "Idli".to_string(), dec!(40), vec![], 1, None);
        let line_id = line.id;
        cart.merge_or_push(line);

        assert!(cart.remove_line(line_id));
        assert!(!cart.remove_line(line_id));
        assert!(cart.is_empty());
    }
}

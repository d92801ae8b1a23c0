use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// One selectable option inside a modifier group, with its price delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierOption {
    pub option_id: Uuid,
    pub name: String,
    pub price_delta: Decimal,
}

/// A modifier group on a menu item (e.g. "size", "toppings").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifierGroup {
    pub modifier_id: Uuid,
    pub name: String,
    pub options: Vec<ModifierOption>,
}

/// Menu item as the ordering core sees it: the fields price re-validation
/// reads, nothing more. Full menu management lives upstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub restaurant_id: Uuid,
    pub name: String,
    pub category: String,
    pub base_price: Decimal,
    pub is_available: bool,
    pub modifiers: Vec<ModifierGroup>,
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    /// Find the live price delta for a (modifier, option) pair, if it exists.
    pub fn option_delta(&self, modifier_id: Uuid, option_id: Uuid) -> Option<Decimal> {
        self.modifiers
            .iter()
            .find(|group| group.modifier_id == modifier_id)?
            .options
            .iter()
            .find(|option| option.option_id == option_id)
            .map(|option| option.price_delta)
    }
}

/// Opening window for a single weekday.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DayHours {
    pub open: NaiveTime,
    pub close: NaiveTime,
    pub is_open: bool,
}

/// Weekly operating hours keyed by lowercase weekday name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatingHours(pub HashMap<String, DayHours>);

impl OperatingHours {
    /// The hours for a given calendar date, `None` if unconfigured.
    pub fn for_date(&self, date: NaiveDate) -> Option<&DayHours> {
        let weekday = match chrono::Datelike::weekday(&date) {
            chrono::Weekday::Mon => "monday",
            chrono::Weekday::Tue => "tuesday",
            chrono::Weekday::Wed => "wednesday",
            chrono::Weekday::Thu => "thursday",
            chrono::Weekday::Fri => "friday",
            chrono::Weekday::Sat => "saturday",
            chrono::Weekday::Sun => "sunday",
        };
        self.0.get(weekday)
    }
}

/// Restaurant-level configuration read by pricing and scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestaurantProfile {
    pub tenant_id: Uuid,
    pub restaurant_id: Uuid,
    pub tax_rate: Decimal,
    pub delivery_fee_threshold: Decimal,
    pub delivery_fee_amount: Decimal,
    pub operating_hours: OperatingHours,
}

/// Partial update for the menu fields this core owns re-validation of.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMenuItemRequest {
    pub base_price: Option<Decimal>,
    pub is_available: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_option_delta_lookup() {
        let modifier_id = Uuid::new_v4();
        let option_id = Uuid::new_v4();
        let item = MenuItem {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            restaurant_id: Uuid::new_v4(),
            name: "Paneer Wrap".to_string(),
            category: "wraps".to_string(),
            base_price: dec!(120),
            is_available: true,
            modifiers: vec![ModifierGroup {
                modifier_id,
                name: "extras".to_string(),
                options: vec![ModifierOption {
                    option_id,
                    name: "extra cheese".to_string(),
                    price_delta: dec!(25),
                }],
            }],
            updated_at: Utc::now(),
        };

        assert_eq!(item.option_delta(modifier_id, option_id), Some(dec!(25)));
        assert_eq!(item.option_delta(modifier_id, Uuid::new_v4()), None);
        assert_eq!(item.option_delta(Uuid::new_v4(), option_id), None);
    }

    #[test]
    fn test_operating_hours_for_date() {
        let mut hours = OperatingHours::default();
        hours.0.insert(
            "monday".to_string(),
            DayHours {
                open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(22, 0, 0).unwrap(),
                is_open: true,
            },
        );

        // 2026-01-05 is a Monday
        let monday = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2026, 1, 6).unwrap();
        assert!(hours.for_date(monday).is_some());
        assert!(hours.for_date(tuesday).is_none());
    }
}

// Validation utilities module
// Custom validation functions for domain-specific rules; field-level
// bounds (quantity 1..50, instructions <= 500 chars) live on the DTOs.

use validator::ValidationError;

/// Validates that a coupon code is uppercase alphanumeric (dashes allowed)
pub fn validate_coupon_code(code: &str) -> Result<(), ValidationError> {
    let well_formed = !code.is_empty()
        && code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-');
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_coupon_code"))
    }
}

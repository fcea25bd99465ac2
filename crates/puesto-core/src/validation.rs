//! # Validation Module
//!
//! Input checks run by the coordinator before anything is written.
//!
//! ## Where Validation Sits
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Counter screen input                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  THIS MODULE: shape of the input (empty name, zero qty, negative price) │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  state::check_sale / check_transfer: stock on hand                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Remote write                                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use puesto_core::validation::{validate_product_name, validate_transfer_quantity};
//!
//! validate_product_name("Chapata").unwrap();
//! assert!(validate_transfer_quantity(0).is_err());
//! ```

use std::collections::BTreeMap;

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_STOCK_LEVEL};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest product name accepted.
pub const MAX_NAME_LEN: usize = 120;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product or document id.
///
/// Ids become document keys, so `/` is rejected.
pub fn validate_product_id(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "product id".to_string(),
        });
    }

    if id.contains('/') {
        return Err(ValidationError::InvalidFormat {
            field: "product id".to_string(),
            reason: "must not contain '/'".to_string(),
        });
    }

    Ok(())
}

/// Validates a product name and returns it trimmed.
///
/// ```rust
/// use puesto_core::validation::validate_product_name;
///
/// assert_eq!(validate_product_name("  Chapata ").unwrap(), "Chapata");
/// assert!(validate_product_name("   ").is_err());
/// ```
pub fn validate_product_name(name: &str) -> ValidationResult<String> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: MAX_NAME_LEN,
        });
    }

    Ok(name.to_string())
}

/// Validates the public id of a hosted image.
pub fn validate_public_id(public_id: &str) -> ValidationResult<()> {
    if public_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "publicId".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a unit price in cents. Zero is allowed.
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if cents < 0 {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }
    Ok(())
}

/// Validates a sale quantity.
///
/// ## Rules
/// - Must not be zero
/// - Negative values are reversals (a line taken off an order)
/// - |qty| must not exceed MAX_ITEM_QUANTITY
///
/// ```text
/// sell(chapata, 3)   → validate_sale_quantity(3)   OK, stock −3
/// sell(chapata, -1)  → validate_sale_quantity(-1)  OK, stock +1
/// sell(chapata, 0)   → validate_sale_quantity(0)   NonZero
/// ```
pub fn validate_sale_quantity(qty: i64) -> ValidationResult<()> {
    if qty == 0 {
        return Err(ValidationError::NonZero {
            field: "quantity".to_string(),
        });
    }

    if qty.abs() > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: -MAX_ITEM_QUANTITY,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a transfer quantity: strictly positive, at most MAX_ITEM_QUANTITY.
pub fn validate_transfer_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates one location's initial stock: every quantity in
/// `0..=MAX_STOCK_LEVEL`.
pub fn validate_stock_levels(levels: &BTreeMap<String, i64>) -> ValidationResult<()> {
    for (product_id, qty) in levels {
        validate_product_id(product_id)?;
        if !(0..=MAX_STOCK_LEVEL).contains(qty) {
            return Err(ValidationError::OutOfRange {
                field: format!("stock of {}", product_id),
                min: 0,
                max: MAX_STOCK_LEVEL,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_product_id() {
        assert!(validate_product_id("chapata").is_ok());
        assert!(validate_product_id("").is_err());
        assert!(validate_product_id("a/b").is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert_eq!(validate_product_name(" Sándwich ").unwrap(), "Sándwich");
        assert!(validate_product_name("").is_err());
        assert!(validate_product_name(&"x".repeat(MAX_NAME_LEN + 1)).is_err());
    }

    #[test]
    fn test_validate_sale_quantity() {
        assert!(validate_sale_quantity(1).is_ok());
        assert!(validate_sale_quantity(-2).is_ok());
        assert!(validate_sale_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(matches!(
            validate_sale_quantity(0),
            Err(ValidationError::NonZero { .. })
        ));
        assert!(validate_sale_quantity(MAX_ITEM_QUANTITY + 1).is_err());
        assert!(validate_sale_quantity(-MAX_ITEM_QUANTITY - 1).is_err());
    }

    #[test]
    fn test_validate_transfer_quantity() {
        assert!(validate_transfer_quantity(2).is_ok());
        assert!(validate_transfer_quantity(0).is_err());
        assert!(validate_transfer_quantity(-1).is_err());
    }

    #[test]
    fn test_validate_price_and_stock() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());

        let mut levels = BTreeMap::new();
        levels.insert("chapata".to_string(), 10);
        assert!(validate_stock_levels(&levels).is_ok());
        levels.insert("sandwich".to_string(), -1);
        assert!(validate_stock_levels(&levels).is_err());

        let mut levels = BTreeMap::new();
        levels.insert("chapata".to_string(), MAX_STOCK_LEVEL);
        assert!(validate_stock_levels(&levels).is_ok());
        levels.insert("chapata".to_string(), i64::MAX);
        assert!(matches!(
            validate_stock_levels(&levels),
            Err(ValidationError::OutOfRange { max: MAX_STOCK_LEVEL, .. })
        ));
    }
}

//! # Error Types
//!
//! Domain-specific error types for puesto-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  puesto-core errors (this file)                                        │
//! │  ├── CoreError        - Stock and registry rule violations             │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  puesto-db errors                                                      │
//! │  └── DbError          - SQLite operation failures                      │
//! │                                                                         │
//! │  puesto-inventory errors                                               │
//! │  └── InventoryError   - Coordinator, store, media, config failures     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → InventoryError → caller           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::Location;

// =============================================================================
// Core Error
// =============================================================================

/// Core business rule violations.
///
/// Every variant is raised before any remote write happens, so a caller
/// receiving one of these knows nothing was persisted.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product id is not in the catalog.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Not enough units at the location to complete a sale or transfer.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 5 chapatas at Punto A
    ///      │
    ///      ▼
    /// Check mirror: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product_id: "chapata", location: A, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Screen shows: "Not enough Chapata at Punto A"
    /// ```
    #[error("Insufficient stock for {product_id} at Punto {location}: available {available}, requested {requested}")]
    InsufficientStock {
        product_id: String,
        location: Location,
        available: i64,
        requested: i64,
    },

    /// Transfer source and destination are the same location.
    #[error("Cannot transfer from Punto {0} to itself")]
    SameLocation(Location),

    /// The operation needs the device's current location and none is set.
    #[error("No sale location selected")]
    LocationNotSet,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be zero.
    #[error("{field} must not be zero")]
    NonZero { field: String },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            product_id: "chapata".to_string(),
            location: Location::A,
            available: 3,
            requested: 5,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for chapata at Punto A: available 3, requested 5"
        );

        assert_eq!(
            CoreError::SameLocation(Location::B).to_string(),
            "Cannot transfer from Punto B to itself"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "name".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}

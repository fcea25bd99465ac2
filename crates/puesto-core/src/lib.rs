//! # puesto-core: Pure Business Logic for Puesto POS
//!
//! This crate holds the rules of the stall: what a product is, how stock is
//! kept per location, how sales and transfers are recorded, and how a day's
//! registry is closed. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Puesto POS Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              puesto-inventory (InventoryCoordinator)            │   │
//! │  │    sell, transfer, open/finalize registry, product CRUD         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ puesto-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  ledger   │  │ reconcile │  │   │
//! │  │   │  Product  │  │   Money   │  │ aggregate │  │  events → │  │   │
//! │  │   │  Stock    │  │           │  │  revenue  │  │   state   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Location, Product, StockLevels, DailyRegistry, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation rules
//! - [`ledger`] - Sale/transfer aggregation and registry closing
//! - [`state`] - The coordinator's in-memory state and pure reconciliation
//! - [`report`] - Weekly/monthly report filtering
//!
//! ## Example Usage
//!
//! ```rust
//! use puesto_core::{Location, StockLevels};
//!
//! let mut stock = StockLevels::default();
//! stock.set(Location::A, "chapata", 5);
//!
//! assert_eq!(stock.get(Location::A, "chapata"), 5);
//! assert_eq!(stock.get(Location::B, "chapata"), 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod money;
pub mod report;
pub mod state;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use report::{ReportPeriod, ReportSummary};
pub use state::{apply_event, reconcile, InventoryEvent, InventoryState};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity accepted by a single sale or transfer.
///
/// ## Business Reason
/// Catches typos at the counter (typing 300 instead of 3).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Largest stock level accepted when initializing a location.
pub const MAX_STOCK_LEVEL: i64 = 1_000_000;

/// Returns the catalog a fresh device starts with before the remote catalog
/// has been received.
pub fn default_catalog() -> Vec<Product> {
    vec![
        Product {
            id: "chapata".to_string(),
            name: "Chapata".to_string(),
            price_cents: 3500,
            image: Some(ProductImage::Asset {
                name: "chapata".to_string(),
            }),
            created_at: None,
        },
        Product {
            id: "sandwich".to_string(),
            name: "Sándwich".to_string(),
            price_cents: 4200,
            image: Some(ProductImage::Asset {
                name: "sandwich".to_string(),
            }),
            created_at: None,
        },
    ]
}

//! # Inventory State
//!
//! The coordinator's in-memory mirror and the single pure function that
//! folds remote snapshots into it.
//!
//! ## Reconciliation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Remote change (stocks/A, stocks/B, estadoVenta/actual, productos)     │
//! │       │                                                                 │
//! │       ▼  decoded by the subscription task                              │
//! │  InventoryEvent                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  reconcile(state, event) ──► new InventoryState                        │
//! │                                                                         │
//! │  Each event overwrites one slice of state. Last write wins.            │
//! │  Nothing here performs I/O.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Commit Sequences
//! ```text
//! stock write committed as seq N ──► StockDelta/StockMerge { version: N }
//!                                     applied only if N > stock version
//! echo of stocks/{loc} at seq M   ──► StockSnapshot { version: Some(M) }
//!                                     applied only if M >= stock version
//! estadoVenta echo at seq M       ──► skipped while M < sale_state_version
//! ```
//! A device folds its own stock writes in right away; the echo later
//! replaces the whole location, and echoes older than a folded write are
//! dropped so the mirror never moves back in time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{DailyRegistry, Location, Product, SaleLine, SaleState, StockLevels, TransferLine};
use crate::validation::{validate_sale_quantity, validate_transfer_quantity};

// =============================================================================
// State
// =============================================================================

/// Everything the counter screens read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryState {
    /// Catalog mirror. Only catalog snapshots replace it.
    pub products: Vec<Product>,

    /// Stock mirror for both locations. May be stale.
    pub stock: StockLevels,

    /// This device's sale point, once chosen.
    pub location: Option<Location>,

    /// Sales recorded by this device since the registry was opened.
    pub sales: Vec<SaleLine>,

    /// Transfers recorded by this device since the registry was opened.
    pub transfers: Vec<TransferLine>,

    pub registry_open: bool,

    pub active_registry: Option<DailyRegistry>,

    /// Newest commit sequence reflected in each location's stock.
    #[serde(default)]
    pub stock_versions: BTreeMap<Location, u64>,

    /// Sale-state snapshots committed before this sequence are stale.
    #[serde(default)]
    pub sale_state_version: u64,
}

impl Default for InventoryState {
    fn default() -> Self {
        InventoryState {
            products: crate::default_catalog(),
            stock: StockLevels::default(),
            location: None,
            sales: Vec::new(),
            transfers: Vec::new(),
            registry_open: false,
            active_registry: None,
            stock_versions: BTreeMap::new(),
            sale_state_version: 0,
        }
    }
}

impl InventoryState {
    /// Units on hand according to the mirror.
    pub fn available(&self, location: Location, product_id: &str) -> i64 {
        self.stock.get(location, product_id)
    }

    pub fn product(&self, product_id: &str) -> Option<&Product> {
        self.products.iter().find(|p| p.id == product_id)
    }

    /// Display name for notices, falling back to the id.
    pub fn product_name<'a>(&'a self, product_id: &'a str) -> &'a str {
        self.product(product_id)
            .map(|p| p.name.as_str())
            .unwrap_or(product_id)
    }

    /// Forgets the day's ledgers and the active registry.
    pub fn clear_registry(&mut self) {
        self.sales.clear();
        self.transfers.clear();
        self.active_registry = None;
        self.registry_open = false;
    }

    pub fn stock_version(&self, location: Location) -> u64 {
        self.stock_versions.get(&location).copied().unwrap_or(0)
    }

    /// Records that this device wrote the sale state at `version`.
    pub fn note_sale_state_write(&mut self, version: u64) {
        self.sale_state_version = self.sale_state_version.max(version);
    }

    /// Drops every sale-state snapshot committed at or before `version`.
    pub fn skip_sale_states_through(&mut self, version: u64) {
        self.sale_state_version = self.sale_state_version.max(version.saturating_add(1));
    }
}

// =============================================================================
// Events
// =============================================================================

/// A decoded remote snapshot, or one of this device's committed writes.
///
/// `version` is the commit sequence of the change. Snapshots read directly
/// from the store (startup, resync) carry `None` and always apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// Full contents of `stocks/{location}`.
    StockSnapshot {
        location: Location,
        levels: BTreeMap<String, i64>,
        version: Option<u64>,
    },

    /// This device's committed `stocks/{location}.{product} += delta`.
    StockDelta {
        location: Location,
        product_id: String,
        delta: i64,
        version: u64,
    },

    /// This device's committed merge of levels into `stocks/{location}`.
    StockMerge {
        location: Location,
        levels: BTreeMap<String, i64>,
        version: u64,
    },

    /// Contents of `estadoVenta/actual`.
    SaleStateSnapshot {
        sale_state: SaleState,
        version: Option<u64>,
    },

    /// The whole `productos` collection.
    CatalogSnapshot(Vec<Product>),
}

/// Folds one event into the state.
///
/// The sale-state snapshot always sets `registry_open` but only replaces the
/// active registry when the document carries one; a closed day
/// (`registro: null`) leaves the local registry for `reset` to clear.
pub fn reconcile(mut state: InventoryState, event: InventoryEvent) -> InventoryState {
    apply_event(&mut state, event);
    state
}

/// In-place form of [`reconcile`], used with `watch::Sender::send_modify`.
pub fn apply_event(state: &mut InventoryState, event: InventoryEvent) {
    match event {
        InventoryEvent::StockSnapshot {
            location,
            levels,
            version,
        } => {
            if let Some(version) = version {
                if version < state.stock_version(location) {
                    return;
                }
                state.stock_versions.insert(location, version);
            }
            state.stock.replace(location, levels);
        }
        InventoryEvent::StockDelta {
            location,
            product_id,
            delta,
            version,
        } => {
            // An echo at or past this write already carries it.
            if version <= state.stock_version(location) {
                return;
            }
            let current = state.stock.get(location, &product_id);
            state
                .stock
                .set(location, product_id, current.saturating_add(delta));
            state.stock_versions.insert(location, version);
        }
        InventoryEvent::StockMerge {
            location,
            levels,
            version,
        } => {
            if version <= state.stock_version(location) {
                return;
            }
            state.stock.for_location_mut(location).extend(levels);
            state.stock_versions.insert(location, version);
        }
        InventoryEvent::SaleStateSnapshot {
            sale_state,
            version,
        } => {
            if let Some(version) = version {
                if version < state.sale_state_version {
                    return;
                }
                state.sale_state_version = version;
            }
            state.registry_open = sale_state.sale_started;
            if let Some(registry) = sale_state.registry {
                state.active_registry = Some(registry);
            }
        }
        InventoryEvent::CatalogSnapshot(products) => {
            state.products = products;
        }
    }
}

// =============================================================================
// Pre-write Checks
// =============================================================================

/// Checks a sale against the mirror. Negative quantities are reversals and
/// skip the stock check.
pub fn check_sale(
    state: &InventoryState,
    product_id: &str,
    qty: i64,
    location: Location,
) -> CoreResult<()> {
    validate_sale_quantity(qty)?;

    let available = state.available(location, product_id);
    if qty > available {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            location,
            available,
            requested: qty,
        });
    }
    Ok(())
}

/// Checks a transfer against the mirror.
pub fn check_transfer(
    state: &InventoryState,
    product_id: &str,
    qty: i64,
    from: Location,
    to: Location,
) -> CoreResult<()> {
    if from == to {
        return Err(CoreError::SameLocation(from));
    }
    validate_transfer_quantity(qty)?;

    let available = state.available(from, product_id);
    if qty > available {
        return Err(CoreError::InsufficientStock {
            product_id: product_id.to_string(),
            location: from,
            available,
            requested: qty,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

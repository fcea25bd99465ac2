//! # Domain Types
//!
//! Core domain types used throughout Puesto POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │  StockLevels    │   │ DailyRegistry   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  A: id → qty    │   │  date           │       │
//! │  │  name           │   │  B: id → qty    │   │  total          │       │
//! │  │  price_cents    │   └─────────────────┘   │  final_stock    │       │
//! │  │  image          │                         │  sales          │       │
//! │  └─────────────────┘   ┌─────────────────┐   │  transfers      │       │
//! │                        │ SaleLine        │   │  active         │       │
//! │  ┌─────────────────┐   │ TransferLine    │   └─────────────────┘       │
//! │  │   Location      │   │  (in-memory     │                              │
//! │  │   A | B         │   │   ledgers)      │   SaleState / ReportRecord   │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Names
//! Documents shared with the other devices use the established Spanish keys
//! (`fecha`, `totalVenta`, `inventarioFinal`, ...). The Rust side uses
//! English field names and serde renames bridge the two.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;

// =============================================================================
// Document Names
// =============================================================================

/// Collection and document names shared by every device.
pub mod collections {
    /// `stocks/A`, `stocks/B`: product id → units.
    pub const STOCKS: &str = "stocks";
    /// `estadoVenta/actual`: whether the day is open and its registry.
    pub const SALE_STATE: &str = "estadoVenta";
    pub const SALE_STATE_DOC: &str = "actual";
    /// `productos/*`: the catalog.
    pub const PRODUCTS: &str = "productos";
    /// `registros/*`: closed registries, append-only.
    pub const REPORTS: &str = "registros";
}

// =============================================================================
// Location
// =============================================================================

/// One of the two sale points of the stall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Location {
    A,
    B,
}

impl Location {
    /// Both locations, in display order.
    pub const ALL: [Location; 2] = [Location::A, Location::B];

    /// The other sale point.
    pub const fn other(self) -> Location {
        match self {
            Location::A => Location::B,
            Location::B => Location::A,
        }
    }

    /// Document id of this location's stock document.
    pub const fn as_str(self) -> &'static str {
        match self {
            Location::A => "A",
            Location::B => "B",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Location::A),
            "B" | "b" => Ok(Location::B),
            other => Err(ValidationError::InvalidFormat {
                field: "location".to_string(),
                reason: format!("expected A or B, got '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// Where a product's picture comes from.
///
/// ```text
/// {"type": "asset",  "name": "chapata"}                         bundled
/// {"type": "hosted", "url": "https://...", "publicId": "abc"}   media host
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProductImage {
    /// Image bundled with the app, looked up by name.
    Asset { name: String },

    /// Image on the media host. `public_id` is needed to delete it later.
    #[serde(rename_all = "camelCase")]
    Hosted {
        url: String,
        #[serde(default)]
        public_id: Option<String>,
    },
}

impl ProductImage {
    /// Opaque id used to delete the hosted image, if any.
    pub fn public_id(&self) -> Option<&str> {
        match self {
            ProductImage::Hosted {
                public_id: Some(id),
                ..
            } => Some(id.as_str()),
            _ => None,
        }
    }
}

/// A product on the catalog.
///
/// The remote document body is `{name, priceCents, image, createdAt}`; the
/// id is the document key and is filled in when the document is decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default, skip_serializing)]
    pub id: String,

    /// Display name shown at the counter.
    pub name: String,

    /// Unit price in cents.
    #[serde(default)]
    pub price_cents: i64,

    #[serde(default)]
    pub image: Option<ProductImage>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Unit price as Money.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price_cents: i64,
    pub image: Option<ProductImage>,
}

/// Partial update of a product. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_cents: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ProductImage>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.price_cents.is_none() && self.image.is_none()
    }
}

// =============================================================================
// Stock
// =============================================================================

/// Units on hand per location, keyed by product id.
///
/// A product missing from a map has zero units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevels {
    #[serde(rename = "A", default)]
    pub a: BTreeMap<String, i64>,

    #[serde(rename = "B", default)]
    pub b: BTreeMap<String, i64>,
}

impl StockLevels {
    /// Units of `product_id` at `location`.
    pub fn get(&self, location: Location, product_id: &str) -> i64 {
        self.for_location(location)
            .get(product_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn set(&mut self, location: Location, product_id: impl Into<String>, qty: i64) {
        self.for_location_mut(location).insert(product_id.into(), qty);
    }

    pub fn for_location(&self, location: Location) -> &BTreeMap<String, i64> {
        match location {
            Location::A => &self.a,
            Location::B => &self.b,
        }
    }

    pub fn for_location_mut(&mut self, location: Location) -> &mut BTreeMap<String, i64> {
        match location {
            Location::A => &mut self.a,
            Location::B => &mut self.b,
        }
    }

    /// Replaces a whole location, as a stock document snapshot does.
    pub fn replace(&mut self, location: Location, levels: BTreeMap<String, i64>) {
        *self.for_location_mut(location) = levels;
    }

    /// Sum of all units at one location.
    pub fn total(&self, location: Location) -> i64 {
        self.for_location(location).values().sum()
    }

    /// Sum of all units at both locations.
    pub fn grand_total(&self) -> i64 {
        Location::ALL.iter().map(|loc| self.total(*loc)).sum()
    }
}

// =============================================================================
// Ledger Lines
// =============================================================================

/// One sale recorded while the registry is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLine {
    #[serde(rename = "point")]
    pub location: Location,
    pub product: String,
    pub qty: i64,
    /// Epoch milliseconds.
    pub ts: i64,
}

/// One movement of units between the two locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub from: Location,
    pub to: Location,
    pub product: String,
    pub qty: i64,
    /// Epoch milliseconds.
    pub ts: i64,
}

/// Quantities grouped by location then product id.
///
/// Serializes as `{"A": {"chapata": 3}, "B": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductTotals(pub BTreeMap<Location, BTreeMap<String, i64>>);

impl ProductTotals {
    pub fn add(&mut self, location: Location, product_id: &str, qty: i64) {
        *self
            .0
            .entry(location)
            .or_default()
            .entry(product_id.to_string())
            .or_insert(0) += qty;
    }

    pub fn get(&self, location: Location, product_id: &str) -> i64 {
        self.0
            .get(&location)
            .and_then(|m| m.get(product_id))
            .copied()
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Location, &str, i64)> {
        self.0.iter().flat_map(|(loc, products)| {
            products.iter().map(move |(id, qty)| (*loc, id.as_str(), *qty))
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

/// The day's sale session.
///
/// ## Lifecycle
/// ```text
/// open_registry()                       finalize_registry()
///      │                                       │
///      ▼                                       ▼
/// { date, total: 0, active: true }  ──►  { sales, transfers, final_stock,
///   mirrored at estadoVenta/actual        total, created_at, active: false }
///                                          appended to `registros`
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyRegistry {
    #[serde(rename = "fecha")]
    pub date: NaiveDate,

    #[serde(rename = "totalVenta", default)]
    pub total: Money,

    #[serde(rename = "inventarioFinal", default)]
    pub final_stock: StockLevels,

    #[serde(rename = "ventas", default)]
    pub sales: ProductTotals,

    #[serde(rename = "traspasos", default)]
    pub transfers: Vec<TransferLine>,

    /// Always written false; nothing consumes it yet.
    #[serde(rename = "sincronizado", default)]
    pub synchronized: bool,

    #[serde(rename = "activa", default)]
    pub active: bool,

    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl DailyRegistry {
    /// A fresh registry for `date` with zero aggregates.
    pub fn open(date: NaiveDate) -> Self {
        DailyRegistry {
            date,
            total: Money::zero(),
            final_stock: StockLevels::default(),
            sales: ProductTotals::default(),
            transfers: Vec::new(),
            synchronized: false,
            active: true,
            created_at: None,
        }
    }
}

/// Body of the `estadoVenta/actual` document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    #[serde(rename = "ventaIniciada", default)]
    pub sale_started: bool,

    #[serde(rename = "registro", default)]
    pub registry: Option<DailyRegistry>,
}

/// A closed registry as stored in `registros`, keyed by the store id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,

    #[serde(flatten)]
    pub registry: DailyRegistry,
}

// =============================================================================
// Unit Tests
// =============================================================================

//! # Document Codec
//!
//! Conversions between remote document bodies and core types.
//!
//! ```text
//! stocks/A             {"chapata": 5, "sandwich": 2}     ──► BTreeMap<String, i64>
//! estadoVenta/actual   {"ventaIniciada": .., "registro"} ──► SaleState
//! productos/{id}       {"name", "priceCents", "image"}   ──► Product (id from key)
//! registros/{id}       {"fecha", "totalVenta", ...}      ──► ReportRecord
//! ```
//!
//! Older product documents carry `price` in pesos instead of `priceCents`;
//! they are read as `round(price * 100)`.

use std::collections::BTreeMap;

use puesto_core::{validation, Product, ReportRecord, SaleState};
use puesto_db::Body;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InventoryError, InventoryResult};

/// Serializes a value that must encode as a JSON object.
pub fn to_body<T: Serialize>(value: &T) -> InventoryResult<Body> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(InventoryError::Codec(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn from_body<T: for<'de> Deserialize<'de>>(body: &Body) -> InventoryResult<T> {
    Ok(serde_json::from_value(Value::Object(body.clone()))?)
}

/// Reads a stock document. Every value must be a non-negative integer.
pub fn decode_stock(path: &str, body: &Body) -> InventoryResult<BTreeMap<String, i64>> {
    let mut levels = BTreeMap::new();
    for (product_id, value) in body {
        let qty = value.as_i64().ok_or_else(|| {
            InventoryError::Codec(format!("{}: '{}' is not an integer", path, product_id))
        })?;
        levels.insert(product_id.clone(), qty);
    }
    validation::validate_stock_levels(&levels)
        .map_err(|e| InventoryError::Codec(format!("{}: {}", path, e)))?;
    Ok(levels)
}

/// Body of a stock document for `set_initial_stock`.
pub fn encode_stock(levels: &BTreeMap<String, i64>) -> Body {
    levels
        .iter()
        .map(|(id, qty)| (id.clone(), Value::from(*qty)))
        .collect()
}

pub fn decode_sale_state(body: &Body) -> InventoryResult<SaleState> {
    from_body(body)
}

/// Reads a product document; `id` is the document key.
pub fn decode_product(id: &str, body: &Body) -> InventoryResult<Product> {
    let mut body = body.clone();

    if !body.contains_key("priceCents") {
        if let Some(pesos) = body.get("price").and_then(Value::as_f64) {
            let cents = (pesos * 100.0).round() as i64;
            body.insert("priceCents".to_string(), Value::from(cents));
        }
    }

    let mut product: Product = serde_json::from_value(Value::Object(body))
        .map_err(|e| InventoryError::Codec(format!("productos/{}: {}", id, e)))?;
    product.id = id.to_string();
    Ok(product)
}

pub fn decode_report(id: &str, body: &Body) -> InventoryResult<ReportRecord> {
    let registry = serde_json::from_value(Value::Object(body.clone()))
        .map_err(|e| InventoryError::Codec(format!("registros/{}: {}", id, e)))?;
    Ok(ReportRecord {
        id: id.to_string(),
        registry,
    })
}

// =============================================================================
// Catalog cache entry
// =============================================================================

/// Catalog as kept under the `products` cache key. Unlike the remote body,
/// the id travels with each entry.
#[derive(Serialize, Deserialize)]
struct CachedProduct {
    id: String,
    #[serde(flatten)]
    product: Product,
}

pub fn encode_catalog(products: &[Product]) -> InventoryResult<String> {
    let entries: Vec<CachedProduct> = products
        .iter()
        .map(|p| CachedProduct {
            id: p.id.clone(),
            product: p.clone(),
        })
        .collect();
    Ok(serde_json::to_string(&entries)?)
}

pub fn decode_catalog(raw: &str) -> InventoryResult<Vec<Product>> {
    let entries: Vec<CachedProduct> = serde_json::from_str(raw)?;
    Ok(entries
        .into_iter()
        .map(|entry| Product {
            id: entry.id,
            ..entry.product
        })
        .collect())
}

//! # Ledger Module
//!
//! Turns the in-memory sale and transfer ledgers into the aggregates stored
//! on a closed registry.
//!
//! ## Closing Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales: [SaleLine]        ──► aggregate_sales    ──► ventas            │
//! │  sales + catalog prices   ──► total_revenue      ──► totalVenta        │
//! │  transfers: [TransferLine] ────────────────────────► traspasos          │
//! │  stock mirror             ────────────────────────► inventarioFinal    │
//! │                                                                         │
//! │  close_registry() assembles all of the above into one DailyRegistry    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Revenue uses the catalog price at the moment of closing, not the price
//! that was current when each line was sold.

use chrono::{DateTime, Utc};

use crate::money::Money;
use crate::types::{DailyRegistry, Product, ProductTotals, SaleLine, StockLevels, TransferLine};

/// Sums sale quantities per location and product.
pub fn aggregate_sales(sales: &[SaleLine]) -> ProductTotals {
    let mut totals = ProductTotals::default();
    for line in sales {
        totals.add(line.location, &line.product, line.qty);
    }
    totals
}

/// Sums transferred quantities per source location and product.
pub fn aggregate_transfers(transfers: &[TransferLine]) -> ProductTotals {
    let mut totals = ProductTotals::default();
    for line in transfers {
        totals.add(line.from, &line.product, line.qty);
    }
    totals
}

/// Σ(qty × current catalog price). Products no longer in the catalog count
/// at zero.
pub fn total_revenue(sales: &[SaleLine], catalog: &[Product]) -> Money {
    sales
        .iter()
        .map(|line| {
            catalog
                .iter()
                .find(|p| p.id == line.product)
                .map(|p| p.price().multiply_quantity(line.qty))
                .unwrap_or_default()
        })
        .sum()
}

/// Builds the record written to `registros` when the day is closed.
///
/// `base` is the active registry (its date is kept); when there is none a
/// registry dated `now` is used.
pub fn close_registry(
    base: Option<&DailyRegistry>,
    sales: &[SaleLine],
    transfers: &[TransferLine],
    stock: &StockLevels,
    catalog: &[Product],
    now: DateTime<Utc>,
) -> DailyRegistry {
    let mut registry = base
        .cloned()
        .unwrap_or_else(|| DailyRegistry::open(now.date_naive()));

    registry.sales = aggregate_sales(sales);
    registry.transfers = transfers.to_vec();
    registry.final_stock = stock.clone();
    registry.total = total_revenue(sales, catalog);
    registry.created_at = Some(now);
    registry.synchronized = false;
    registry.active = false;
    registry
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Location;
    use chrono::{NaiveDate, TimeZone};

    fn product(id: &str, cents: i64) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_string(),
            price_cents: cents,
            image: None,
            created_at: None,
        }
    }

    fn sale(location: Location, product: &str, qty: i64) -> SaleLine {
        SaleLine {
            location,
            product: product.to_string(),
            qty,
            ts: 0,
        }
    }

    #[test]
    fn test_aggregate_sales_groups_by_location() {
        let sales = vec![
            sale(Location::A, "chapata", 2),
            sale(Location::A, "chapata", 1),
            sale(Location::B, "chapata", 4),
            sale(Location::A, "sandwich", -1),
        ];
        let totals = aggregate_sales(&sales);
        assert_eq!(totals.get(Location::A, "chapata"), 3);
        assert_eq!(totals.get(Location::B, "chapata"), 4);
        assert_eq!(totals.get(Location::A, "sandwich"), -1);
    }

    #[test]
    fn test_aggregate_transfers_by_source() {
        let transfers = vec![
            TransferLine {
                from: Location::A,
                to: Location::B,
                product: "chapata".into(),
                qty: 2,
                ts: 1,
            },
            TransferLine {
                from: Location::B,
                to: Location::A,
                product: "chapata".into(),
                qty: 1,
                ts: 2,
            },
        ];
        let totals = aggregate_transfers(&transfers);
        assert_eq!(totals.get(Location::A, "chapata"), 2);
        assert_eq!(totals.get(Location::B, "chapata"), 1);
    }

    #[test]
    fn test_revenue_uses_catalog_price() {
        let catalog = vec![product("chapata", 3500), product("sandwich", 4200)];
        let sales = vec![
            sale(Location::A, "chapata", 3),
            sale(Location::B, "sandwich", 2),
            sale(Location::B, "retired", 10),
        ];
        assert_eq!(total_revenue(&sales, &catalog).cents(), 3 * 3500 + 2 * 4200);
    }

    #[test]
    fn test_close_empty_registry() {
        let date = NaiveDate::from_ymd_opt(2026, 5, 4).unwrap();
        let open = DailyRegistry::open(date);
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 22, 0, 0).unwrap();

        let closed = close_registry(Some(&open), &[], &[], &StockLevels::default(), &[], now);
        assert_eq!(closed.date, date);
        assert!(closed.total.is_zero());
        assert!(closed.sales.is_empty());
        assert!(closed.transfers.is_empty());
        assert!(!closed.active);
        assert_eq!(closed.created_at, Some(now));
    }

    #[test]
    fn test_close_without_open_registry_uses_today() {
        let now = Utc.with_ymd_and_hms(2026, 5, 6, 9, 30, 0).unwrap();
        let mut stock = StockLevels::default();
        stock.set(Location::A, "chapata", 1);

        let closed = close_registry(
            None,
            &[sale(Location::A, "chapata", 1)],
            &[],
            &stock,
            &[product("chapata", 3500)],
            now,
        );
        assert_eq!(closed.date, now.date_naive());
        assert_eq!(closed.total.cents(), 3500);
        assert_eq!(closed.final_stock, stock);
    }
}

//! # Seed Data Generator
//!
//! Writes the starting documents a fresh stall needs.
//!
//! ## Usage
//! ```bash
//! # Default catalog, zero stock, ./puesto_dev.db
//! cargo run -p puesto-db --bin seed
//!
//! # Start both locations with 20 units of every product
//! cargo run -p puesto-db --bin seed -- --stock 20
//!
//! # Specify database path
//! cargo run -p puesto-db --bin seed -- --db ./data/puesto.db
//! ```
//!
//! ## Seeded Documents
//! - `productos/chapata`, `productos/sandwich`
//! - `stocks/A`, `stocks/B` with every product at `--stock` units
//! - `estadoVenta/actual` = `{ventaIniciada: false, registro: null}`

use std::env;

use chrono::Utc;
use puesto_core::{collections, default_catalog, Location, SaleState};
use puesto_db::{Body, Database, DbConfig, DocumentOp, DocumentWrite};
use serde_json::Value;

fn to_body<T: serde::Serialize>(value: &T) -> Result<Body, Box<dyn std::error::Error>> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {}", other).into()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut stock: i64 = 0;
    let mut db_path = String::from("./puesto_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--stock" | "-s" => {
                if i + 1 < args.len() {
                    stock = args[i + 1].parse().unwrap_or(0);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Puesto POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -s, --stock <N>    Starting units per product and location (default: 0)");
                println!("  -d, --db <PATH>    Database file path (default: ./puesto_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Puesto POS Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!("Stock:    {} per product and location", stock);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.documents().count(collections::PRODUCTS).await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid overwriting live stock.");
        return Ok(());
    }

    let catalog = default_catalog();
    let mut writes = Vec::new();

    for product in &catalog {
        let mut product = product.clone();
        product.created_at = Some(Utc::now());
        writes.push(DocumentWrite::new(
            collections::PRODUCTS,
            product.id.clone(),
            DocumentOp::Set {
                body: to_body(&product)?,
                merge: false,
            },
        ));
    }

    for location in Location::ALL {
        let levels: Body = catalog
            .iter()
            .map(|p| (p.id.clone(), Value::from(stock)))
            .collect();
        writes.push(DocumentWrite::new(
            collections::STOCKS,
            location.as_str(),
            DocumentOp::Set {
                body: levels,
                merge: false,
            },
        ));
    }

    writes.push(DocumentWrite::new(
        collections::SALE_STATE,
        collections::SALE_STATE_DOC,
        DocumentOp::Set {
            body: to_body(&SaleState::default())?,
            merge: false,
        },
    ));

    let applied = db.documents().apply(&writes).await?;

    println!();
    println!("✓ Wrote {} documents", applied.len());
    for product in &catalog {
        println!("  {:<10} {:<10} {}", product.id, product.name, product.price());
    }

    db.close().await;
    Ok(())
}

//! # puesto-inventory: Shared Inventory for a Two-Point Stall
//!
//! Keeps the stock of two sale points (`A` and `B`), the day's sales and
//! transfers, and the catalog consistent across every device through a
//! shared document store.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Inventory Architecture                             │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │               InventoryCoordinator (state owner)                 │  │
//! │  │                                                                  │  │
//! │  │  sell / transfer / open & finalize registry / product CRUD      │  │
//! │  │  watch::Sender<InventoryState>   broadcast::Sender<Notice>      │  │
//! │  └───────────────┬───────────────────────────────┬──────────────────┘  │
//! │                  │ writes                        │ restore / backup    │
//! │                  ▼                               ▼                     │
//! │  ┌────────────────────────────┐    ┌─────────────────────────────┐     │
//! │  │ DocumentStore              │    │ LocalCache                  │     │
//! │  │  MemoryDocumentStore       │    │  SqliteCache / MemoryCache  │     │
//! │  │  SqliteDocumentStore       │    │  point, ventaIniciada,      │     │
//! │  │  change fan-out ──────┐    │    │  registroActual, products   │     │
//! │  └───────────────────────┼────┘    └─────────────────────────────┘     │
//! │                          ▼                                              │
//! │  ┌────────────────────────────┐    ┌─────────────────────────────┐     │
//! │  │ SubscriptionTask           │    │ ReportFeed                  │     │
//! │  │  decode ──► reconcile      │    │  registros, weekly/monthly  │     │
//! │  └────────────────────────────┘    └─────────────────────────────┘     │
//! │                                                                         │
//! │  ┌────────────────────────────┐    ┌─────────────────────────────┐     │
//! │  │ CatalogManager             │───►│ ImageUploader/ImageDestroyer│     │
//! │  │  create / edit / delete    │    │  CloudinaryClient           │     │
//! │  └────────────────────────────┘    │  DeleteEndpointClient       │     │
//! │                                    └─────────────────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`coordinator`] - `InventoryCoordinator`, the only writer of shared state
//! - [`store`] - `DocumentStore` trait, in-memory and SQLite stores
//! - [`cache`] - `LocalCache` trait and the offline snapshot keys
//! - [`codec`] - document bodies to domain types and back
//! - [`catalog`] - product screen operations with image lifecycle
//! - [`reports`] - live feed of closed registries
//! - [`media`] - media host clients
//! - [`notice`] - alerts for the counter screen
//! - [`config`] - TOML device configuration
//! - [`error`] - `InventoryError`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use puesto_db::{Database, DbConfig};
//! use puesto_inventory::{
//!     CoordinatorOptions, InventoryConfig, InventoryCoordinator, SqliteCache,
//!     SqliteDocumentStore,
//! };
//!
//! let config = InventoryConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(config.database_path())).await?;
//!
//! let coordinator = InventoryCoordinator::start(
//!     Arc::new(SqliteDocumentStore::new(db.clone())),
//!     Arc::new(SqliteCache::new(db)),
//!     CoordinatorOptions::from_config(&config),
//! )
//! .await;
//!
//! coordinator.open_registry().await?;
//! coordinator.sell_here("chapata", 2).await?;
//! let record = coordinator.finalize_registry().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cache;
pub mod catalog;
pub mod codec;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod media;
pub mod notice;
pub mod reports;
pub mod store;

mod subscription;

// =============================================================================
// Re-exports
// =============================================================================

pub use cache::{LocalCache, MemoryCache, SqliteCache};
pub use catalog::{CatalogManager, ImageChoice, ProductForm};
pub use config::InventoryConfig;
pub use coordinator::{CoordinatorOptions, InventoryCoordinator};
pub use error::{InventoryError, InventoryResult};
pub use media::{
    CloudinaryClient, DeleteEndpointClient, ImageDestroyer, ImageSource, ImageUploader,
    SigningCredentials, UploadedImage,
};
pub use notice::Notice;
pub use reports::ReportFeed;
pub use store::{DocumentStore, MemoryDocumentStore, SqliteDocumentStore, StoreChange};

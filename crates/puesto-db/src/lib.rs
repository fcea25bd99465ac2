//! # puesto-db: Database Layer for Puesto POS
//!
//! SQLite persistence behind the document store and the local cache.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Puesto POS Data Flow                             │
//! │                                                                         │
//! │  InventoryCoordinator                                                  │
//! │       │  DocumentStore / LocalCache traits                             │
//! │       ▼                                                                 │
//! │  SqliteDocumentStore, SqliteCache (puesto-inventory)                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    puesto-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌──────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │   │   Repositories   │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │◄──│ DocumentRepo     │   │  (embedded)  │  │   │
//! │  │   │  SqlitePool   │   │ CacheRepo        │   │ 001_init.sql │  │   │
//! │  │   └───────────────┘   └──────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  puesto.db (platform data dir)                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Document and cache repositories
//!
//! ## Usage
//!
//! ```rust,ignore
//! use puesto_db::{Database, DbConfig, DocumentOp, DocumentWrite};
//!
//! let db = Database::new(DbConfig::new("puesto.db")).await?;
//! db.documents()
//!     .apply(&[DocumentWrite::new(
//!         "stocks",
//!         "A",
//!         DocumentOp::Increment { field: "chapata".into(), delta: -1 },
//!     )])
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cache::CacheRepository;
pub use repository::document::{
    apply_op, AppliedWrite, Body, DocumentOp, DocumentRepository, DocumentWrite, StoredDocument,
};

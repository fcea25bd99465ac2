//! # Document Store
//!
//! The remote system of record, seen through one trait.
//!
//! ## Store Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        DocumentStore                                    │
//! │                                                                         │
//! │  get(collection, id)     ──► Option<Body>                              │
//! │  list(collection)        ──► Vec<Document>  (oldest first)             │
//! │  add(collection, body)   ──► generated id                              │
//! │  commit(writes)          ──► all or nothing, returns commit sequence   │
//! │  subscribe()             ──► broadcast::Receiver<StoreChange>          │
//! │                                                                         │
//! │  Every committed write is fanned out to ALL subscribers, including     │
//! │  the device that made it, tagged with its commit sequence. Changes     │
//! │  are published in sequence order before commit returns, so a writer   │
//! │  can fold its own write into its mirror and skip older echoes.         │
//! │                                                                         │
//! │  Implementations:                                                      │
//! │  • MemoryDocumentStore  in-process, can be switched offline            │
//! │  • SqliteDocumentStore  JSON rows through puesto-db                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use puesto_db::{Body, DocumentOp, DocumentWrite};
use tokio::sync::broadcast;

use crate::error::InventoryResult;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

/// Capacity of the change fan-out channel. A subscriber that falls further
/// behind gets `Lagged` and must resync.
pub const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A document with its id.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: Body,
}

/// A committed change, as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreChange {
    pub collection: String,
    pub id: String,
    /// Body after the change; `None` when the document was deleted.
    pub body: Option<Body>,
    /// Sequence of the commit that made the change. Changes of one batch
    /// share it; later commits always carry a larger one.
    pub seq: u64,
}

impl StoreChange {
    pub fn is(&self, collection: &str, id: &str) -> bool {
        self.collection == collection && self.id == id
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Body of one document, `None` if it does not exist.
    async fn get(&self, collection: &str, id: &str) -> InventoryResult<Option<Body>>;

    /// All documents of a collection, oldest first.
    async fn list(&self, collection: &str) -> InventoryResult<Vec<Document>>;

    /// Appends a document under a generated id.
    async fn add(&self, collection: &str, body: Body) -> InventoryResult<String>;

    /// Applies a batch atomically and returns its commit sequence.
    async fn commit(&self, writes: Vec<DocumentWrite>) -> InventoryResult<u64>;

    /// Receiver of every change committed after this call.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;

    // =========================================================================
    // Single-write helpers
    // =========================================================================

    async fn set(
        &self,
        collection: &str,
        id: &str,
        body: Body,
        merge: bool,
    ) -> InventoryResult<u64> {
        self.commit(vec![DocumentWrite::new(
            collection,
            id,
            DocumentOp::Set { body, merge },
        )])
        .await
    }

    /// Overlays fields on an existing document.
    async fn update(&self, collection: &str, id: &str, fields: Body) -> InventoryResult<u64> {
        self.commit(vec![DocumentWrite::new(
            collection,
            id,
            DocumentOp::Update { fields },
        )])
        .await
    }

    /// Atomic `field += delta` on an existing document.
    async fn increment(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> InventoryResult<u64> {
        self.commit(vec![DocumentWrite::new(
            collection,
            id,
            DocumentOp::Increment {
                field: field.to_string(),
                delta,
            },
        )])
        .await
    }

    async fn delete(&self, collection: &str, id: &str) -> InventoryResult<u64> {
        self.commit(vec![DocumentWrite::new(collection, id, DocumentOp::Delete)])
            .await
    }
}

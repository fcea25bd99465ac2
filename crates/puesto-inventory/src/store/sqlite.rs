//! # SQLite Document Store
//!
//! Documents persisted as JSON rows by [`puesto_db::DocumentRepository`].
//! Changes are fanned out in-process after each committed transaction.
//! Writes are serialized behind the sequence lock so the fan-out follows
//! commit order.

use std::sync::Arc;

use async_trait::async_trait;
use puesto_db::{Body, Database, DocumentWrite};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

use super::{Document, DocumentStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::InventoryResult;

#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Database,
    changes: broadcast::Sender<StoreChange>,
    /// Last commit sequence handed out.
    sequence: Arc<Mutex<u64>>,
}

impl SqliteDocumentStore {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        SqliteDocumentStore {
            db,
            changes,
            sequence: Arc::new(Mutex::new(0)),
        }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> InventoryResult<Option<Body>> {
        let doc = self.db.documents().get(collection, id).await?;
        Ok(doc.map(|d| d.body))
    }

    async fn list(&self, collection: &str) -> InventoryResult<Vec<Document>> {
        let docs = self.db.documents().list(collection).await?;
        Ok(docs
            .into_iter()
            .map(|d| Document {
                id: d.id,
                body: d.body,
            })
            .collect())
    }

    async fn add(&self, collection: &str, body: Body) -> InventoryResult<String> {
        let mut sequence = self.sequence.lock().await;
        let id = self.db.documents().insert(collection, &body).await?;
        *sequence += 1;
        let _ = self.changes.send(StoreChange {
            collection: collection.to_string(),
            id: id.clone(),
            body: Some(body),
            seq: *sequence,
        });
        Ok(id)
    }

    async fn commit(&self, writes: Vec<DocumentWrite>) -> InventoryResult<u64> {
        let mut sequence = self.sequence.lock().await;
        let applied = self.db.documents().apply(&writes).await?;
        *sequence += 1;
        let seq = *sequence;
        debug!(count = applied.len(), seq, "Committed document batch");

        for write in applied {
            let _ = self.changes.send(StoreChange {
                collection: write.collection,
                id: write.id,
                body: write.body,
                seq,
            });
        }
        Ok(seq)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puesto_db::DbConfig;
    use serde_json::json;

    async fn store() -> SqliteDocumentStore {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        SqliteDocumentStore::new(db)
    }

    #[tokio::test]
    async fn test_increment_round_trip_and_fan_out() {
        let store = store().await;
        let mut rx = store.subscribe();

        let mut levels = Body::new();
        levels.insert("chapata".into(), json!(4));
        let first = store.set("stocks", "B", levels, true).await.unwrap();
        let second = store.increment("stocks", "B", "chapata", 3).await.unwrap();
        assert!(second > first);

        let body = store.get("stocks", "B").await.unwrap().unwrap();
        assert_eq!(body["chapata"], json!(7));

        assert!(rx.recv().await.unwrap().is("stocks", "B"));
        let echoed = rx.recv().await.unwrap();
        assert_eq!(echoed.seq, second);
        assert_eq!(echoed.body.unwrap()["chapata"], json!(7));
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = store().await;
        let err = store
            .update("productos", "nope", Body::new())
            .await
            .unwrap_err();
        assert!(err.is_remote());
    }

    #[tokio::test]
    async fn test_add_then_list() {
        let store = store().await;
        let mut body = Body::new();
        body.insert("fecha".into(), json!("2026-03-10"));
        let id = store.add("registros", body).await.unwrap();

        let docs = store.list("registros").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, id);
    }
}

//! # In-Memory Document Store
//!
//! A process-local store with the same write semantics as the SQLite one
//! (both go through [`puesto_db::apply_op`]). Used by tests and demos.
//!
//! Changes are published while the store lock is held, so subscribers see
//! them in commit sequence order.
//!
//! [`set_offline`](MemoryDocumentStore::set_offline) makes every call fail
//! with `Unavailable`, which is how the offline paths are exercised.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use puesto_db::{apply_op, Body, DocumentWrite};
use tokio::sync::{broadcast, Mutex};
use tracing::debug;
use uuid::Uuid;

use super::{Document, DocumentStore, StoreChange, CHANGE_CHANNEL_CAPACITY};
use crate::error::{InventoryError, InventoryResult};

type Key = (String, String);

#[derive(Debug, Clone)]
struct Entry {
    body: Body,
    /// Insertion order, kept across overwrites.
    seq: u64,
}

#[derive(Debug, Default)]
struct Inner {
    docs: HashMap<Key, Entry>,
    next_seq: u64,
    /// Last commit sequence handed out.
    commits: u64,
}

impl Inner {
    fn insert(&mut self, key: Key, body: Body) {
        match self.docs.get_mut(&key) {
            Some(entry) => entry.body = body,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.docs.insert(key, Entry { body, seq });
            }
        }
    }
}

pub struct MemoryDocumentStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<StoreChange>,
    offline: AtomicBool,
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        MemoryDocumentStore {
            inner: Mutex::new(Inner::default()),
            changes,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulates losing (or regaining) the connection to the store.
    pub fn set_offline(&self, offline: bool) {
        debug!(offline, "Memory store connectivity changed");
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    fn ensure_online(&self) -> InventoryResult<()> {
        if self.is_offline() {
            return Err(InventoryError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn publish(&self, changes: Vec<StoreChange>) {
        for change in changes {
            // No receivers is fine.
            let _ = self.changes.send(change);
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> InventoryResult<Option<Body>> {
        self.ensure_online()?;
        let inner = self.inner.lock().await;
        Ok(inner
            .docs
            .get(&(collection.to_string(), id.to_string()))
            .map(|e| e.body.clone()))
    }

    async fn list(&self, collection: &str) -> InventoryResult<Vec<Document>> {
        self.ensure_online()?;
        let inner = self.inner.lock().await;
        let mut entries: Vec<(&Key, &Entry)> = inner
            .docs
            .iter()
            .filter(|((c, _), _)| c.as_str() == collection)
            .collect();
        entries.sort_by_key(|(_, e)| e.seq);
        Ok(entries
            .into_iter()
            .map(|((_, id), e)| Document {
                id: id.clone(),
                body: e.body.clone(),
            })
            .collect())
    }

    async fn add(&self, collection: &str, body: Body) -> InventoryResult<String> {
        self.ensure_online()?;
        let id = Uuid::new_v4().to_string();
        let mut inner = self.inner.lock().await;
        inner.commits += 1;
        let seq = inner.commits;
        inner.insert((collection.to_string(), id.clone()), body.clone());
        self.publish(vec![StoreChange {
            collection: collection.to_string(),
            id: id.clone(),
            body: Some(body),
            seq,
        }]);
        Ok(id)
    }

    async fn commit(&self, writes: Vec<DocumentWrite>) -> InventoryResult<u64> {
        self.ensure_online()?;

        let mut inner = self.inner.lock().await;
        let seq = inner.commits + 1;

        // Stage on a copy so a failing write leaves nothing behind.
        let mut staged = Inner {
            docs: inner.docs.clone(),
            next_seq: inner.next_seq,
            commits: seq,
        };
        let mut changes = Vec::with_capacity(writes.len());

        for write in &writes {
            let key = (write.collection.clone(), write.id.clone());
            let path = format!("{}/{}", write.collection, write.id);
            let current = staged.docs.get(&key).map(|e| e.body.clone());

            let body = apply_op(&path, current, &write.op)?;
            match &body {
                Some(body) => staged.insert(key, body.clone()),
                None => {
                    staged.docs.remove(&key);
                }
            }
            changes.push(StoreChange {
                collection: write.collection.clone(),
                id: write.id.clone(),
                body,
                seq,
            });
        }

        *inner = staged;
        self.publish(changes);
        Ok(seq)
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

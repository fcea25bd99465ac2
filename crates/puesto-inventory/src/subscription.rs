//! # Subscription Task
//!
//! The only consumer of store change events. Decodes the documents the
//! coordinator watches into [`InventoryEvent`]s and folds them into the
//! shared state.
//!
//! ## Event Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Subscription Loop                                │
//! │                                                                         │
//! │  store.subscribe() ──► StoreChange                                     │
//! │                            │                                            │
//! │        ┌───────────────────┼───────────────────────┐                   │
//! │        ▼                   ▼                       ▼                   │
//! │  stocks/A | stocks/B  estadoVenta/actual     productos/*               │
//! │  StockSnapshot        SaleStateSnapshot      relist collection         │
//! │  (version: seq)       (version: seq)                                   │
//! │  (deleted: ignored)   (deleted: ignored)     CatalogSnapshot           │
//! │        │                   │                 + cache "products"        │
//! │        └───────────────────┴───────────────────────┘                   │
//! │                            │                                            │
//! │                            ▼                                            │
//! │            state.send_modify(|s| apply_event(s, event))                │
//! │                                                                         │
//! │  Lagged(n)  ──► resync every watched document                          │
//! │  Closed     ──► stop                                                   │
//! │  shutdown   ──► stop                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use puesto_core::{apply_event, collections, InventoryEvent, InventoryState, Location};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, warn};

use crate::cache::{keys, LocalCache};
use crate::codec;
use crate::error::InventoryResult;
use crate::store::{DocumentStore, StoreChange};

pub(crate) struct SubscriptionTask {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn LocalCache>,
    state: Arc<watch::Sender<InventoryState>>,
}

impl SubscriptionTask {
    pub(crate) fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn LocalCache>,
        state: Arc<watch::Sender<InventoryState>>,
    ) -> Self {
        SubscriptionTask {
            store,
            cache,
            state,
        }
    }

    fn apply(&self, event: InventoryEvent) {
        self.state.send_modify(|state| apply_event(state, event));
    }

    /// Reads every watched document and folds it into the state.
    ///
    /// Used for the initial load and after falling behind the change feed.
    pub(crate) async fn resync(&self) -> InventoryResult<()> {
        for location in Location::ALL {
            let path = format!("{}/{}", collections::STOCKS, location);
            if let Some(body) = self.store.get(collections::STOCKS, location.as_str()).await? {
                let levels = codec::decode_stock(&path, &body)?;
                self.apply(InventoryEvent::StockSnapshot {
                    location,
                    levels,
                    version: None,
                });
            }
        }

        if let Some(body) = self
            .store
            .get(collections::SALE_STATE, collections::SALE_STATE_DOC)
            .await?
        {
            let sale_state = codec::decode_sale_state(&body)?;
            self.apply(InventoryEvent::SaleStateSnapshot {
                sale_state,
                version: None,
            });
        }

        self.reload_catalog().await?;

        debug!("Inventory state resynced");
        Ok(())
    }

    /// Relists `productos`, replaces the catalog and backs it up locally.
    async fn reload_catalog(&self) -> InventoryResult<()> {
        let docs = self.store.list(collections::PRODUCTS).await?;

        let mut products = Vec::with_capacity(docs.len());
        for doc in &docs {
            match codec::decode_product(&doc.id, &doc.body) {
                Ok(product) => products.push(product),
                Err(e) => warn!(product_id = %doc.id, error = %e, "Skipping unreadable product"),
            }
        }

        let backup = codec::encode_catalog(&products)?;
        if let Err(e) = self.cache.set(keys::PRODUCTS, &backup).await {
            warn!(error = %e, "Failed to back up catalog");
        }

        debug!(count = products.len(), "Catalog snapshot");
        self.apply(InventoryEvent::CatalogSnapshot(products));
        Ok(())
    }

    async fn handle_change(&self, change: StoreChange) -> InventoryResult<()> {
        if change.collection == collections::STOCKS {
            let Ok(location) = change.id.parse::<Location>() else {
                return Ok(());
            };
            // A deleted stock document leaves the mirror as it was.
            if let Some(body) = change.body {
                let path = format!("{}/{}", collections::STOCKS, change.id);
                let levels = codec::decode_stock(&path, &body)?;
                self.apply(InventoryEvent::StockSnapshot {
                    location,
                    levels,
                    version: Some(change.seq),
                });
            }
        } else if change.is(collections::SALE_STATE, collections::SALE_STATE_DOC) {
            if let Some(body) = change.body {
                let sale_state = codec::decode_sale_state(&body)?;
                self.apply(InventoryEvent::SaleStateSnapshot {
                    sale_state,
                    version: Some(change.seq),
                });
            }
        } else if change.collection == collections::PRODUCTS {
            self.reload_catalog().await?;
        }
        Ok(())
    }

    /// Runs until shutdown or until the store drops its change channel.
    pub(crate) async fn run(
        self,
        mut changes: broadcast::Receiver<StoreChange>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        info!("Inventory subscription started");

        loop {
            tokio::select! {
                result = changes.recv() => {
                    match result {
                        Ok(change) => {
                            let path = format!("{}/{}", change.collection, change.id);
                            if let Err(e) = self.handle_change(change).await {
                                warn!(path = %path, error = %e, "Failed to apply remote change");
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Subscription lagged, resyncing");
                            if let Err(e) = self.resync().await {
                                warn!(error = %e, "Resync after lag failed");
                            }
                        }
                        Err(RecvError::Closed) => {
                            info!("Store change channel closed");
                            break;
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("Inventory subscription received shutdown");
                    break;
                }
            }
        }

        info!("Inventory subscription stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryDocumentStore;
    use puesto_db::Body;
    use serde_json::{json, Value};

    fn body(value: Value) -> Body {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn task(store: Arc<MemoryDocumentStore>) -> (SubscriptionTask, watch::Receiver<InventoryState>) {
        let (tx, rx) = watch::channel(InventoryState::default());
        let task = SubscriptionTask::new(store, Arc::new(MemoryCache::new()), Arc::new(tx));
        (task, rx)
    }

    #[tokio::test]
    async fn test_resync_loads_every_watched_document() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .set("stocks", "A", body(json!({"chapata": 4})), false)
            .await
            .unwrap();
        store
            .set(
                "estadoVenta",
                "actual",
                body(json!({"ventaIniciada": true, "registro": {"fecha": "2026-03-10", "activa": true}})),
                false,
            )
            .await
            .unwrap();
        store
            .set("productos", "torta", body(json!({"name": "Torta", "priceCents": 5000})), false)
            .await
            .unwrap();

        let (task, rx) = task(store);
        task.resync().await.unwrap();

        let state = rx.borrow();
        assert_eq!(state.available(Location::A, "chapata"), 4);
        assert!(state.registry_open);
        assert!(state.active_registry.is_some());
        assert_eq!(state.products.len(), 1);
        assert_eq!(state.products[0].id, "torta");
    }

    #[tokio::test]
    async fn test_deleted_stock_document_is_ignored() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (task, rx) = task(store);
        task.apply(InventoryEvent::StockSnapshot {
            location: Location::B,
            levels: [("chapata".to_string(), 3)].into_iter().collect(),
            version: None,
        });

        task.handle_change(StoreChange {
            collection: "stocks".into(),
            id: "B".into(),
            body: None,
            seq: 1,
        })
        .await
        .unwrap();

        assert_eq!(rx.borrow().available(Location::B, "chapata"), 3);
    }

    #[tokio::test]
    async fn test_unrelated_documents_are_ignored() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (task, rx) = task(store);
        let before = rx.borrow().clone();

        task.handle_change(StoreChange {
            collection: "registros".into(),
            id: "r1".into(),
            body: Some(body(json!({"fecha": "2026-03-10"}))),
            seq: 1,
        })
        .await
        .unwrap();
        task.handle_change(StoreChange {
            collection: "stocks".into(),
            id: "C".into(),
            body: Some(body(json!({"chapata": 1}))),
            seq: 2,
        })
        .await
        .unwrap();

        assert_eq!(*rx.borrow(), before);
    }

    #[tokio::test]
    async fn test_out_of_order_stock_echo_is_dropped() {
        let store = Arc::new(MemoryDocumentStore::new());
        let (task, rx) = task(store);

        let echo = |chapata: i64, seq: u64| StoreChange {
            collection: "stocks".into(),
            id: "A".into(),
            body: Some(body(json!({ "chapata": chapata }))),
            seq,
        };
        task.handle_change(echo(2, 7)).await.unwrap();
        task.handle_change(echo(5, 4)).await.unwrap();

        let state = rx.borrow();
        assert_eq!(state.available(Location::A, "chapata"), 2);
        assert_eq!(state.stock_version(Location::A), 7);
    }
}

//! # Inventory Coordinator
//!
//! The single owner of the stall's shared state: stock mirror, sale and
//! transfer ledgers, the active registry and the catalog mirror.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     InventoryCoordinator                                │
//! │                                                                         │
//! │  caller ──► sell / transfer / open / finalize / product CRUD           │
//! │                  │                                                      │
//! │                  │ 1. validate against the mirror (may be stale)       │
//! │                  │ 2. remote write (atomic increments / batches)       │
//! │                  │ 3. fold the committed delta into the mirror and     │
//! │                  │    append to the local ledger, in one send_modify   │
//! │                  ▼                                                      │
//! │            DocumentStore ──► change fan-out ──► SubscriptionTask       │
//! │                                                      │                  │
//! │                                                      ▼ reconcile        │
//! │  watch() ◄──────────────────────────────── watch::Sender<InventoryState>│
//! │  notices() ◄── broadcast::Sender<Notice>                               │
//! │                                                                         │
//! │  Stock writes are folded in under their commit sequence; the echo      │
//! │  later replaces the location and older echoes are dropped. The         │
//! │  catalog changes only when the store echoes the write back.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Known Race
//! Stock checks on one device are serialized, so a device never oversells
//! its own mirror. Two devices selling the last unit at the same time both
//! pass their checks; the increments still apply and stock goes negative
//! remotely.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use puesto_core::state::{check_sale, check_transfer};
use puesto_core::{
    apply_event, collections, ledger, validation, CoreError, DailyRegistry, InventoryEvent,
    InventoryState, Location, NewProduct, Product, ProductPatch, ReportRecord, SaleLine, SaleState,
    TransferLine, ValidationError,
};
use puesto_db::{DocumentOp, DocumentWrite};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::cache::{get_json, keys, set_json, LocalCache};
use crate::codec;
use crate::config::InventoryConfig;
use crate::error::{InventoryError, InventoryResult};
use crate::notice::{Notice, NOTICE_CHANNEL_CAPACITY};
use crate::store::DocumentStore;
use crate::subscription::SubscriptionTask;

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// Delay before the "inventory exhausted" notice.
    pub exhausted_notice_delay: Duration,

    /// Sale point used when none was cached.
    pub initial_location: Option<Location>,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        CoordinatorOptions {
            exhausted_notice_delay: Duration::from_secs(5),
            initial_location: None,
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(config: &InventoryConfig) -> Self {
        CoordinatorOptions {
            exhausted_notice_delay: config.exhausted_notice_delay(),
            initial_location: config.device.location,
        }
    }
}

// =============================================================================
// Coordinator
// =============================================================================

pub struct InventoryCoordinator {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn LocalCache>,
    state: Arc<watch::Sender<InventoryState>>,
    notices: broadcast::Sender<Notice>,
    options: CoordinatorOptions,
    /// Held from a stock check until its write is folded into the mirror.
    stock_writes: Mutex<()>,
    /// Highest commit sequence of this device's stock and sale-state writes.
    last_write: AtomicU64,
    shutdown_tx: mpsc::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl InventoryCoordinator {
    /// Restores cached state, loads the remote snapshots and starts the
    /// subscription task.
    ///
    /// ## Startup Sequence
    /// 1. Cached location and catalog (default catalog written to the cache
    ///    when none is cached)
    /// 2. Subscribe to store changes
    /// 3. Initial remote load; when the store is unreachable, restore the
    ///    cached registry flag and active registry instead
    /// 4. Spawn the subscription task
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn LocalCache>,
        options: CoordinatorOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(InventoryState::default());
        let state = Arc::new(state_tx);

        restore_cached_basics(cache.as_ref(), &state, options.initial_location).await;

        // Subscribe before the initial load so nothing committed in between
        // is missed.
        let changes = store.subscribe();
        let task = SubscriptionTask::new(store.clone(), cache.clone(), state.clone());

        match task.resync().await {
            Ok(()) => info!("Initial inventory snapshot loaded"),
            Err(e) => {
                warn!(error = %e, "Document store unreachable at startup, using cached registry");
                restore_offline_registry(cache.as_ref(), &state).await;
            }
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(task.run(changes, shutdown_rx));
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);

        InventoryCoordinator {
            store,
            cache,
            state,
            notices,
            options,
            stock_writes: Mutex::new(()),
            last_write: AtomicU64::new(0),
            shutdown_tx,
            task: Mutex::new(Some(handle)),
        }
    }

    fn track_write(&self, seq: u64) {
        self.last_write.fetch_max(seq, Ordering::SeqCst);
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current state snapshot.
    pub fn state(&self) -> InventoryState {
        self.state.borrow().clone()
    }

    /// Receiver that sees every state change.
    pub fn watch(&self) -> watch::Receiver<InventoryState> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }

    pub fn location(&self) -> Option<Location> {
        self.state.borrow().location
    }

    pub fn product(&self, product_id: &str) -> Option<Product> {
        self.state.borrow().product(product_id).cloned()
    }

    /// Stops the subscription task and waits for it.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }

    // =========================================================================
    // Location & Stock
    // =========================================================================

    pub async fn set_location(&self, location: Location) -> InventoryResult<()> {
        self.state.send_modify(|s| s.location = Some(location));
        info!(location = %location, "Sale point selected");
        self.cache.set(keys::POINT, location.as_str()).await
    }

    /// Merge-writes both stock documents.
    pub async fn set_initial_stock(
        &self,
        stock_a: BTreeMap<String, i64>,
        stock_b: BTreeMap<String, i64>,
    ) -> InventoryResult<()> {
        validation::validate_stock_levels(&stock_a)?;
        validation::validate_stock_levels(&stock_b)?;

        let writes = vec![
            DocumentWrite::new(
                collections::STOCKS,
                Location::A.as_str(),
                DocumentOp::Set {
                    body: codec::encode_stock(&stock_a),
                    merge: true,
                },
            ),
            DocumentWrite::new(
                collections::STOCKS,
                Location::B.as_str(),
                DocumentOp::Set {
                    body: codec::encode_stock(&stock_b),
                    merge: true,
                },
            ),
        ];

        let _guard = self.stock_writes.lock().await;
        let seq = self.store.commit(writes).await.map_err(|e| {
            error!(error = %e, "Failed to initialize stock");
            e
        })?;
        self.track_write(seq);

        self.state.send_modify(|s| {
            for (location, levels) in [(Location::A, &stock_a), (Location::B, &stock_b)] {
                apply_event(
                    s,
                    InventoryEvent::StockMerge {
                        location,
                        levels: levels.clone(),
                        version: seq,
                    },
                );
            }
        });

        info!(
            units_a = stock_a.values().sum::<i64>(),
            units_b = stock_b.values().sum::<i64>(),
            "Initial stock written"
        );
        Ok(())
    }

    // =========================================================================
    // Registry
    // =========================================================================

    /// Opens a registry dated today. Does not check for an open one.
    pub async fn open_registry(&self) -> InventoryResult<DailyRegistry> {
        let registry = DailyRegistry::open(Utc::now().date_naive());

        self.state.send_modify(|s| {
            s.active_registry = Some(registry.clone());
            s.registry_open = true;
        });

        if let Err(e) = set_json(self.cache.as_ref(), keys::ACTIVE_REGISTRY, &registry).await {
            warn!(error = %e, "Failed to cache active registry");
        }
        if let Err(e) = self.cache.set(keys::SALE_STARTED, "true").await {
            warn!(error = %e, "Failed to cache registry flag");
        }

        let sale_state = SaleState {
            sale_started: true,
            registry: Some(registry.clone()),
        };
        let seq = self
            .store
            .set(
                collections::SALE_STATE,
                collections::SALE_STATE_DOC,
                codec::to_body(&sale_state)?,
                false,
            )
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to publish opened registry");
                e
            })?;
        self.track_write(seq);
        self.state.send_modify(|s| s.note_sale_state_write(seq));

        info!(date = %registry.date, "Registry opened");
        Ok(registry)
    }

    /// Closes the day.
    ///
    /// ## What This Does
    /// 1. Builds the record: sales by location and product, transfer list,
    ///    stock snapshot, revenue at current catalog prices
    /// 2. Appends it to `registros` and resets `estadoVenta/actual`
    /// 3. When that succeeded and no units are left anywhere, schedules the
    ///    "inventory exhausted" notice
    /// 4. Clears the ledgers, the active registry and the cached registry
    ///    whatever happened in step 2, then returns step 2's error if any
    pub async fn finalize_registry(&self) -> InventoryResult<ReportRecord> {
        let registry = {
            let s = self.state.borrow();
            ledger::close_registry(
                s.active_registry.as_ref(),
                &s.sales,
                &s.transfers,
                &s.stock,
                &s.products,
                Utc::now(),
            )
        };
        let remaining = registry.final_stock.grand_total();

        let outcome = self.write_closed_registry(&registry).await;

        match &outcome {
            Ok(id) => {
                info!(
                    record_id = %id,
                    total = %registry.total,
                    remaining,
                    "Registry closed"
                );
                if remaining == 0 {
                    self.schedule_exhausted_notice();
                }
            }
            Err(e) => error!(error = %e, "Failed to upload closed registry"),
        }

        if let Err(e) = self.reset().await {
            warn!(error = %e, "Failed to clear cached registry");
        }

        outcome.map(|id| ReportRecord { id, registry })
    }

    async fn write_closed_registry(&self, registry: &DailyRegistry) -> InventoryResult<String> {
        let id = self
            .store
            .add(collections::REPORTS, codec::to_body(registry)?)
            .await?;

        let seq = self
            .store
            .set(
                collections::SALE_STATE,
                collections::SALE_STATE_DOC,
                codec::to_body(&SaleState::default())?,
                false,
            )
            .await?;
        self.track_write(seq);

        Ok(id)
    }

    fn schedule_exhausted_notice(&self) {
        let notices = self.notices.clone();
        let delay = self.options.exhausted_notice_delay;
        debug!(?delay, "Scheduling inventory exhausted notice");

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = notices.send(Notice::InventoryExhausted);
        });
    }

    /// Forgets the day's ledgers and the active registry, locally and in the
    /// cache.
    ///
    /// Echoes of sale-state writes this device made before the reset are
    /// skipped from then on, so a late "opened" echo cannot bring the
    /// registry back.
    pub async fn reset(&self) -> InventoryResult<()> {
        let through = self.last_write.load(Ordering::SeqCst);
        self.state.send_modify(|s| {
            s.clear_registry();
            s.skip_sale_states_through(through);
        });
        self.cache.remove(&[keys::ACTIVE_REGISTRY]).await?;
        self.cache.set(keys::SALE_STARTED, "false").await?;
        debug!("Registry state cleared");
        Ok(())
    }

    // =========================================================================
    // Sales & Transfers
    // =========================================================================

    /// Records a sale of `qty` units at `location`.
    ///
    /// A negative `qty` is a reversal and puts units back.
    pub async fn sell(
        &self,
        product_id: &str,
        qty: i64,
        location: Location,
    ) -> InventoryResult<SaleLine> {
        validation::validate_product_id(product_id)?;

        let _guard = self.stock_writes.lock().await;
        let checked = {
            let s = self.state.borrow();
            check_sale(&s, product_id, qty, location).map_err(|e| {
                let notice = insufficient_stock_notice(&s, &e);
                (e, notice)
            })
        };
        if let Err((e, notice)) = checked {
            return Err(self.reject(e, notice));
        }

        let seq = self
            .store
            .increment(collections::STOCKS, location.as_str(), product_id, -qty)
            .await
            .map_err(|e| {
                error!(product_id = %product_id, location = %location, error = %e, "Failed to record sale");
                e
            })?;
        self.track_write(seq);

        let line = SaleLine {
            location,
            product: product_id.to_string(),
            qty,
            ts: Utc::now().timestamp_millis(),
        };
        self.state.send_modify(|s| {
            apply_event(
                s,
                InventoryEvent::StockDelta {
                    location,
                    product_id: product_id.to_string(),
                    delta: -qty,
                    version: seq,
                },
            );
            s.sales.push(line.clone());
        });

        info!(product_id = %product_id, qty, location = %location, "Sale recorded");
        Ok(line)
    }

    /// Sells at the device's current location.
    pub async fn sell_here(&self, product_id: &str, qty: i64) -> InventoryResult<SaleLine> {
        let location = self.location().ok_or(CoreError::LocationNotSet)?;
        self.sell(product_id, qty, location).await
    }

    /// Puts `qty` units back, as removing a line from an order does.
    pub async fn return_to_stock(
        &self,
        product_id: &str,
        qty: i64,
        location: Location,
    ) -> InventoryResult<SaleLine> {
        if qty <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "qty".to_string(),
            }
            .into());
        }
        self.sell(product_id, -qty, location).await
    }

    /// Moves `qty` units between the two locations as one store batch.
    pub async fn transfer(
        &self,
        product_id: &str,
        qty: i64,
        from: Location,
        to: Location,
    ) -> InventoryResult<TransferLine> {
        validation::validate_product_id(product_id)?;

        let _guard = self.stock_writes.lock().await;
        let checked = {
            let s = self.state.borrow();
            check_transfer(&s, product_id, qty, from, to).map_err(|e| {
                let notice = insufficient_stock_notice(&s, &e);
                (e, notice)
            })
        };
        if let Err((e, notice)) = checked {
            return Err(self.reject(e, notice));
        }

        let writes = vec![
            DocumentWrite::new(
                collections::STOCKS,
                from.as_str(),
                DocumentOp::Increment {
                    field: product_id.to_string(),
                    delta: -qty,
                },
            ),
            DocumentWrite::new(
                collections::STOCKS,
                to.as_str(),
                DocumentOp::Increment {
                    field: product_id.to_string(),
                    delta: qty,
                },
            ),
        ];
        let seq = self.store.commit(writes).await.map_err(|e| {
            error!(product_id = %product_id, from = %from, to = %to, error = %e, "Failed to record transfer");
            e
        })?;
        self.track_write(seq);

        let line = TransferLine {
            from,
            to,
            product: product_id.to_string(),
            qty,
            ts: Utc::now().timestamp_millis(),
        };
        self.state.send_modify(|s| {
            for (location, delta) in [(from, -qty), (to, qty)] {
                apply_event(
                    s,
                    InventoryEvent::StockDelta {
                        location,
                        product_id: product_id.to_string(),
                        delta,
                        version: seq,
                    },
                );
            }
            s.transfers.push(line.clone());
        });

        info!(product_id = %product_id, qty, from = %from, to = %to, "Transfer recorded");
        Ok(line)
    }

    /// Transfers out of the device's current location.
    pub async fn transfer_from_here(
        &self,
        product_id: &str,
        qty: i64,
        to: Location,
    ) -> InventoryResult<TransferLine> {
        let from = self.location().ok_or(CoreError::LocationNotSet)?;
        self.transfer(product_id, qty, from, to).await
    }

    fn reject(&self, err: CoreError, notice: Option<Notice>) -> InventoryError {
        warn!(error = %err, "Operation rejected");
        if let Some(notice) = notice {
            let _ = self.notices.send(notice);
        }
        err.into()
    }

    // =========================================================================
    // Catalog
    // =========================================================================
    //
    // These only write to `productos`; the catalog mirror follows through the
    // subscription.

    /// Creates a product under a generated id and returns the id.
    pub async fn add_product(&self, product: NewProduct) -> InventoryResult<String> {
        let name = validation::validate_product_name(&product.name)?;
        validation::validate_price_cents(product.price_cents)?;
        if let Some(public_id) = product.image.as_ref().and_then(|i| i.public_id()) {
            validation::validate_public_id(public_id)?;
        }

        let doc = Product {
            id: String::new(),
            name,
            price_cents: product.price_cents,
            image: product.image,
            created_at: Some(Utc::now()),
        };

        let id = self
            .store
            .add(collections::PRODUCTS, codec::to_body(&doc)?)
            .await
            .map_err(|e| {
                error!(name = %doc.name, error = %e, "Failed to add product");
                e
            })?;

        info!(product_id = %id, name = %doc.name, "Product added");
        Ok(id)
    }

    /// Patches a product. An empty patch writes nothing.
    pub async fn update_product(&self, product_id: &str, patch: ProductPatch) -> InventoryResult<()> {
        validation::validate_product_id(product_id)?;

        let mut patch = patch;
        if let Some(ref name) = patch.name {
            patch.name = Some(validation::validate_product_name(name)?);
        }
        if let Some(cents) = patch.price_cents {
            validation::validate_price_cents(cents)?;
        }

        if patch.is_empty() {
            debug!(product_id = %product_id, "Empty product patch, nothing to write");
            return Ok(());
        }

        self.store
            .update(collections::PRODUCTS, product_id, codec::to_body(&patch)?)
            .await
            .map_err(|e| {
                error!(product_id = %product_id, error = %e, "Failed to update product");
                e
            })?;

        info!(product_id = %product_id, "Product updated");
        Ok(())
    }

    pub async fn remove_product(&self, product_id: &str) -> InventoryResult<()> {
        validation::validate_product_id(product_id)?;

        self.store
            .delete(collections::PRODUCTS, product_id)
            .await
            .map_err(|e| {
                error!(product_id = %product_id, error = %e, "Failed to remove product");
                e
            })?;

        info!(product_id = %product_id, "Product removed");
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn insufficient_stock_notice(state: &InventoryState, err: &CoreError) -> Option<Notice> {
    match err {
        CoreError::InsufficientStock {
            product_id,
            location,
            available,
            requested,
        } => Some(Notice::InsufficientStock {
            product_id: product_id.clone(),
            product_name: state.product_name(product_id).to_string(),
            location: *location,
            available: *available,
            requested: *requested,
        }),
        _ => None,
    }
}

/// Location and catalog from the cache. Errors are logged, never fatal.
async fn restore_cached_basics(
    cache: &dyn LocalCache,
    state: &watch::Sender<InventoryState>,
    fallback_location: Option<Location>,
) {
    let cached_location = match cache.get(keys::POINT).await {
        Ok(Some(raw)) => match raw.parse::<Location>() {
            Ok(location) => Some(location),
            Err(e) => {
                warn!(value = %raw, error = %e, "Ignoring cached location");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "Failed to read cached location");
            None
        }
    };
    if let Some(location) = cached_location.or(fallback_location) {
        state.send_modify(|s| s.location = Some(location));
    }

    match cache.get(keys::PRODUCTS).await {
        Ok(Some(raw)) => match codec::decode_catalog(&raw) {
            Ok(products) => {
                debug!(count = products.len(), "Restored cached catalog");
                state.send_modify(|s| s.products = products);
            }
            Err(e) => warn!(error = %e, "Ignoring cached catalog"),
        },
        Ok(None) => {
            let defaults = state.borrow().products.clone();
            match codec::encode_catalog(&defaults) {
                Ok(raw) => {
                    if let Err(e) = cache.set(keys::PRODUCTS, &raw).await {
                        warn!(error = %e, "Failed to cache default catalog");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to encode default catalog"),
            }
        }
        Err(e) => warn!(error = %e, "Failed to read cached catalog"),
    }
}

/// Registry flag and active registry from the cache, for offline starts.
async fn restore_offline_registry(cache: &dyn LocalCache, state: &watch::Sender<InventoryState>) {
    match cache.get(keys::SALE_STARTED).await {
        Ok(Some(flag)) if flag == "true" => state.send_modify(|s| s.registry_open = true),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Failed to read cached registry flag"),
    }

    match get_json::<DailyRegistry>(cache, keys::ACTIVE_REGISTRY).await {
        Ok(Some(registry)) => {
            debug!(date = %registry.date, "Restored cached registry");
            state.send_modify(|s| s.active_registry = Some(registry));
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Ignoring cached registry"),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryDocumentStore;
    use puesto_core::ProductImage;
    use puesto_db::Body;
    use serde_json::{json, Value};
    use tokio::time::timeout;

    fn body(value: Value) -> Body {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    struct Harness {
        store: Arc<MemoryDocumentStore>,
        cache: Arc<MemoryCache>,
        coordinator: InventoryCoordinator,
    }

    async fn seeded_store(a: Value, b: Value) -> Arc<MemoryDocumentStore> {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set("stocks", "A", body(a), false).await.unwrap();
        store.set("stocks", "B", body(b), false).await.unwrap();
        for (id, name, cents) in [("chapata", "Chapata", 3500), ("sandwich", "Sándwich", 4200)] {
            store
                .set(
                    "productos",
                    id,
                    body(json!({"name": name, "priceCents": cents})),
                    false,
                )
                .await
                .unwrap();
        }
        store
    }

    async fn harness(store: Arc<MemoryDocumentStore>, cache: Arc<MemoryCache>) -> Harness {
        let coordinator = InventoryCoordinator::start(
            store.clone(),
            cache.clone(),
            CoordinatorOptions::default(),
        )
        .await;
        Harness {
            store,
            cache,
            coordinator,
        }
    }

    async fn wait_until<F>(coordinator: &InventoryCoordinator, pred: F)
    where
        F: FnMut(&InventoryState) -> bool,
    {
        let mut rx = coordinator.watch();
        timeout(Duration::from_secs(2), rx.wait_for(pred))
            .await
            .expect("state never reached")
            .expect("state channel closed");
    }

    /// Writes a marker product and waits for its echo, so every change
    /// committed before it has been folded in too.
    async fn drain_echoes(h: &Harness) {
        h.store
            .set(
                "productos",
                "marcador",
                body(json!({"name": "Marcador", "priceCents": 100})),
                false,
            )
            .await
            .unwrap();
        wait_until(&h.coordinator, |s| s.product("marcador").is_some()).await;
    }

    #[tokio::test]
    async fn test_sell_lowers_stock_then_rejects_oversell() {
        let store = seeded_store(json!({"x": 5}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        let mut notices = h.coordinator.notices();

        let line = h.coordinator.sell("x", 3, Location::A).await.unwrap();
        assert_eq!(line.qty, 3);
        wait_until(&h.coordinator, |s| s.available(Location::A, "x") == 2).await;

        let err = h.coordinator.sell("x", 3, Location::A).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        ));

        let remote = h.store.get("stocks", "A").await.unwrap().unwrap();
        assert_eq!(remote["x"], json!(2));
        assert_eq!(h.coordinator.state().sales.len(), 1);

        match notices.try_recv().unwrap() {
            Notice::InsufficientStock { product_id, .. } => assert_eq!(product_id, "x"),
            other => panic!("unexpected notice {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_sell_zero_is_rejected_without_write() {
        let store = seeded_store(json!({"chapata": 5}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        let mut changes = h.store.subscribe();

        let err = h.coordinator.sell("chapata", 0, Location::A).await.unwrap_err();
        assert!(err.is_validation());
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_return_to_stock_raises_stock() {
        let store = seeded_store(json!({"chapata": 1}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let line = h
            .coordinator
            .return_to_stock("chapata", 2, Location::A)
            .await
            .unwrap();
        assert_eq!(line.qty, -2);
        wait_until(&h.coordinator, |s| s.available(Location::A, "chapata") == 3).await;

        assert!(h
            .coordinator
            .return_to_stock("chapata", 0, Location::A)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_sell_here_requires_location() {
        let store = seeded_store(json!({"chapata": 5}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let err = h.coordinator.sell_here("chapata", 1).await.unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::LocationNotSet)));

        h.coordinator.set_location(Location::A).await.unwrap();
        h.coordinator.sell_here("chapata", 1).await.unwrap();
        assert_eq!(
            h.cache.get(keys::POINT).await.unwrap().as_deref(),
            Some("A")
        );
    }

    #[tokio::test]
    async fn test_transfer_moves_units() {
        let store = seeded_store(json!({"x": 2}), json!({"x": 0})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let line = h
            .coordinator
            .transfer("x", 2, Location::A, Location::B)
            .await
            .unwrap();
        assert_eq!((line.from, line.to), (Location::A, Location::B));

        wait_until(&h.coordinator, |s| {
            s.available(Location::A, "x") == 0 && s.available(Location::B, "x") == 2
        })
        .await;
        assert_eq!(h.coordinator.state().transfers.len(), 1);
    }

    #[tokio::test]
    async fn test_transfer_to_same_location_does_nothing() {
        let store = seeded_store(json!({"x": 2}), json!({"x": 0})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        let mut changes = h.store.subscribe();

        let err = h
            .coordinator
            .transfer("x", 1, Location::A, Location::A)
            .await
            .unwrap_err();
        assert!(matches!(err.as_core(), Some(CoreError::SameLocation(Location::A))));
        assert!(h.coordinator.state().transfers.is_empty());
        assert!(changes.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_transfer_insufficient_stock_writes_nothing() {
        let store = seeded_store(json!({"x": 1}), json!({"x": 0})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        h.coordinator.set_location(Location::A).await.unwrap();
        let mut notices = h.coordinator.notices();

        assert!(h
            .coordinator
            .transfer_from_here("x", 2, Location::B)
            .await
            .is_err());
        assert!(notices.try_recv().is_ok());
        let remote = h.store.get("stocks", "B").await.unwrap().unwrap();
        assert_eq!(remote["x"], json!(0));
    }

    #[tokio::test]
    async fn test_open_then_finalize_writes_empty_record() {
        let store = seeded_store(json!({"chapata": 3}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let opened = h.coordinator.open_registry().await.unwrap();
        assert!(opened.active);
        assert_eq!(
            h.cache.get(keys::SALE_STARTED).await.unwrap().as_deref(),
            Some("true")
        );

        let record = h.coordinator.finalize_registry().await.unwrap();
        assert!(record.registry.total.is_zero());
        assert!(record.registry.sales.is_empty());
        assert!(record.registry.transfers.is_empty());
        assert!(!record.registry.active);
        assert_eq!(record.registry.date, opened.date);

        let reports = h.store.list("registros").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, record.id);
        assert_eq!(reports[0].body["totalVenta"], json!(0));

        let sale_state = h.store.get("estadoVenta", "actual").await.unwrap().unwrap();
        assert_eq!(sale_state["ventaIniciada"], json!(false));
        assert_eq!(sale_state["registro"], Value::Null);

        let state = h.coordinator.state();
        assert!(!state.registry_open);
        assert!(state.active_registry.is_none());
    }

    #[tokio::test]
    async fn test_finalize_revenue_uses_catalog_prices() {
        let store = seeded_store(json!({"chapata": 5}), json!({"chapata": 5})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        wait_until(&h.coordinator, |s| s.product("chapata").is_some()).await;

        h.coordinator.open_registry().await.unwrap();
        h.coordinator.sell("chapata", 2, Location::A).await.unwrap();
        h.coordinator.sell("chapata", 1, Location::B).await.unwrap();

        let record = h.coordinator.finalize_registry().await.unwrap();
        assert_eq!(record.registry.total.cents(), 3 * 3500);
        assert_eq!(record.registry.sales.get(Location::A, "chapata"), 2);
        assert_eq!(record.registry.sales.get(Location::B, "chapata"), 1);
        assert!(h.coordinator.state().sales.is_empty());
    }

    #[tokio::test]
    async fn test_finalize_offline_still_clears_state() {
        let store = seeded_store(json!({"chapata": 5}), json!({})).await;
        let cache = Arc::new(MemoryCache::new());
        let h = harness(store, cache).await;

        h.coordinator.open_registry().await.unwrap();
        h.coordinator.sell("chapata", 1, Location::A).await.unwrap();
        h.store.set_offline(true);

        let err = h.coordinator.finalize_registry().await.unwrap_err();
        assert!(err.is_remote());

        let state = h.coordinator.state();
        assert!(state.sales.is_empty());
        assert!(state.transfers.is_empty());
        assert!(state.active_registry.is_none());
        assert!(!state.registry_open);

        let entries = h.cache.entries().await;
        assert_eq!(entries.get(keys::SALE_STARTED).map(String::as_str), Some("false"));
        assert!(!entries.contains_key(keys::ACTIVE_REGISTRY));

        // The "opened" echo is still queued; it must not reopen the day.
        h.store.set_offline(false);
        drain_echoes(&h).await;
        let state = h.coordinator.state();
        assert!(state.active_registry.is_none());
        assert!(!state.registry_open);
    }

    #[tokio::test]
    async fn test_finalize_is_not_undone_by_late_echoes() {
        let store = seeded_store(json!({"chapata": 3}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        h.coordinator.open_registry().await.unwrap();
        h.coordinator.sell("chapata", 1, Location::A).await.unwrap();
        h.coordinator.finalize_registry().await.unwrap();

        drain_echoes(&h).await;
        let state = h.coordinator.state();
        assert!(state.active_registry.is_none());
        assert!(!state.registry_open);
        assert!(state.sales.is_empty());
        assert_eq!(state.available(Location::A, "chapata"), 2);
    }

    #[tokio::test]
    async fn test_back_to_back_sales_never_oversell() {
        let store = seeded_store(json!({"chapata": 5}), json!({"chapata": 1})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        h.coordinator.sell("chapata", 3, Location::A).await.unwrap();
        let err = h.coordinator.sell("chapata", 3, Location::A).await.unwrap_err();
        assert!(matches!(
            err.as_core(),
            Some(CoreError::InsufficientStock {
                available: 2,
                requested: 3,
                ..
            })
        ));

        h.coordinator.sell("chapata", 1, Location::B).await.unwrap();
        assert!(h.coordinator.sell("chapata", 1, Location::B).await.is_err());

        let a = h.store.get("stocks", "A").await.unwrap().unwrap();
        let b = h.store.get("stocks", "B").await.unwrap().unwrap();
        assert_eq!((a["chapata"].clone(), b["chapata"].clone()), (json!(2), json!(0)));
        assert_eq!(h.coordinator.state().sales.len(), 2);

        drain_echoes(&h).await;
        assert_eq!(h.coordinator.state().available(Location::A, "chapata"), 2);
        assert_eq!(h.coordinator.state().available(Location::B, "chapata"), 0);
    }

    #[tokio::test]
    async fn test_concurrent_sales_of_last_unit_on_one_device() {
        let store = seeded_store(json!({"chapata": 1}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let (first, second) = tokio::join!(
            h.coordinator.sell("chapata", 1, Location::A),
            h.coordinator.sell("chapata", 1, Location::A),
        );
        assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);

        let a = h.store.get("stocks", "A").await.unwrap().unwrap();
        assert_eq!(a["chapata"], json!(0));
    }

    #[tokio::test]
    async fn test_back_to_back_transfers_never_overdraw() {
        let store = seeded_store(json!({"x": 2}), json!({"x": 0})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        h.coordinator
            .transfer("x", 2, Location::A, Location::B)
            .await
            .unwrap();
        let state = h.coordinator.state();
        assert_eq!(state.available(Location::A, "x"), 0);
        assert_eq!(state.available(Location::B, "x"), 2);

        assert!(h
            .coordinator
            .transfer("x", 1, Location::A, Location::B)
            .await
            .is_err());
        h.coordinator
            .transfer("x", 2, Location::B, Location::A)
            .await
            .unwrap();

        let a = h.store.get("stocks", "A").await.unwrap().unwrap();
        let b = h.store.get("stocks", "B").await.unwrap().unwrap();
        assert_eq!((a["x"].clone(), b["x"].clone()), (json!(2), json!(0)));
        assert_eq!(h.coordinator.state().transfers.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_selling_last_unit_then_finalize_reports_exhausted() {
        let store = seeded_store(json!({"chapata": 1}), json!({"chapata": 0})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        let mut notices = h.coordinator.notices();

        h.coordinator.open_registry().await.unwrap();
        h.coordinator.sell("chapata", 1, Location::A).await.unwrap();
        let record = h.coordinator.finalize_registry().await.unwrap();

        assert_eq!(record.registry.final_stock.grand_total(), 0);
        assert_eq!(record.registry.sales.get(Location::A, "chapata"), 1);

        let notice = timeout(Duration::from_secs(6), notices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notice, Notice::InventoryExhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_notice_after_delay() {
        let store = seeded_store(json!({"chapata": 0}), json!({"chapata": 0})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        let mut notices = h.coordinator.notices();

        h.coordinator.open_registry().await.unwrap();
        h.coordinator.finalize_registry().await.unwrap();

        assert!(timeout(Duration::from_secs(4), notices.recv()).await.is_err());
        let notice = timeout(Duration::from_secs(2), notices.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notice, Notice::InventoryExhausted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_exhausted_notice_when_stock_left() {
        let store = seeded_store(json!({"chapata": 1}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        let mut notices = h.coordinator.notices();

        h.coordinator.finalize_registry().await.unwrap();
        assert!(timeout(Duration::from_secs(10), notices.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_initial_stock_rejects_negative() {
        let store = Arc::new(MemoryDocumentStore::new());
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let bad: BTreeMap<String, i64> = [("chapata".to_string(), -1)].into_iter().collect();
        assert!(h
            .coordinator
            .set_initial_stock(bad, BTreeMap::new())
            .await
            .unwrap_err()
            .is_validation());

        let a: BTreeMap<String, i64> = [("chapata".to_string(), 10)].into_iter().collect();
        let b: BTreeMap<String, i64> = [("chapata".to_string(), 4)].into_iter().collect();
        h.coordinator.set_initial_stock(a, b).await.unwrap();
        wait_until(&h.coordinator, |s| {
            s.available(Location::A, "chapata") == 10 && s.available(Location::B, "chapata") == 4
        })
        .await;
    }

    #[tokio::test]
    async fn test_initial_stock_rejects_oversized_level() {
        let store = seeded_store(json!({"chapata": 2}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let huge: BTreeMap<String, i64> = [("chapata".to_string(), i64::MAX)].into_iter().collect();
        let err = h
            .coordinator
            .set_initial_stock(huge, BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let a = h.store.get("stocks", "A").await.unwrap().unwrap();
        assert_eq!(a["chapata"], json!(2));
    }

    #[tokio::test]
    async fn test_initial_stock_is_visible_right_away() {
        let store = seeded_store(json!({"sandwich": 3}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let a: BTreeMap<String, i64> = [("chapata".to_string(), 2)].into_iter().collect();
        h.coordinator.set_initial_stock(a, BTreeMap::new()).await.unwrap();
        h.coordinator.sell("chapata", 2, Location::A).await.unwrap();

        let state = h.coordinator.state();
        assert_eq!(state.available(Location::A, "chapata"), 0);
        assert_eq!(state.available(Location::A, "sandwich"), 3);
    }

    #[tokio::test]
    async fn test_product_crud_flows_through_subscription() {
        let store = Arc::new(MemoryDocumentStore::new());
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let id = h
            .coordinator
            .add_product(NewProduct {
                name: "  Torta ".into(),
                price_cents: 5000,
                image: Some(ProductImage::Asset {
                    name: "torta".into(),
                }),
            })
            .await
            .unwrap();
        wait_until(&h.coordinator, |s| s.product(&id).is_some()).await;
        assert_eq!(h.coordinator.product(&id).unwrap().name, "Torta");

        h.coordinator
            .update_product(
                &id,
                ProductPatch {
                    price_cents: Some(5500),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        wait_until(&h.coordinator, |s| {
            s.product(&id).map(|p| p.price_cents) == Some(5500)
        })
        .await;
        assert_eq!(h.coordinator.product(&id).unwrap().name, "Torta");

        h.coordinator.remove_product(&id).await.unwrap();
        wait_until(&h.coordinator, |s| s.product(&id).is_none()).await;

        let cached = h.cache.get(keys::PRODUCTS).await.unwrap().unwrap();
        assert!(codec::decode_catalog(&cached).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_product_validation() {
        let store = Arc::new(MemoryDocumentStore::new());
        let h = harness(store, Arc::new(MemoryCache::new())).await;

        let blank = NewProduct {
            name: "   ".into(),
            price_cents: 100,
            image: None,
        };
        assert!(h.coordinator.add_product(blank).await.unwrap_err().is_validation());

        let negative = NewProduct {
            name: "Torta".into(),
            price_cents: -1,
            image: None,
        };
        assert!(h.coordinator.add_product(negative).await.is_err());
        assert!(h.store.list("productos").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offline_start_restores_cache() {
        let store = Arc::new(MemoryDocumentStore::new());
        store.set_offline(true);

        let cache = Arc::new(MemoryCache::new());
        let registry = DailyRegistry::open(chrono::NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
        cache.set(keys::POINT, "B").await.unwrap();
        cache.set(keys::SALE_STARTED, "true").await.unwrap();
        set_json(cache.as_ref(), keys::ACTIVE_REGISTRY, &registry)
            .await
            .unwrap();

        let h = harness(store, cache).await;
        let state = h.coordinator.state();
        assert_eq!(state.location, Some(Location::B));
        assert!(state.registry_open);
        assert_eq!(state.active_registry, Some(registry));
        // no cached catalog: defaults are kept and written to the cache
        assert_eq!(state.products, puesto_core::default_catalog());
        assert!(h.cache.get(keys::PRODUCTS).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_online_start_ignores_cached_registry() {
        let store = seeded_store(json!({}), json!({})).await;
        let cache = Arc::new(MemoryCache::new());
        cache.set(keys::SALE_STARTED, "true").await.unwrap();

        let h = harness(store, cache).await;
        assert!(!h.coordinator.state().registry_open);
    }

    #[tokio::test]
    async fn test_shutdown_stops_subscription() {
        let store = seeded_store(json!({"chapata": 5}), json!({})).await;
        let h = harness(store, Arc::new(MemoryCache::new())).await;
        h.coordinator.shutdown().await;

        h.store.increment("stocks", "A", "chapata", -1).await.unwrap();
        tokio::task::yield_now().await;
        assert_eq!(h.coordinator.state().available(Location::A, "chapata"), 5);
    }
}

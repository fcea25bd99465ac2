//! # Report Feed
//!
//! Live view over the closed registries in `registros`, with the weekly and
//! monthly filters the report screen offers.
//!
//! ```text
//! start ──► subscribe ──► list registros ──► watch::Sender<Vec<ReportRecord>>
//!                │                                   ▲
//!                ▼                                   │
//!        registros/* change ── body: upsert ─────────┤
//!                              none: remove ─────────┤
//!        Lagged ──────────────  relist ──────────────┘
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use puesto_core::report::{filter_records, summarize};
use puesto_core::{collections, ReportPeriod, ReportRecord, ReportSummary};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec;
use crate::error::InventoryResult;
use crate::store::{DocumentStore, StoreChange};

pub struct ReportFeed {
    records: watch::Receiver<Vec<ReportRecord>>,
    shutdown_tx: mpsc::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReportFeed {
    /// Loads every record and keeps following the collection.
    pub async fn start(store: Arc<dyn DocumentStore>) -> InventoryResult<Self> {
        let changes = store.subscribe();
        let initial = load_records(store.as_ref()).await?;
        info!(count = initial.len(), "Report records loaded");

        let (records_tx, records) = watch::channel(initial);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let handle = tokio::spawn(follow(store, records_tx, changes, shutdown_rx));

        Ok(ReportFeed {
            records,
            shutdown_tx,
            task: Mutex::new(Some(handle)),
        })
    }

    /// Every record, oldest first.
    pub fn records(&self) -> Vec<ReportRecord> {
        self.records.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<ReportRecord>> {
        self.records.clone()
    }

    /// Records whose `createdAt` falls in the period around `anchor`.
    pub fn filtered(&self, period: ReportPeriod, anchor: NaiveDate) -> Vec<ReportRecord> {
        let records = self.records.borrow();
        filter_records(&records, period, anchor)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Report cards for the period.
    pub fn summaries(&self, period: ReportPeriod, anchor: NaiveDate) -> Vec<ReportSummary> {
        let records = self.records.borrow();
        filter_records(&records, period, anchor)
            .into_iter()
            .map(summarize)
            .collect()
    }

    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Some(handle) = self.task.lock().await.take() {
            let _ = handle.await;
        }
    }
}

async fn load_records(store: &dyn DocumentStore) -> InventoryResult<Vec<ReportRecord>> {
    let docs = store.list(collections::REPORTS).await?;
    let mut records: Vec<ReportRecord> = docs
        .iter()
        .filter_map(|doc| match codec::decode_report(&doc.id, &doc.body) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(report_id = %doc.id, error = %e, "Skipping unreadable report");
                None
            }
        })
        .collect();
    records.sort_by_key(|r| r.registry.created_at);
    Ok(records)
}

fn apply_change(records: &mut Vec<ReportRecord>, change: StoreChange) {
    match change.body {
        Some(body) => match codec::decode_report(&change.id, &body) {
            Ok(record) => {
                match records.iter_mut().find(|r| r.id == record.id) {
                    Some(existing) => *existing = record,
                    None => records.push(record),
                }
                records.sort_by_key(|r| r.registry.created_at);
            }
            Err(e) => warn!(report_id = %change.id, error = %e, "Skipping unreadable report"),
        },
        None => records.retain(|r| r.id != change.id),
    }
}

async fn follow(
    store: Arc<dyn DocumentStore>,
    records: watch::Sender<Vec<ReportRecord>>,
    mut changes: broadcast::Receiver<StoreChange>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    loop {
        tokio::select! {
            result = changes.recv() => {
                match result {
                    Ok(change) if change.collection == collections::REPORTS => {
                        debug!(report_id = %change.id, "Report record changed");
                        records.send_modify(|list| apply_change(list, change));
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Report feed lagged, relisting");
                        match load_records(store.as_ref()).await {
                            Ok(list) => {
                                records.send_replace(list);
                            }
                            Err(e) => warn!(error = %e, "Relisting reports failed"),
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }

            _ = shutdown_rx.recv() => break,
        }
    }

    debug!("Report feed stopped");
}

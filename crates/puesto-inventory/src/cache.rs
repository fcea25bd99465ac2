//! # Local Snapshot Cache
//!
//! Device-local key/value storage. Used to restore the screen state at
//! startup and while the document store is unreachable; never a source of
//! truth once the store answers.
//!
//! ## Keys
//! ```text
//! point            "A" | "B"                      chosen sale point
//! ventaIniciada    "true" | "false"               registry open flag
//! registroActual   JSON DailyRegistry             active registry
//! products         JSON [Product]                 last catalog seen
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use puesto_db::Database;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{InventoryError, InventoryResult};

pub mod keys {
    pub const POINT: &str = "point";
    pub const SALE_STARTED: &str = "ventaIniciada";
    pub const ACTIVE_REGISTRY: &str = "registroActual";
    pub const PRODUCTS: &str = "products";
}

#[async_trait]
pub trait LocalCache: Send + Sync {
    async fn get(&self, key: &str) -> InventoryResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> InventoryResult<()>;

    /// Removes keys. Missing keys are ignored.
    async fn remove(&self, keys: &[&str]) -> InventoryResult<()>;
}

/// Reads and decodes a JSON value. A value that does not decode is an error.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn LocalCache,
    key: &str,
) -> InventoryResult<Option<T>> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + Sync>(
    cache: &dyn LocalCache,
    key: &str,
    value: &T,
) -> InventoryResult<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw).await
}

// =============================================================================
// SQLite
// =============================================================================

/// Cache stored in the `local_cache` table of the device database.
#[derive(Clone)]
pub struct SqliteCache {
    db: Database,
}

impl SqliteCache {
    pub fn new(db: Database) -> Self {
        SqliteCache { db }
    }
}

#[async_trait]
impl LocalCache for SqliteCache {
    async fn get(&self, key: &str) -> InventoryResult<Option<String>> {
        self.db
            .cache()
            .get(key)
            .await
            .map_err(|e| InventoryError::Cache(e.to_string()))
    }

    async fn set(&self, key: &str, value: &str) -> InventoryResult<()> {
        self.db
            .cache()
            .set(key, value)
            .await
            .map_err(|e| InventoryError::Cache(e.to_string()))
    }

    async fn remove(&self, keys: &[&str]) -> InventoryResult<()> {
        self.db
            .cache()
            .remove(keys)
            .await
            .map_err(|e| InventoryError::Cache(e.to_string()))
    }
}

// =============================================================================
// Memory
// =============================================================================

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every entry, for assertions.
    pub async fn entries(&self) -> HashMap<String, String> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl LocalCache for MemoryCache {
    async fn get(&self, key: &str) -> InventoryResult<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> InventoryResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> InventoryResult<()> {
        let mut entries = self.entries.lock().await;
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

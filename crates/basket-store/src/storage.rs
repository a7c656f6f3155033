//! # Cart Storage
//!
//! Where persisted carts live between sessions.
//!
//! ## Backends
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      CartStorage (async trait)                          │
//! │                                                                         │
//! │   load(key)  ──► Option<PersistedCart>     hydration on open()          │
//! │   save(key)  ──► ()                        persister, newest revision   │
//! │   clear(key) ──► ()                        explicit reset               │
//! │                                                                         │
//! │   ┌────────────────────────┐        ┌───────────────────────────────┐  │
//! │   │ MemoryStorage          │        │ SqliteStorage                 │  │
//! │   │ HashMap<key, JSON>     │        │ basket-db cart_snapshots      │  │
//! │   │ injectable failures    │        │ upsert per write              │  │
//! │   └────────────────────────┘        └───────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both backends store the same JSON document, so a snapshot written by one
//! can be read by the other.

use async_trait::async_trait;
use basket_core::{CartPatch, CartState, LineItem};
use basket_db::Database;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Persisted Form
// =============================================================================

/// What gets written after each accepted transition.
///
/// Only the item list is durable. Loading and initialization flags describe
/// the running session and are rebuilt on hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedCart {
    pub items: Vec<LineItem>,
    pub revision: u64,
    pub saved_at: DateTime<Utc>,
}

impl PersistedCart {
    /// Captures `state` at `revision`.
    pub fn from_state(state: &CartState, revision: u64) -> Self {
        PersistedCart {
            items: state.items.clone(),
            revision,
            saved_at: Utc::now(),
        }
    }

    /// The Initialize payload that restores this cart.
    pub fn into_patch(self) -> CartPatch {
        CartPatch {
            items: Some(self.items),
            is_loading: Some(false),
            is_initialized: Some(true),
        }
    }
}

// =============================================================================
// Storage Trait
// =============================================================================

/// A place carts can be saved to and loaded from.
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Reads the cart stored under `key`, if any.
    async fn load(&self, key: &str) -> StoreResult<Option<PersistedCart>>;

    /// Replaces the cart stored under `key`.
    async fn save(&self, key: &str, cart: &PersistedCart) -> StoreResult<()>;

    /// Removes the cart stored under `key`.
    async fn clear(&self, key: &str) -> StoreResult<()>;
}

// =============================================================================
// Memory Backend
// =============================================================================

/// In-process storage. Used for tests and for sessions that should not
/// outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
    writes: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following `save` fail until switched back off.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// The stored JSON under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Stores `payload` under `key` without validation.
    pub fn insert_raw(&self, key: impl Into<String>, payload: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), payload.into());
    }
}

#[async_trait]
impl CartStorage for MemoryStorage {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, key: &str) -> StoreResult<Option<PersistedCart>> {
        match self.raw(key) {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, key: &str, cart: &PersistedCart) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::StorageUnavailable(
                "memory storage is rejecting writes".into(),
            ));
        }

        let payload = serde_json::to_string(cart)?;
        self.insert_raw(key, payload);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn clear(&self, key: &str) -> StoreResult<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

// =============================================================================
// SQLite Backend
// =============================================================================

/// Storage over the basket-db snapshot table.
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    pub fn new(db: Database) -> Self {
        SqliteStorage { db }
    }

    /// The underlying database handle.
    pub fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl CartStorage for SqliteStorage {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn load(&self, key: &str) -> StoreResult<Option<PersistedCart>> {
        let Some(row) = self.db.snapshots().get(key).await? else {
            return Ok(None);
        };

        debug!(key = %key, revision = row.revision, "Loaded cart snapshot");
        Ok(Some(serde_json::from_str(&row.payload)?))
    }

    async fn save(&self, key: &str, cart: &PersistedCart) -> StoreResult<()> {
        let payload = serde_json::to_string(cart)?;
        let revision = i64::try_from(cart.revision).unwrap_or(i64::MAX);
        self.db.snapshots().put(key, &payload, revision).await?;
        Ok(())
    }

    async fn clear(&self, key: &str) -> StoreResult<()> {
        self.db.snapshots().delete(key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_db::DbConfig;

    fn cart() -> PersistedCart {
        let mut state = CartState::new();
        state.items.push(LineItem::new("p1", 2).with_note("gift wrap"));
        state.items.push(LineItem::new("p2", 1).with_meta("size", "L"));
        PersistedCart::from_state(&state, 7)
    }

    #[test]
    fn test_persisted_json_shape() {
        let json = serde_json::to_value(cart()).unwrap();
        assert_eq!(json["revision"], 7);
        assert_eq!(json["items"][0]["productId"], "p1");
        assert_eq!(json["items"][1]["size"], "L");
        assert!(json.get("savedAt").is_some());
        assert!(json.get("isLoading").is_none());
    }

    #[test]
    fn test_into_patch_finishes_loading() {
        let patch = cart().into_patch();
        assert_eq!(patch.items.as_ref().map(Vec::len), Some(2));
        assert_eq!(patch.is_loading, Some(false));
        assert_eq!(patch.is_initialized, Some(true));
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let storage = MemoryStorage::new();
        assert!(storage.load("cart").await.unwrap().is_none());

        let saved = cart();
        storage.save("cart", &saved).await.unwrap();
        assert_eq!(storage.load("cart").await.unwrap(), Some(saved));
        assert_eq!(storage.write_count(), 1);

        storage.clear("cart").await.unwrap();
        assert!(storage.load("cart").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_injected_failure() {
        let storage = MemoryStorage::new();
        storage.set_fail_writes(true);

        let err = storage.save("cart", &cart()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(storage.raw("cart").is_none());
        assert_eq!(storage.write_count(), 0);

        storage.set_fail_writes(false);
        storage.save("cart", &cart()).await.unwrap();
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_corrupt_snapshot() {
        let storage = MemoryStorage::new();
        storage.insert_raw("cart", "{not json");

        let err = storage.load("cart").await.unwrap_err();
        assert!(matches!(err, StoreError::SerializationFailed(_)));
    }

    #[tokio::test]
    async fn test_sqlite_round_trip() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let storage = SqliteStorage::new(db.clone());

        assert!(storage.load("cart").await.unwrap().is_none());

        let saved = cart();
        storage.save("cart", &saved).await.unwrap();

        let loaded = storage.load("cart").await.unwrap().unwrap();
        assert_eq!(loaded.items, saved.items);
        assert_eq!(loaded.revision, 7);

        let row = db.snapshots().get("cart").await.unwrap().unwrap();
        assert_eq!(row.revision, 7);

        storage.clear("cart").await.unwrap();
        assert!(storage.load("cart").await.unwrap().is_none());
    }
}

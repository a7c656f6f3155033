//! # Cart Store
//!
//! The single owner of the current cart. UI surfaces dispatch intents to it
//! and subscribe to its state; the persister mirrors it to storage.
//!
//! ## Dispatch Path
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CartStore::dispatch                              │
//! │                                                                         │
//! │  intent ──► lock(committed) ──► transition(state, &intent)             │
//! │                                        │                                │
//! │                     ┌──────────────────┴──────────────────┐             │
//! │                     ▼                                     ▼             │
//! │              same Arc (no-op)                      new Arc              │
//! │              return it, nothing                    revision += 1        │
//! │              published                             state_tx ──► UI      │
//! │                                                    snapshot_tx ──►      │
//! │                                                       Persister         │
//! │                                                                         │
//! │  The lock covers reduce + publish, so intents apply one at a time in   │
//! │  arrival order and subscribers never see revisions out of order.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//! ```text
//! open()      load snapshot ──► spawn Persister ──► dispatch(Initialize)
//! dispatch()  any number of times, from any thread
//! flush()     wait until the newest revision reached storage
//! shutdown()  stop the Persister after one last write
//! ```

use basket_core::{transition, CartPatch, CartState, Intent};
use basket_db::{Database, DbConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{StorageBackend, StoreConfig};
use crate::error::{StoreError, StoreResult};
use crate::persister::{PersistStats, Persister, PersisterHandle, Snapshot};
use crate::storage::{CartStorage, MemoryStorage, SqliteStorage};

// =============================================================================
// Store
// =============================================================================

struct Committed {
    state: Arc<CartState>,
    revision: u64,
}

struct Inner {
    committed: Mutex<Committed>,
    state_tx: watch::Sender<Arc<CartState>>,
    snapshot_tx: watch::Sender<Snapshot>,
    persister: Option<PersisterHandle>,
    task: Mutex<Option<JoinHandle<()>>>,
    flush_timeout: Duration,
    closed: AtomicBool,
}

/// Handle to the cart store. Clones share the same cart.
#[derive(Clone)]
pub struct CartStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("revision", &self.revision())
            .field("items", &self.state().item_count())
            .finish()
    }
}

impl CartStore {
    /// Opens a store over `storage` and hydrates it.
    ///
    /// A snapshot that cannot be read is logged and treated as an empty
    /// cart; the store still opens.
    pub async fn open(config: &StoreConfig, storage: Arc<dyn CartStorage>) -> StoreResult<Self> {
        config.validate()?;

        let key = config.key().to_string();

        let loaded = match storage.load(&key).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!(
                    backend = storage.name(),
                    key = %key,
                    error = %e,
                    "Could not read saved cart, starting empty"
                );
                None
            }
        };

        let base_revision = loaded.as_ref().map(|cart| cart.revision).unwrap_or(0);
        let hydrate = match loaded {
            Some(cart) => {
                info!(
                    backend = storage.name(),
                    items = cart.items.len(),
                    revision = cart.revision,
                    "Restoring saved cart"
                );
                cart.into_patch()
            }
            None => CartPatch {
                items: None,
                is_loading: Some(false),
                is_initialized: Some(true),
            },
        };

        let initial = Arc::new(CartState::new());
        let (state_tx, _) = watch::channel(initial.clone());
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            revision: base_revision,
            state: initial.clone(),
        });

        let (persister, task) = if config.persist.enabled {
            let (persister, handle) =
                Persister::new(storage.clone(), key, config.debounce(), snapshot_rx);
            (Some(handle), Some(tokio::spawn(persister.run())))
        } else {
            debug!("Persistence disabled");
            (None, None)
        };

        let store = CartStore {
            inner: Arc::new(Inner {
                committed: Mutex::new(Committed {
                    state: initial,
                    revision: base_revision,
                }),
                state_tx,
                snapshot_tx,
                persister,
                task: Mutex::new(task),
                flush_timeout: config.flush_timeout(),
                closed: AtomicBool::new(false),
            }),
        };

        store.dispatch(Intent::Initialize(hydrate));

        info!(
            backend = storage.name(),
            revision = store.revision(),
            "Cart store opened"
        );

        Ok(store)
    }

    /// Opens a store with the backend named in `config`.
    pub async fn open_from_config(config: &StoreConfig) -> StoreResult<Self> {
        let storage: Arc<dyn CartStorage> = match config.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Sqlite => {
                let path = config.database_path().ok_or_else(|| {
                    StoreError::InvalidConfig("no database path for sqlite backend".into())
                })?;

                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| StoreError::StorageUnavailable(e.to_string()))?;
                    }
                }

                let db = Database::new(DbConfig::new(path)).await?;
                Arc::new(SqliteStorage::new(db))
            }
        };

        Self::open(config, storage).await
    }

    // =========================================================================
    // Intents
    // =========================================================================

    /// Applies `intent` and returns the resulting state.
    ///
    /// When the intent changes nothing the previous `Arc` comes back
    /// untouched and neither subscribers nor storage hear about it.
    pub fn dispatch(&self, intent: Intent) -> Arc<CartState> {
        let mut committed = self
            .inner
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let next = transition(committed.state.clone(), &intent);

        if Arc::ptr_eq(&next, &committed.state) {
            if intent.is_unknown() {
                warn!(kind = intent.kind(), "Ignoring unknown intent");
            } else {
                debug!(
                    kind = intent.kind(),
                    revision = committed.revision,
                    "Intent left cart unchanged"
                );
            }
            return next;
        }

        committed.revision += 1;
        committed.state = next.clone();
        let revision = committed.revision;

        self.inner.state_tx.send_replace(next.clone());
        self.inner.snapshot_tx.send_replace(Snapshot {
            revision,
            state: next.clone(),
        });
        drop(committed);

        debug!(
            kind = intent.kind(),
            revision,
            items = next.item_count(),
            "Intent applied"
        );

        next
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Current state.
    pub fn state(&self) -> Arc<CartState> {
        self.inner
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
            .clone()
    }

    /// Number of accepted transitions, counted from the saved cart's revision.
    pub fn revision(&self) -> u64 {
        self.inner
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .revision
    }

    /// Receiver notified after every accepted transition.
    ///
    /// The current state counts as seen; `changed()` resolves on the next one.
    pub fn subscribe(&self) -> watch::Receiver<Arc<CartState>> {
        self.inner.state_tx.subscribe()
    }

    /// Persister counters, if persistence is enabled.
    pub fn persist_stats(&self) -> Option<PersistStats> {
        self.inner.persister.as_ref().map(PersisterHandle::stats)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Waits until the newest revision has been handed to storage.
    ///
    /// Returns once the write was attempted. A failed write is not an
    /// error here; see [`CartStore::persist_stats`].
    pub async fn flush(&self) -> StoreResult<()> {
        let Some(persister) = &self.inner.persister else {
            return Ok(());
        };

        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(StoreError::ShuttingDown);
        }

        let target = self.revision();
        persister.wait_for(target, self.inner.flush_timeout).await?;
        Ok(())
    }

    /// Stops the persister after one last write. Idempotent.
    ///
    /// Dispatch keeps working afterwards, but nothing more is saved.
    pub async fn shutdown(&self) -> StoreResult<()> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!(revision = self.revision(), "Shutting down cart store");

        if let Some(persister) = &self.inner.persister {
            if let Err(e) = persister.shutdown().await {
                debug!(error = %e, "Persister already stopped");
            }
        }

        let task = self
            .inner
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            match tokio::time::timeout(self.inner.flush_timeout, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(StoreError::ChannelError(e.to_string())),
                Err(_) => {
                    return Err(StoreError::Timeout(
                        self.inner.flush_timeout.as_millis() as u64
                    ))
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basket_core::intent::{add_item, clear_cart, remove_item, set_loading, update_quantity};
    use basket_core::LineItem;
    use crate::storage::PersistedCart;

    async fn memory_store(config: StoreConfig) -> (CartStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::new());
        let store = CartStore::open(&config, storage.clone()).await.unwrap();
        (store, storage)
    }

    #[tokio::test]
    async fn test_open_empty_finishes_loading() {
        let (store, storage) = memory_store(StoreConfig::in_memory()).await;

        let state = store.state();
        assert!(state.items.is_empty());
        assert!(!state.is_loading);
        assert!(state.is_initialized);
        assert_eq!(store.revision(), 1);

        store.flush().await.unwrap();
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_scenario() {
        let (store, _storage) = memory_store(StoreConfig::in_memory()).await;

        store.dispatch(add_item(LineItem::new("p1", 2)));
        store.dispatch(add_item(LineItem::new("p1", 3)));
        store.dispatch(add_item(LineItem::new("p2", 1)));
        store.dispatch(update_quantity("p2", 4));
        let state = store.dispatch(remove_item("p1"));

        assert_eq!(state.items, vec![LineItem::new("p2", 4)]);
        assert_eq!(store.state(), state);
    }

    #[tokio::test]
    async fn test_hydrates_saved_cart() {
        let storage = Arc::new(MemoryStorage::new());
        let mut saved = CartState::new();
        saved.items.push(LineItem::new("p1", 2).with_note("no onions"));
        storage
            .save("cart", &PersistedCart::from_state(&saved, 41))
            .await
            .unwrap();

        let store = CartStore::open(&StoreConfig::in_memory(), storage.clone())
            .await
            .unwrap();

        let state = store.state();
        assert_eq!(state.items, saved.items);
        assert!(state.is_initialized);
        assert!(!state.is_loading);
        assert_eq!(store.revision(), 42);
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_opens_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.insert_raw("cart", "][");

        let store = CartStore::open(&StoreConfig::in_memory(), storage.clone())
            .await
            .unwrap();

        assert!(store.state().is_empty());
        assert!(store.state().is_initialized);

        store.dispatch(add_item(LineItem::new("p1", 1)));
        store.flush().await.unwrap();
        let stored = storage.load("cart").await.unwrap().unwrap();
        assert_eq!(stored.items.len(), 1);
    }

    #[tokio::test]
    async fn test_noop_returns_same_state_and_is_not_published() {
        let (store, storage) = memory_store(StoreConfig::in_memory()).await;
        store.flush().await.unwrap();

        let mut rx = store.subscribe();
        let before = store.state();
        let writes = storage.write_count();

        let after = store.dispatch(remove_item("missing"));
        let after_unknown = store.dispatch(
            serde_json::from_str(r#"{"type":"APPLY_COUPON","payload":{"code":"X"}}"#).unwrap(),
        );

        assert!(Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&before, &after_unknown));
        assert_eq!(store.revision(), 1);
        assert!(!rx.has_changed().unwrap());

        store.flush().await.unwrap();
        assert_eq!(storage.write_count(), writes);
    }

    #[tokio::test]
    async fn test_subscriber_sees_accepted_transitions() {
        let (store, _storage) = memory_store(StoreConfig::in_memory()).await;
        let mut rx = store.subscribe();

        store.dispatch(add_item(LineItem::new("p1", 1)));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().total_quantity(), 1);

        store.dispatch(set_loading(true));
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_loading);
    }

    #[tokio::test]
    async fn test_failed_write_keeps_state() {
        let (store, storage) = memory_store(StoreConfig::in_memory()).await;
        store.flush().await.unwrap();

        storage.set_fail_writes(true);
        let state = store.dispatch(add_item(LineItem::new("p1", 3)));
        store.flush().await.unwrap();

        assert_eq!(store.state(), state);
        let stats = store.persist_stats().unwrap();
        assert_eq!(stats.failures, 1);
        assert!(stats.last_error.is_some());

        storage.set_fail_writes(false);
        store.dispatch(add_item(LineItem::new("p1", 1)));
        store.flush().await.unwrap();

        let stored = storage.load("cart").await.unwrap().unwrap();
        assert_eq!(stored.items, vec![LineItem::new("p1", 4)]);
        assert_eq!(stored.revision, store.revision());
    }

    #[tokio::test]
    async fn test_persistence_disabled() {
        let mut config = StoreConfig::in_memory();
        config.persist.enabled = false;
        let (store, storage) = memory_store(config).await;

        store.dispatch(add_item(LineItem::new("p1", 1)));
        store.flush().await.unwrap();

        assert!(store.persist_stats().is_none());
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_dispatch_serializes() {
        let (store, _storage) = memory_store(StoreConfig::in_memory()).await;

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    for _ in 0..25 {
                        store.dispatch(add_item(LineItem::new("p1", 1)));
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        let state = store.state();
        assert_eq!(state.item_count(), 1);
        assert_eq!(state.total_quantity(), 200);
        assert_eq!(store.revision(), 201);
    }

    #[tokio::test]
    async fn test_shutdown_writes_final_state() {
        let mut config = StoreConfig::in_memory();
        config.persist.debounce_ms = 60_000;
        let (store, storage) = memory_store(config).await;

        store.dispatch(add_item(LineItem::new("p1", 2)));
        store.dispatch(clear_cart());
        store.dispatch(add_item(LineItem::new("p9", 9)));
        store.shutdown().await.unwrap();
        store.shutdown().await.unwrap();

        let stored = storage.load("cart").await.unwrap().unwrap();
        assert_eq!(stored.items, vec![LineItem::new("p9", 9)]);
        assert_eq!(stored.revision, store.revision());
        assert!(matches!(store.flush().await, Err(StoreError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_restart_restores_from_sqlite() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = StoreConfig::in_memory();

        let store = CartStore::open(&config, Arc::new(SqliteStorage::new(db.clone())))
            .await
            .unwrap();
        store.dispatch(add_item(LineItem::new("p1", 2).with_meta("color", "red")));
        store.dispatch(add_item(LineItem::new(7u64, 1)));
        let before = store.state();
        let revision = store.revision();
        store.shutdown().await.unwrap();

        let reopened = CartStore::open(&config, Arc::new(SqliteStorage::new(db)))
            .await
            .unwrap();

        assert_eq!(reopened.state().items, before.items);
        assert_eq!(reopened.revision(), revision + 1);
    }
}

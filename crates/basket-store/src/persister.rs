//! # Persister
//!
//! Background task that mirrors accepted cart transitions to storage.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Persister Flow                                 │
//! │                                                                         │
//! │  dispatch() ──► watch::Sender<Snapshot>    (send_replace, never blocks) │
//! │                        │                                                │
//! │                        ▼                                                │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       Persister::run                            │   │
//! │  │                                                                 │   │
//! │  │  1. Wake: snapshots.changed()                                  │   │
//! │  │  2. Debounce: sleep(debounce) so a burst settles               │   │
//! │  │  3. Take newest: borrow_and_update() (older revisions skipped) │   │
//! │  │  4. Write: storage.save(key, PersistedCart)                    │   │
//! │  │  5. Report: stats_tx.send_replace(PersistStats)                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  FAILURES: logged with warn!, counted, never retried on their own.     │
//! │  The next accepted transition writes the whole cart again.             │
//! │                                                                         │
//! │  SHUTDOWN: one last write if the newest revision is not yet saved.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use basket_core::CartState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::storage::{CartStorage, PersistedCart};

// =============================================================================
// Messages
// =============================================================================

/// A committed state and the revision it was committed at.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub revision: u64,
    pub state: Arc<CartState>,
}

/// Counters published after every write attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Successful writes.
    pub writes: u64,

    /// Failed writes.
    pub failures: u64,

    /// Newest revision known to be in storage.
    pub last_saved: u64,

    /// Newest revision handed to storage, successfully or not.
    pub last_attempted: u64,

    /// Message of the most recent failure, cleared by the next success.
    pub last_error: Option<String>,
}

// =============================================================================
// Persister
// =============================================================================

/// Writes the newest snapshot to storage whenever it changes.
pub struct Persister {
    storage: Arc<dyn CartStorage>,
    key: String,
    debounce: Duration,
    snapshots: watch::Receiver<Snapshot>,
    stats: PersistStats,
    stats_tx: watch::Sender<PersistStats>,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for observing and stopping the persister.
#[derive(Debug, Clone)]
pub struct PersisterHandle {
    stats_rx: watch::Receiver<PersistStats>,
    shutdown_tx: mpsc::Sender<()>,
}

impl PersisterHandle {
    /// Latest published counters.
    pub fn stats(&self) -> PersistStats {
        self.stats_rx.borrow().clone()
    }

    /// Waits until `revision` has been handed to storage.
    ///
    /// Resolves once the write was attempted, whether or not it succeeded;
    /// check `last_error` on the returned stats to tell the two apart.
    pub async fn wait_for(&self, revision: u64, timeout: Duration) -> StoreResult<PersistStats> {
        let mut rx = self.stats_rx.clone();

        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|s| s.last_attempted >= revision)
                .await
                .map(|stats| stats.clone())
        })
        .await;

        match waited {
            Ok(Ok(stats)) => Ok(stats),
            Ok(Err(_)) => Err(StoreError::ShuttingDown),
            Err(_) => Err(StoreError::Timeout(timeout.as_millis() as u64)),
        }
    }

    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|e| StoreError::ChannelError(e.to_string()))
    }
}

impl Persister {
    /// Creates a persister reading from `snapshots`.
    ///
    /// Whatever `snapshots` holds right now counts as already stored.
    pub fn new(
        storage: Arc<dyn CartStorage>,
        key: impl Into<String>,
        debounce: Duration,
        mut snapshots: watch::Receiver<Snapshot>,
    ) -> (Self, PersisterHandle) {
        let base = snapshots.borrow_and_update().revision;
        let stats = PersistStats {
            last_saved: base,
            last_attempted: base,
            ..PersistStats::default()
        };

        let (stats_tx, stats_rx) = watch::channel(stats.clone());
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let persister = Persister {
            storage,
            key: key.into(),
            debounce,
            snapshots,
            stats,
            stats_tx,
            shutdown_rx,
        };

        let handle = PersisterHandle {
            stats_rx,
            shutdown_tx,
        };

        (persister, handle)
    }

    /// Runs until shutdown is requested or the store is dropped.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(
            backend = self.storage.name(),
            key = %self.key,
            debounce_ms = self.debounce.as_millis() as u64,
            "Persister starting"
        );

        loop {
            tokio::select! {
                changed = self.snapshots.changed() => {
                    if changed.is_err() {
                        debug!("Cart store dropped");
                        break;
                    }

                    if !self.debounce.is_zero() {
                        let stop = tokio::select! {
                            _ = tokio::time::sleep(self.debounce) => false,
                            _ = self.shutdown_rx.recv() => true,
                        };
                        if stop {
                            break;
                        }
                    }

                    self.write_newest().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Persister shutting down");
                    break;
                }
            }
        }

        let newest = self.snapshots.borrow_and_update().revision;
        if newest > self.stats.last_saved {
            debug!(revision = newest, "Final write before stopping");
            self.write_newest_unconditionally().await;
        }

        info!(
            writes = self.stats.writes,
            failures = self.stats.failures,
            last_saved = self.stats.last_saved,
            "Persister stopped"
        );
    }

    /// Writes the newest snapshot unless it has already been attempted.
    async fn write_newest(&mut self) {
        let revision = self.snapshots.borrow().revision;
        if revision <= self.stats.last_attempted {
            return;
        }
        self.write_newest_unconditionally().await;
    }

    async fn write_newest_unconditionally(&mut self) {
        let snapshot = self.snapshots.borrow_and_update().clone();
        let cart = PersistedCart::from_state(&snapshot.state, snapshot.revision);

        match self.storage.save(&self.key, &cart).await {
            Ok(()) => {
                self.stats.writes += 1;
                self.stats.last_saved = snapshot.revision;
                self.stats.last_error = None;
                debug!(
                    revision = snapshot.revision,
                    items = cart.items.len(),
                    "Cart persisted"
                );
            }
            Err(e) => {
                self.stats.failures += 1;
                self.stats.last_error = Some(e.to_string());
                warn!(
                    revision = snapshot.revision,
                    retryable = e.is_retryable(),
                    error = %e,
                    "Failed to persist cart"
                );
            }
        }

        self.stats.last_attempted = self.stats.last_attempted.max(snapshot.revision);
        self.stats_tx.send_replace(self.stats.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use basket_core::LineItem;

    fn snapshot(revision: u64, quantity: i64) -> Snapshot {
        let mut state = CartState::new();
        state.items.push(LineItem::new("p1", quantity));
        Snapshot {
            revision,
            state: Arc::new(state),
        }
    }

    fn start(
        storage: Arc<MemoryStorage>,
        debounce: Duration,
    ) -> (watch::Sender<Snapshot>, PersisterHandle, tokio::task::JoinHandle<()>) {
        let (tx, rx) = watch::channel(snapshot(0, 0));
        let (persister, handle) = Persister::new(storage, "cart", debounce, rx);
        let task = tokio::spawn(persister.run());
        (tx, handle, task)
    }

    const WAIT: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_initial_snapshot_is_not_written() {
        let storage = Arc::new(MemoryStorage::new());
        let (_tx, handle, _task) = start(storage.clone(), Duration::ZERO);

        let stats = handle.wait_for(0, WAIT).await.unwrap();
        assert_eq!(stats.writes, 0);
        assert!(storage.raw("cart").is_none());
    }

    #[tokio::test]
    async fn test_writes_newest_revision() {
        let storage = Arc::new(MemoryStorage::new());
        let (tx, handle, _task) = start(storage.clone(), Duration::ZERO);

        tx.send_replace(snapshot(1, 1));
        tx.send_replace(snapshot(2, 2));
        tx.send_replace(snapshot(3, 3));

        let stats = handle.wait_for(3, WAIT).await.unwrap();
        assert_eq!(stats.last_saved, 3);
        assert!(stats.writes <= 3);

        let stored = storage.load("cart").await.unwrap().unwrap();
        assert_eq!(stored.revision, 3);
        assert_eq!(stored.items[0].quantity, 3);
    }

    #[tokio::test]
    async fn test_failure_is_counted_and_cleared() {
        let storage = Arc::new(MemoryStorage::new());
        let (tx, handle, _task) = start(storage.clone(), Duration::ZERO);

        storage.set_fail_writes(true);
        tx.send_replace(snapshot(1, 1));
        let stats = handle.wait_for(1, WAIT).await.unwrap();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.last_saved, 0);
        assert!(stats.last_error.is_some());

        storage.set_fail_writes(false);
        tx.send_replace(snapshot(2, 2));
        let stats = handle.wait_for(2, WAIT).await.unwrap();
        assert_eq!(stats.writes, 1);
        assert_eq!(stats.last_saved, 2);
        assert!(stats.last_error.is_none());
    }

    #[tokio::test]
    async fn test_debounce_coalesces_burst() {
        let storage = Arc::new(MemoryStorage::new());
        let (tx, handle, _task) = start(storage.clone(), Duration::from_millis(50));

        for revision in 1..=20 {
            tx.send_replace(snapshot(revision, revision as i64));
        }

        let stats = handle.wait_for(20, WAIT).await.unwrap();
        assert_eq!(stats.writes, 1);
        assert_eq!(storage.write_count(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_writes_pending_snapshot() {
        let storage = Arc::new(MemoryStorage::new());
        let (tx, handle, task) = start(storage.clone(), Duration::from_secs(60));

        tx.send_replace(snapshot(1, 5));
        handle.shutdown().await.unwrap();
        task.await.unwrap();

        let stored = storage.load("cart").await.unwrap().unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.items[0].quantity, 5);
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let storage = Arc::new(MemoryStorage::new());
        let (_tx, handle, _task) = start(storage, Duration::ZERO);

        let err = handle
            .wait_for(5, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout(20)));
    }
}

//! # basket-store: Cart Store Runtime for Basket
//!
//! Owns the live cart, applies intents through the basket-core reducer, and
//! mirrors every accepted transition to storage in the background.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Cart Store Architecture                          │
//! │                                                                         │
//! │   UI surfaces                                                           │
//! │   ┌───────────┐  dispatch(Intent)   ┌──────────────────────────────┐   │
//! │   │ product   │ ──────────────────► │          CartStore           │   │
//! │   │ page,     │                     │                              │   │
//! │   │ drawer,   │ ◄────────────────── │  Mutex<Committed>            │   │
//! │   │ checkout  │  watch::Receiver    │  (Arc<CartState>, revision)  │   │
//! │   └───────────┘                     └──────────────┬───────────────┘   │
//! │                                                    │ watch<Snapshot>    │
//! │                                                    ▼                    │
//! │                                     ┌──────────────────────────────┐   │
//! │                                     │     Persister (tokio task)   │   │
//! │                                     │  newest revision only,       │   │
//! │                                     │  optional debounce,          │   │
//! │                                     │  failures logged, not fatal  │   │
//! │                                     └──────────────┬───────────────┘   │
//! │                                                    ▼                    │
//! │                                     ┌──────────────────────────────┐   │
//! │                                     │  CartStorage                 │   │
//! │                                     │  MemoryStorage │ SqliteStorage│  │
//! │                                     └──────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Storage backend, key, and persistence tuning
//! - [`error`] - Store error types
//! - [`persister`] - Background writer
//! - [`storage`] - Storage trait and backends
//! - [`store`] - The `CartStore` handle
//!
//! ## Usage
//!
//! ```rust,ignore
//! use basket_core::{intent, LineItem};
//! use basket_store::{CartStore, StoreConfig};
//!
//! let config = StoreConfig::load_or_default(None);
//! let store = CartStore::open_from_config(&config).await?;
//!
//! let mut updates = store.subscribe();
//! store.dispatch(intent::add_item(LineItem::new("p1", 2)));
//!
//! updates.changed().await?;
//! println!("Items: {}", updates.borrow().item_count());
//!
//! store.shutdown().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod persister;
pub mod storage;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{PersistSettings, StorageBackend, StorageSettings, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use persister::{PersistStats, Persister, PersisterHandle, Snapshot};
pub use storage::{CartStorage, MemoryStorage, PersistedCart, SqliteStorage};
pub use store::CartStore;

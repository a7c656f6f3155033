//! # Store Error Types
//!
//! Error types for the store runtime and its synchronization layer.
//!
//! ## Where Errors Surface
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Store Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │    Storage      │  │     Runtime             │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  StorageFailed  │  │  ChannelError           │ │
//! │  │  ConfigLoad...  │  │  Unavailable    │  │  Timeout                │ │
//! │  │  ConfigSave...  │  │  Serialization  │  │  ShuttingDown           │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Returned from: open(), flush(), shutdown(), config load/save.         │
//! │  NEVER returned from dispatch(): a failed write is logged by the       │
//! │  persister and the in-memory cart stays as the reducer left it.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store error type.
#[derive(Debug, Error)]
pub enum StoreError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid store configuration.
    #[error("Invalid store configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Storage Errors
    // =========================================================================
    /// The storage backend rejected the operation.
    #[error("Storage error: {0}")]
    StorageFailed(String),

    /// The storage backend is not reachable right now.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Snapshot could not be encoded or decoded.
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Channel send/receive failed.
    #[error("Channel error: {0}")]
    ChannelError(String),

    /// Waited too long for the persister.
    #[error("Timed out after {0} ms")]
    Timeout(u64),

    /// The store has been shut down.
    #[error("Cart store is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<basket_db::DbError> for StoreError {
    fn from(err: basket_db::DbError) -> Self {
        match err {
            basket_db::DbError::ConnectionFailed(msg) => StoreError::StorageUnavailable(msg),
            basket_db::DbError::PoolExhausted => {
                StoreError::StorageUnavailable("connection pool exhausted".into())
            }
            other => StoreError::StorageFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::SerializationFailed(err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(err: toml::de::Error) -> Self {
        StoreError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for StoreError {
    fn from(err: toml::ser::Error) -> Self {
        StoreError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl StoreError {
    /// Returns true if the next write may succeed without intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::StorageUnavailable(_) | StoreError::Timeout(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidConfig(_)
                | StoreError::ConfigLoadFailed(_)
                | StoreError::ConfigSaveFailed(_)
        )
    }
}

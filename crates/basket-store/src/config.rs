//! # Store Configuration
//!
//! Where the cart is persisted and how eagerly.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BASKET_STORAGE_BACKEND=memory                                      │
//! │     BASKET_DB_PATH=/tmp/basket.db                                      │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/basket/store.toml (Linux)                                │
//! │     ~/Library/Application Support/com.basket.cart/store.toml (macOS)   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     sqlite backend in the platform data dir, key "cart"                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # store.toml
//! [storage]
//! backend = "sqlite"   # memory | sqlite
//! database_path = "/var/lib/basket/basket.db"
//! key = "cart"
//!
//! [persist]
//! enabled = true
//! debounce_ms = 0
//! flush_timeout_ms = 2000
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Storage Backend
// =============================================================================

/// Which persistence medium backs the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process-local map. Nothing survives a restart.
    Memory,

    /// SQLite file through basket-db.
    #[default]
    Sqlite,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Memory => write!(f, "memory"),
            StorageBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" | "mem" | "none" => Ok(StorageBackend::Memory),
            "sqlite" | "db" => Ok(StorageBackend::Sqlite),
            other => Err(StoreError::InvalidConfig(format!(
                "Unknown storage backend: '{}'. Valid options: memory, sqlite",
                other
            ))),
        }
    }
}

// =============================================================================
// Sections
// =============================================================================

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub backend: StorageBackend,

    /// SQLite file. Defaults to the platform data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Key the cart snapshot is stored under.
    #[serde(default = "default_key")]
    pub key: String,
}

fn default_key() -> String {
    "cart".to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            backend: StorageBackend::default(),
            database_path: None,
            key: default_key(),
        }
    }
}

/// `[persist]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistSettings {
    /// Mirror accepted transitions to storage at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Wait this long after a change before writing, so bursts of intents
    /// collapse into one write. 0 writes immediately.
    #[serde(default)]
    pub debounce_ms: u64,

    /// Upper bound for `flush()` and `shutdown()`.
    #[serde(default = "default_flush_timeout")]
    pub flush_timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_flush_timeout() -> u64 {
    2000
}

impl Default for PersistSettings {
    fn default() -> Self {
        PersistSettings {
            enabled: true,
            debounce_ms: 0,
            flush_timeout_ms: default_flush_timeout(),
        }
    }
}

// =============================================================================
// Main Store Configuration
// =============================================================================

/// Complete store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub persist: PersistSettings,
}

impl StoreConfig {
    /// Creates a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config for an ephemeral, memory-backed store.
    pub fn in_memory() -> Self {
        StoreConfig {
            storage: StorageSettings {
                backend: StorageBackend::Memory,
                ..StorageSettings::default()
            },
            ..StoreConfig::default()
        }
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (store.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> StoreResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading store config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load store config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> StoreResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| StoreError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| StoreError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "Store config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> StoreResult<()> {
        if self.storage.key.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "storage.key must not be empty".into(),
            ));
        }

        if self.persist.flush_timeout_ms == 0 {
            return Err(StoreError::InvalidConfig(
                "persist.flush_timeout_ms must be greater than 0".into(),
            ));
        }

        if self.storage.backend == StorageBackend::Sqlite && self.database_path().is_none() {
            return Err(StoreError::InvalidConfig(
                "sqlite backend needs storage.database_path (no platform data dir found)".into(),
            ));
        }

        Ok(())
    }

    /// Applies `BASKET_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies overrides from any variable source.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(backend) = lookup("BASKET_STORAGE_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding storage backend from environment");
                    self.storage.backend = parsed;
                }
                Err(_) => warn!(backend = %backend, "Unknown storage backend in environment"),
            }
        }

        if let Some(path) = lookup("BASKET_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.storage.database_path = Some(PathBuf::from(path));
        }

        if let Some(key) = lookup("BASKET_CART_KEY") {
            self.storage.key = key;
        }

        if let Some(ms) = lookup("BASKET_PERSIST_DEBOUNCE_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.persist.debounce_ms = ms;
            }
        }

        if let Some(ms) = lookup("BASKET_FLUSH_TIMEOUT_MS") {
            if let Ok(ms) = ms.parse::<u64>() {
                self.persist.flush_timeout_ms = ms;
            }
        }
    }

    fn project_dirs() -> Option<directories::ProjectDirs> {
        directories::ProjectDirs::from("com", "basket", "cart")
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        Self::project_dirs().map(|dirs| dirs.config_dir().join("store.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Returns the SQLite file path, explicit or platform default.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.storage
            .database_path
            .clone()
            .or_else(|| Self::project_dirs().map(|dirs| dirs.data_dir().join("basket.db")))
    }

    /// Returns the storage key.
    pub fn key(&self) -> &str {
        &self.storage.key
    }

    /// Returns the debounce window.
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.persist.debounce_ms)
    }

    /// Returns the flush/shutdown timeout.
    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.persist.flush_timeout_ms)
    }
}

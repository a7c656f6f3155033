//! # Snapshot Repository
//!
//! Opaque key-value storage for persisted carts.
//!
//! ## Table Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  cart_snapshots                                                         │
//! │                                                                         │
//! │  key   │ payload (JSON, opaque) │ revision │ updated_at                 │
//! │  ──────┼────────────────────────┼──────────┼─────────────────────────── │
//! │  cart  │ {"items":[...],...}    │ 42       │ 2025-01-28T10:15:00Z       │
//! │                                                                         │
//! │  One row per key. `put` is an upsert: the latest write wins.           │
//! │  Write ordering comes from the single persister task upstream.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;

/// One stored snapshot.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct SnapshotRow {
    pub key: String,
    pub payload: String,
    pub revision: i64,
    pub updated_at: DateTime<Utc>,
}

/// Repository for snapshot rows.
#[derive(Debug, Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
}

impl SnapshotRepository {
    /// Creates a new SnapshotRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SnapshotRepository { pool }
    }

    /// Reads the snapshot stored under `key`.
    ///
    /// ## Returns
    /// * `Ok(None)` - nothing stored yet
    pub async fn get(&self, key: &str) -> DbResult<Option<SnapshotRow>> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT key, payload, revision, updated_at
            FROM cart_snapshots
            WHERE key = ?1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Writes `payload` under `key`, replacing any previous row.
    pub async fn put(&self, key: &str, payload: &str, revision: i64) -> DbResult<SnapshotRow> {
        let now = Utc::now();

        debug!(key = %key, revision, bytes = payload.len(), "Writing snapshot");

        sqlx::query(
            r#"
            INSERT INTO cart_snapshots (key, payload, revision, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                revision = excluded.revision,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(payload)
        .bind(revision)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(SnapshotRow {
            key: key.to_string(),
            payload: payload.to_string(),
            revision,
            updated_at: now,
        })
    }

    /// Deletes the snapshot under `key`.
    ///
    /// ## Returns
    /// True if a row was removed.
    pub async fn delete(&self, key: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM cart_snapshots WHERE key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists all stored keys, sorted.
    pub async fn keys(&self) -> DbResult<Vec<String>> {
        let keys = sqlx::query_scalar::<_, String>("SELECT key FROM cart_snapshots ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        Ok(keys)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

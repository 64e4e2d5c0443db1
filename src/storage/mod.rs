//! Durable local store - async key-value persistence over SQLite
//!
//! Each store is scoped to a named instance (one database file per instance)
//! so app data never collides with unrelated keys. Values are JSON text,
//! mirroring the browser-storage layer this replaces.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Async key-value store backed by a per-instance SQLite file.
///
/// The connection sits behind a `tokio::sync::Mutex`, so individual
/// operations are serialized. Read-modify-write sequences spanning several
/// operations are serialized by the owning component (see `MutationQueue`
/// and `RecordRepository`).
pub struct LocalStore {
    db: Mutex<Connection>,
    instance: String,
}

impl LocalStore {
    /// Open (or create) the store for a named instance under `data_dir`.
    pub fn open(data_dir: &Path, instance: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir).context("creating data directory")?;
        let db_path = data_dir.join(format!("{instance}.db"));
        let db = Connection::open(&db_path)
            .with_context(|| format!("opening database at {}", db_path.display()))?;

        // Enable WAL mode for concurrent read access
        db.execute_batch("PRAGMA journal_mode=WAL;")?;

        db.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );",
        )?;

        info!(path = %db_path.display(), instance, "Local store opened");

        Ok(Self {
            db: Mutex::new(db),
            instance: instance.to_string(),
        })
    }

    /// Name of the instance this store is scoped to.
    pub fn instance(&self) -> &str {
        &self.instance
    }

    /// Fetch and deserialize the value under `key`, if present.
    pub async fn get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let db = self.db.lock().await;
        let mut stmt = db.prepare_cached("SELECT value FROM kv WHERE key = ?1")?;

        let result = stmt.query_row([key], |row| row.get::<_, String>(0));

        match result {
            Ok(json) => {
                let value = serde_json::from_str(&json)
                    .with_context(|| format!("decoding stored value for key {key}"))?;
                Ok(Some(value))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize and persist `value` under `key`, replacing any prior value.
    pub async fn set_item<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)
            .with_context(|| format!("encoding value for key {key}"))?;

        let db = self.db.lock().await;
        db.execute(
            "INSERT INTO kv (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = strftime('%s', 'now')",
            rusqlite::params![key, json],
        )?;
        debug!(key, bytes = json.len(), "Stored value");
        Ok(())
    }

    /// Delete the value under `key`, if present.
    pub async fn remove_item(&self, key: &str) -> Result<()> {
        let db = self.db.lock().await;
        db.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        debug!(key, "Removed value");
        Ok(())
    }
}

//! Record repository - the authoritative historical expense list
//!
//! Holds every record ever saved locally, synced or not, for display and
//! reporting. Sole owner of the `expense-history` storage key; all
//! read-modify-write sequences run under the repository's write lock.
//! Records are addressed by their stable id, never by position.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::model::ExpenseRecord;
use crate::storage::LocalStore;

/// Storage key holding the historical record set as a single JSON sequence.
pub const HISTORY_KEY: &str = "expense-history";

pub struct RecordRepository {
    store: Arc<LocalStore>,
    write_lock: Mutex<()>,
}

impl RecordRepository {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Append a record to the historical set.
    pub async fn append(&self, record: ExpenseRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read().await?;
        records.push(record);
        self.store.set_item(HISTORY_KEY, &records).await?;
        Ok(())
    }

    /// Replace the record with the given id. Returns false if absent.
    pub async fn update(&self, id: Uuid, updated: ExpenseRecord) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read().await?;
        let Some(slot) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        *slot = updated;
        self.store.set_item(HISTORY_KEY, &records).await?;
        Ok(true)
    }

    /// Remove the record with the given id, preserving relative order of the
    /// rest. Returns false if absent.
    pub async fn remove(&self, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read().await?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.store.set_item(HISTORY_KEY, &records).await?;
        Ok(true)
    }

    /// The full persisted sequence, unfiltered.
    pub async fn list(&self) -> Result<Vec<ExpenseRecord>> {
        self.read().await
    }

    /// Append imported records, then dedup by creation timestamp keeping the
    /// first occurrence. Returns the resulting record count. Idempotent on
    /// the dedup key.
    pub async fn merge(&self, imported: Vec<ExpenseRecord>) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut records = self.read().await?;
        let imported_count = imported.len();
        records.extend(imported);

        let mut seen = HashSet::new();
        records.retain(|r| seen.insert(r.timestamp));

        self.store.set_item(HISTORY_KEY, &records).await?;

        debug!(
            imported = imported_count,
            total = records.len(),
            "Merged imported records"
        );
        Ok(records.len())
    }

    async fn read(&self) -> Result<Vec<ExpenseRecord>> {
        Ok(self
            .store
            .get_item::<Vec<ExpenseRecord>>(HISTORY_KEY)
            .await?
            .unwrap_or_default())
    }
}

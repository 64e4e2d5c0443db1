//! Expense service - the online-path orchestration over the core components
//!
//! Every write lands in the local record set first; the remote side is
//! best-effort. While offline, or when a direct write fails, the mutation is
//! handed to the queue instead of being lost. Edits and deletes translate
//! the record's stable id into the positional index the sink's wire
//! contract requires.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::model::{ExpenseFields, ExpenseRecord, MutationPayload};
use crate::queue::MutationQueue;
use crate::records::RecordRepository;
use crate::sync::{RemoteSink, SyncEngine};

/// Import failures, rejected at the boundary with no partial import.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("invalid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("{count} record(s) missing required fields (date, category, amount)")]
    MissingFields { count: usize },
}

/// Outcome of a save as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// Whether the mutation was queued rather than written directly
    pub offline: bool,

    /// Queued mutations that piggybacked on this save's drain
    pub backlog_synced: usize,

    /// Pending count after the save
    pub pending: usize,
}

pub struct ExpenseService {
    repo: Arc<RecordRepository>,
    queue: Arc<MutationQueue>,
    engine: Arc<SyncEngine>,
    sink: Arc<dyn RemoteSink>,
    online_rx: watch::Receiver<bool>,
    pin: String,
}

impl ExpenseService {
    pub fn new(
        repo: Arc<RecordRepository>,
        queue: Arc<MutationQueue>,
        engine: Arc<SyncEngine>,
        sink: Arc<dyn RemoteSink>,
        online_rx: watch::Receiver<bool>,
        pin: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            queue,
            engine,
            sink,
            online_rx,
            pin: pin.into(),
        }
    }

    fn is_online(&self) -> bool {
        *self.online_rx.borrow()
    }

    /// Save a new expense: always append locally, then mirror remotely or
    /// queue the mutation. A successful direct write also drains whatever
    /// backlog accumulated while offline.
    pub async fn save(
        &self,
        fields: ExpenseFields,
        date_iso: impl Into<String>,
    ) -> Result<SaveOutcome> {
        let record = ExpenseRecord::new(fields.clone(), date_iso);
        self.repo.append(record).await?;

        let mutation = MutationPayload::add(fields, self.pin.clone());

        if !self.is_online() {
            let pending = self.queue.enqueue(mutation).await?;
            info!(pending, "Offline, expense queued for sync");
            return Ok(SaveOutcome {
                offline: true,
                backlog_synced: 0,
                pending,
            });
        }

        match self.sink.write(&mutation).await {
            Ok(()) => {
                let report = self.engine.drain_and_sync(self.sink.as_ref()).await?;
                Ok(SaveOutcome {
                    offline: false,
                    backlog_synced: report.succeeded,
                    pending: report.still_pending,
                })
            }
            Err(e) => {
                warn!(error = %e, "Direct write failed, queueing expense");
                let pending = self.queue.enqueue(mutation).await?;
                Ok(SaveOutcome {
                    offline: true,
                    backlog_synced: 0,
                    pending,
                })
            }
        }
    }

    /// Edit a record by stable id. Returns false if the id is unknown.
    pub async fn edit(
        &self,
        id: Uuid,
        fields: ExpenseFields,
        date_iso: impl Into<String>,
    ) -> Result<bool> {
        let records = self.repo.list().await?;
        let Some((index, existing)) = records.iter().enumerate().find(|(_, r)| r.id == id) else {
            return Ok(false);
        };

        let updated = ExpenseRecord {
            id,
            timestamp: existing.timestamp,
            date_iso: date_iso.into(),
            fields: fields.clone(),
        };
        self.repo.update(id, updated).await?;

        let mutation = MutationPayload::edit(index, fields, self.pin.clone());
        self.write_or_enqueue(mutation).await?;
        Ok(true)
    }

    /// Delete a record by stable id. Returns false if the id is unknown.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let records = self.repo.list().await?;
        let Some(index) = records.iter().position(|r| r.id == id) else {
            return Ok(false);
        };

        self.repo.remove(id).await?;

        let mutation = MutationPayload::delete(index, self.pin.clone());
        self.write_or_enqueue(mutation).await?;
        Ok(true)
    }

    async fn write_or_enqueue(&self, mutation: MutationPayload) -> Result<()> {
        if self.is_online() {
            match self.sink.write(&mutation).await {
                Ok(()) => return Ok(()),
                Err(e) => warn!(error = %e, "Direct write failed, queueing mutation"),
            }
        }
        self.queue.enqueue(mutation).await?;
        Ok(())
    }

    /// Import a JSON array of records. The whole batch is rejected when the
    /// JSON is malformed, not an array, or any entry lacks a required field.
    pub async fn import_json(&self, json: &str) -> Result<usize> {
        let imported: Vec<ExpenseRecord> =
            serde_json::from_str(json).map_err(ImportError::Malformed)?;

        let invalid = imported
            .iter()
            .filter(|r| {
                r.fields.date.is_empty()
                    || r.fields.category.is_empty()
                    || r.fields.amount.is_empty()
            })
            .count();
        if invalid > 0 {
            return Err(ImportError::MissingFields { count: invalid }.into());
        }

        let count = imported.len();
        self.repo.merge(imported).await?;
        info!(count, "Records imported");
        Ok(count)
    }

    /// Serialize the full historical set for backup.
    pub async fn export_json(&self) -> Result<String> {
        let records = self.repo.list().await?;
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

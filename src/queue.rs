//! Mutation queue manager
//!
//! Buffers expense mutations created while the remote sink is unreachable.
//! Sole owner of the `pending-mutations` storage key: every read-modify-write
//! on the queue runs under this manager's write lock, so concurrent enqueues
//! and drain commits cannot lose entries.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::debug;

use crate::model::{now_millis, MutationPayload, PendingMutation};
use crate::storage::LocalStore;

/// Storage key holding the pending queue as a single JSON sequence.
pub const PENDING_KEY: &str = "pending-mutations";

/// Manages the durable queue of not-yet-synced mutations.
pub struct MutationQueue {
    store: Arc<LocalStore>,
    write_lock: Mutex<()>,
}

impl MutationQueue {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Append a mutation to the queue and return the new pending count.
    pub async fn enqueue(&self, payload: MutationPayload) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read().await?;

        // Timestamps are the entries' stable identifiers; force them strictly
        // increasing even when two enqueues land on the same millisecond.
        let last = entries.last().map(|e| e.timestamp).unwrap_or(0);
        let timestamp = now_millis().max(last + 1);

        entries.push(PendingMutation {
            payload,
            timestamp,
            synced: false,
        });
        self.store.set_item(PENDING_KEY, &entries).await?;

        debug!(timestamp, pending = entries.len(), "Mutation enqueued");
        Ok(entries.len())
    }

    /// Current queue contents in insertion order; empty if none.
    pub async fn list_pending(&self) -> Result<Vec<PendingMutation>> {
        self.read().await
    }

    /// Number of entries waiting to sync.
    pub async fn pending_count(&self) -> Result<usize> {
        Ok(self.read().await?.len())
    }

    /// Remove every entry already marked synced.
    pub async fn prune(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read().await?;
        entries.retain(|e| !e.synced);
        self.store.set_item(PENDING_KEY, &entries).await?;
        Ok(())
    }

    /// Mark the entries with the given timestamps synced and prune them in a
    /// single read-modify-write. Returns the remaining pending count.
    ///
    /// This is the drain's fused prune step: the sync engine attempts each
    /// entry against the sink, then commits the surviving queue here.
    pub async fn commit_drain(&self, synced_timestamps: &[u64]) -> Result<usize> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read().await?;
        for entry in entries.iter_mut() {
            if synced_timestamps.contains(&entry.timestamp) {
                entry.synced = true;
            }
        }
        entries.retain(|e| !e.synced);
        self.store.set_item(PENDING_KEY, &entries).await?;

        debug!(
            synced = synced_timestamps.len(),
            still_pending = entries.len(),
            "Drain committed"
        );
        Ok(entries.len())
    }

    async fn read(&self) -> Result<Vec<PendingMutation>> {
        Ok(self
            .store
            .get_item::<Vec<PendingMutation>>(PENDING_KEY)
            .await?
            .unwrap_or_default())
    }
}

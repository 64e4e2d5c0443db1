//! Sync engine - drains the pending queue against the remote sink
//!
//! One drain makes exactly one write attempt per pending entry, oldest
//! first. Failures are isolated: a rejected entry stays queued for the next
//! drain and never aborts the pass.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::queue::MutationQueue;
use crate::sync::sink::RemoteSink;

/// Aggregate outcome of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub succeeded: usize,
    pub failed: usize,
    pub still_pending: usize,
}

/// Replays buffered mutations against the sink and commits the result.
pub struct SyncEngine {
    queue: Arc<MutationQueue>,
}

impl SyncEngine {
    pub fn new(queue: Arc<MutationQueue>) -> Self {
        Self { queue }
    }

    /// Drain the queue: attempt every pending entry once, in insertion
    /// order, then persist the filtered queue (the fused prune step).
    ///
    /// An empty queue returns zero counts without touching the sink. There
    /// is no per-entry retry within a single drain; repeated reconnects
    /// retry previously failed entries on the next call.
    ///
    /// If the process dies between a sink acceptance and the commit below,
    /// the entry is re-sent on a later drain: at-least-once delivery overall.
    pub async fn drain_and_sync(&self, sink: &dyn RemoteSink) -> Result<DrainReport> {
        let pending = self.queue.list_pending().await?;
        if pending.is_empty() {
            return Ok(DrainReport::default());
        }

        let mut synced = Vec::new();
        let mut failed = 0usize;

        for entry in pending.iter().filter(|e| !e.synced) {
            match sink.write(&entry.payload).await {
                Ok(()) => synced.push(entry.timestamp),
                Err(e) => {
                    warn!(
                        timestamp = entry.timestamp,
                        error = %e,
                        "Mutation sync failed, keeping for next drain"
                    );
                    failed += 1;
                }
            }
        }

        let still_pending = self.queue.commit_drain(&synced).await?;

        let report = DrainReport {
            succeeded: synced.len(),
            failed,
            still_pending,
        };
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            still_pending = report.still_pending,
            "Drain finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExpenseFields, MutationPayload};
    use crate::storage::LocalStore;
    use crate::sync::sink::SinkError;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Fake sink rejecting writes for a configured set of categories.
    struct FakeSink {
        reject: HashSet<String>,
        calls: AtomicUsize,
    }

    impl FakeSink {
        fn accepting_all() -> Self {
            Self {
                reject: HashSet::new(),
                calls: AtomicUsize::new(0),
            }
        }

        fn rejecting(categories: &[&str]) -> Self {
            Self {
                reject: categories.iter().map(|c| c.to_string()).collect(),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RemoteSink for FakeSink {
        async fn write(&self, mutation: &MutationPayload) -> Result<(), SinkError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let category = mutation
                .expense
                .as_ref()
                .map(|e| e.category.as_str())
                .unwrap_or_default();
            if self.reject.contains(category) {
                Err(SinkError::Network("connection reset".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn payload(category: &str) -> MutationPayload {
        MutationPayload::add(
            ExpenseFields {
                date: "8/23/2026".to_string(),
                category: category.to_string(),
                amount: "R$ 50,00".to_string(),
                payment_method: "Crédito".to_string(),
                essential: true,
                recurring: false,
            },
            "1234",
        )
    }

    fn setup(dir: &TempDir) -> (Arc<MutationQueue>, SyncEngine) {
        let store = Arc::new(LocalStore::open(dir.path(), "gastos-offline").unwrap());
        let queue = Arc::new(MutationQueue::new(store));
        let engine = SyncEngine::new(queue.clone());
        (queue, engine)
    }

    #[tokio::test]
    async fn empty_queue_makes_no_network_calls() {
        let dir = TempDir::new().unwrap();
        let (_, engine) = setup(&dir);
        let sink = FakeSink::accepting_all();

        let report = engine.drain_and_sync(&sink).await.unwrap();

        assert_eq!(report, DrainReport::default());
        assert_eq!(sink.calls(), 0);
    }

    #[tokio::test]
    async fn accepting_sink_empties_the_queue() {
        let dir = TempDir::new().unwrap();
        let (queue, engine) = setup(&dir);
        let sink = FakeSink::accepting_all();

        for c in ["Mercado", "Farmácia", "Transporte"] {
            queue.enqueue(payload(c)).await.unwrap();
        }

        let report = engine.drain_and_sync(&sink).await.unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(report.still_pending, 0);
        assert!(queue.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_subset_stays_queued_in_order() {
        let dir = TempDir::new().unwrap();
        let (queue, engine) = setup(&dir);
        let sink = FakeSink::rejecting(&["Farmácia", "Lazer"]);

        for c in ["Mercado", "Farmácia", "Transporte", "Lazer"] {
            queue.enqueue(payload(c)).await.unwrap();
        }

        let report = engine.drain_and_sync(&sink).await.unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.still_pending, 2);

        let left = queue.list_pending().await.unwrap();
        let categories: Vec<_> = left
            .iter()
            .map(|e| e.payload.expense.as_ref().unwrap().category.clone())
            .collect();
        assert_eq!(categories, vec!["Farmácia", "Lazer"]);
    }

    #[tokio::test]
    async fn second_drain_retries_previous_failures() {
        let dir = TempDir::new().unwrap();
        let (queue, engine) = setup(&dir);

        queue.enqueue(payload("Mercado")).await.unwrap();
        queue.enqueue(payload("Farmácia")).await.unwrap();

        let flaky = FakeSink::rejecting(&["Farmácia"]);
        let report = engine.drain_and_sync(&flaky).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);

        let healthy = FakeSink::accepting_all();
        let report = engine.drain_and_sync(&healthy).await.unwrap();
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(report.still_pending, 0);
        assert_eq!(healthy.calls(), 1);
    }
}

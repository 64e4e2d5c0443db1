//! Offline queue and synchronization integration tests
//!
//! Exercises the full reconnect path: buffering mutations while offline,
//! detecting the online transition, replaying the queue against the sink
//! and reconciling local state with the drain result.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

use gastos_sync::model::{ExpenseFields, MutationPayload};
use gastos_sync::network::{ConnectivityMonitor, SyncNotice};
use gastos_sync::queue::MutationQueue;
use gastos_sync::storage::LocalStore;
use gastos_sync::sync::{RemoteSink, SinkError, SyncEngine};

/// In-memory sink with a programmable reject set and a call counter.
struct ScriptedSink {
    reject_categories: std::sync::Mutex<HashSet<String>>,
    calls: AtomicUsize,
}

impl ScriptedSink {
    fn new() -> Self {
        Self {
            reject_categories: std::sync::Mutex::new(HashSet::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn reject(&self, category: &str) {
        self.reject_categories
            .lock()
            .unwrap()
            .insert(category.to_string());
    }

    fn accept_all(&self) {
        self.reject_categories.lock().unwrap().clear();
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSink for ScriptedSink {
    async fn write(&self, mutation: &MutationPayload) -> Result<(), SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let category = mutation
            .expense
            .as_ref()
            .map(|e| e.category.clone())
            .unwrap_or_default();
        if self.reject_categories.lock().unwrap().contains(&category) {
            Err(SinkError::Network("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

fn expense(category: &str, amount: &str) -> MutationPayload {
    MutationPayload::add(
        ExpenseFields {
            date: "8/23/2026".to_string(),
            category: category.to_string(),
            amount: amount.to_string(),
            payment_method: "Pix".to_string(),
            essential: true,
            recurring: false,
        },
        "1234",
    )
}

fn setup(dir: &TempDir) -> (Arc<MutationQueue>, Arc<SyncEngine>) {
    let store = Arc::new(LocalStore::open(dir.path(), "gastos-offline").unwrap());
    let queue = Arc::new(MutationQueue::new(store));
    let engine = Arc::new(SyncEngine::new(queue.clone()));
    (queue, engine)
}

#[tokio::test]
async fn offline_expense_syncs_after_reconnect() {
    let dir = TempDir::new().unwrap();
    let (queue, engine) = setup(&dir);
    let sink = Arc::new(ScriptedSink::new());

    // Offline: the Mercado expense is queued, nothing hits the network
    queue.enqueue(expense("Mercado", "R$ 50,00")).await.unwrap();
    assert_eq!(sink.calls(), 0);

    // Reconnect
    let (online_tx, online_rx) = watch::channel(false);
    let (notice_tx, mut notice_rx) = mpsc::channel(8);
    let monitor = ConnectivityMonitor::new(
        online_rx,
        engine,
        queue.clone(),
        sink.clone(),
        notice_tx,
    );
    let handle = tokio::spawn(monitor.run());
    online_tx.send(true).unwrap();

    // Drain outcome reaches the caller
    let mut synced = None;
    let mut pending = None;
    for _ in 0..3 {
        match notice_rx.recv().await.unwrap() {
            SyncNotice::Synced { count } => synced = Some(count),
            SyncNotice::PendingChanged { pending: p } => pending = Some(p),
            SyncNotice::ConnectivityChanged { .. } => {}
        }
    }
    assert_eq!(synced, Some(1));
    assert_eq!(pending, Some(0));
    assert!(queue.list_pending().await.unwrap().is_empty());
    assert_eq!(sink.calls(), 1);

    drop(online_tx);
    handle.await.unwrap();
}

#[tokio::test]
async fn rejected_entry_survives_until_a_later_drain() {
    let dir = TempDir::new().unwrap();
    let (queue, engine) = setup(&dir);
    let sink = ScriptedSink::new();
    sink.reject("Farmácia");

    queue.enqueue(expense("Mercado", "R$ 50,00")).await.unwrap();
    queue.enqueue(expense("Farmácia", "R$ 30,00")).await.unwrap();
    let t2 = queue.list_pending().await.unwrap()[1].timestamp;

    // First drain: T2 rejected, T1 synced
    let report = engine.drain_and_sync(&sink).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.still_pending, 1);

    let left = queue.list_pending().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].timestamp, t2);
    assert!(!left[0].synced);

    // Sink recovers; second drain retries only T2
    sink.accept_all();
    let calls_before = sink.calls();
    let report = engine.drain_and_sync(&sink).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.still_pending, 0);
    assert_eq!(sink.calls() - calls_before, 1);
    assert!(queue.list_pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn drain_preserves_enqueue_order() {
    let dir = TempDir::new().unwrap();
    let (queue, engine) = setup(&dir);
    let sink = ScriptedSink::new();
    sink.reject("b");
    sink.reject("d");

    for c in ["a", "b", "c", "d", "e"] {
        queue.enqueue(expense(c, "R$ 1,00")).await.unwrap();
    }

    let report = engine.drain_and_sync(&sink).await.unwrap();
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 2);

    let left: Vec<String> = queue
        .list_pending()
        .await
        .unwrap()
        .iter()
        .map(|e| e.payload.expense.as_ref().unwrap().category.clone())
        .collect();
    assert_eq!(left, vec!["b", "d"]);
}

#[tokio::test]
async fn repeated_connectivity_flaps_do_not_duplicate_or_lose_entries() {
    let dir = TempDir::new().unwrap();
    let (queue, engine) = setup(&dir);
    let sink = Arc::new(ScriptedSink::new());
    sink.reject("Aluguel");

    queue.enqueue(expense("Aluguel", "R$ 1.200,00")).await.unwrap();

    let (online_tx, online_rx) = watch::channel(false);
    let (notice_tx, mut notice_rx) = mpsc::channel(32);
    let monitor = ConnectivityMonitor::new(
        online_rx,
        engine,
        queue.clone(),
        sink.clone(),
        notice_tx,
    );
    let handle = tokio::spawn(monitor.run());

    // Two full offline/online cycles against a sink that keeps rejecting
    for _ in 0..2 {
        online_tx.send(true).unwrap();
        // ConnectivityChanged(online) then PendingChanged(1); no Synced notice
        assert_eq!(
            notice_rx.recv().await.unwrap(),
            SyncNotice::ConnectivityChanged { online: true }
        );
        assert_eq!(
            notice_rx.recv().await.unwrap(),
            SyncNotice::PendingChanged { pending: 1 }
        );
        online_tx.send(false).unwrap();
        assert_eq!(
            notice_rx.recv().await.unwrap(),
            SyncNotice::ConnectivityChanged { online: false }
        );
    }

    // The entry was attempted once per reconnect and never duplicated
    assert_eq!(sink.calls(), 2);
    assert_eq!(queue.pending_count().await.unwrap(), 1);

    // Sink recovers: third reconnect finally clears it
    sink.accept_all();
    online_tx.send(true).unwrap();
    assert_eq!(
        notice_rx.recv().await.unwrap(),
        SyncNotice::ConnectivityChanged { online: true }
    );
    assert_eq!(
        notice_rx.recv().await.unwrap(),
        SyncNotice::Synced { count: 1 }
    );
    assert_eq!(
        notice_rx.recv().await.unwrap(),
        SyncNotice::PendingChanged { pending: 0 }
    );

    drop(online_tx);
    handle.await.unwrap();
}

#[tokio::test]
async fn queue_state_survives_process_restart() {
    let dir = TempDir::new().unwrap();

    {
        let (queue, engine) = setup(&dir);
        let sink = ScriptedSink::new();
        sink.reject("Mercado");
        queue.enqueue(expense("Mercado", "R$ 50,00")).await.unwrap();
        let report = engine.drain_and_sync(&sink).await.unwrap();
        assert_eq!(report.failed, 1);
    }

    // "Restart": reopen the same store
    let (queue, engine) = setup(&dir);
    assert_eq!(queue.pending_count().await.unwrap(), 1);

    let sink = ScriptedSink::new();
    let report = engine.drain_and_sync(&sink).await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(queue.pending_count().await.unwrap(), 0);
}

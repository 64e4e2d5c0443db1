//! gastos-sync: offline-first sync core for the Gastos expense tracker
//!
//! Expenses are always persisted locally and mirrored to a remote
//! spreadsheet-backed endpoint. Writes made while disconnected are buffered
//! in a durable queue and replayed when connectivity returns:
//! - `storage`: async key-value persistence over SQLite
//! - `queue`: the durable pending-mutation queue
//! - `sync`: the drain protocol and the remote sink capability
//! - `network`: connectivity monitoring and reconnect-triggered drains
//! - `records`: the authoritative historical expense list
//! - `service`: online-path orchestration (save/edit/delete/import/export)

pub mod config;
pub mod model;
pub mod network;
pub mod queue;
pub mod records;
pub mod service;
pub mod storage;
pub mod sync;

pub use config::Config;
pub use model::{ExpenseFields, ExpenseRecord, MutationAction, MutationPayload, PendingMutation};
pub use network::{ConnectivityMonitor, SyncNotice};
pub use queue::MutationQueue;
pub use records::RecordRepository;
pub use service::{ExpenseService, ImportError, SaveOutcome};
pub use storage::LocalStore;
pub use sync::{DrainReport, HttpSink, RemoteSink, SinkError, SyncEngine};

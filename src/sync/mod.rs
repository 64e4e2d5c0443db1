//! Offline synchronization - queue drain and the remote sink capability

pub mod engine;
pub mod sink;

pub use engine::{DrainReport, SyncEngine};
pub use sink::{HttpSink, RemoteSink, SinkError};

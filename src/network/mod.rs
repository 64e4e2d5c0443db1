//! Connectivity monitoring
//!
//! Watches online/offline transitions and triggers a queue drain on
//! reconnect. Connectivity is a `watch` channel: the current value is
//! queryable at any time and changes are edge-triggered. An optional probe
//! task feeds the channel by polling an HTTP endpoint.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use crate::queue::MutationQueue;
use crate::sync::{RemoteSink, SyncEngine};

/// User-visible events emitted by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// Queued mutations were synced after a reconnect
    Synced { count: usize },

    /// The pending-count indicator should refresh
    PendingChanged { pending: usize },

    /// Connectivity flipped
    ConnectivityChanged { online: bool },
}

/// Create the connectivity signal with the environment's current state.
pub fn connectivity_channel(initially_online: bool) -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(initially_online)
}

/// Reacts to connectivity transitions: drains on reconnect, flags offline.
pub struct ConnectivityMonitor {
    online_rx: watch::Receiver<bool>,
    engine: Arc<SyncEngine>,
    queue: Arc<MutationQueue>,
    sink: Arc<dyn RemoteSink>,
    notices: mpsc::Sender<SyncNotice>,
}

impl ConnectivityMonitor {
    pub fn new(
        online_rx: watch::Receiver<bool>,
        engine: Arc<SyncEngine>,
        queue: Arc<MutationQueue>,
        sink: Arc<dyn RemoteSink>,
        notices: mpsc::Sender<SyncNotice>,
    ) -> Self {
        Self {
            online_rx,
            engine,
            queue,
            sink,
            notices,
        }
    }

    /// Current connectivity as last reported by the signal.
    pub fn is_online(&self) -> bool {
        *self.online_rx.borrow()
    }

    /// Run the monitor loop until the connectivity sender is dropped.
    ///
    /// Only transitions trigger work; the loop does not drain on startup.
    pub async fn run(mut self) {
        let mut was_online = *self.online_rx.borrow();
        info!(online = was_online, "Connectivity monitor started");

        while self.online_rx.changed().await.is_ok() {
            let online = *self.online_rx.borrow();
            if online == was_online {
                continue;
            }
            was_online = online;

            let _ = self
                .notices
                .send(SyncNotice::ConnectivityChanged { online })
                .await;

            if !online {
                info!("Went offline, queueing further writes");
                continue;
            }

            info!("Back online, draining pending mutations");
            match self.engine.drain_and_sync(self.sink.as_ref()).await {
                Ok(report) => {
                    if report.succeeded > 0 {
                        let _ = self
                            .notices
                            .send(SyncNotice::Synced {
                                count: report.succeeded,
                            })
                            .await;
                    }
                    let pending = self
                        .queue
                        .pending_count()
                        .await
                        .unwrap_or(report.still_pending);
                    let _ = self
                        .notices
                        .send(SyncNotice::PendingChanged { pending })
                        .await;
                }
                Err(e) => {
                    error!(error = %e, "Drain after reconnect failed");
                }
            }
        }
        debug!("Connectivity signal closed, monitor stopping");
    }
}

/// Single connectivity check against `probe_url`.
///
/// Any response, including an HTTP error status, proves the network path is
/// up; only transport failures count as offline.
pub async fn probe_once(probe_url: &str, timeout: Duration) -> bool {
    reqwest::Client::new()
        .head(probe_url)
        .timeout(timeout)
        .send()
        .await
        .is_ok()
}

/// Poll `probe_url` and publish connectivity transitions into the channel.
pub async fn run_probe(
    probe_url: String,
    interval: Duration,
    timeout: Duration,
    online_tx: watch::Sender<bool>,
) {
    let mut timer = tokio::time::interval(interval);

    loop {
        timer.tick().await;
        let online = probe_once(&probe_url, timeout).await;

        let flipped = online_tx.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
        if flipped {
            debug!(online, "Connectivity probe detected transition");
        }
    }
}

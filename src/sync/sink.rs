//! Remote sink capability
//!
//! The spreadsheet endpoint is write-only and fire-and-forget: it accepts a
//! JSON mutation via POST and returns no body the client can use for
//! confirmation. Absence of a network-level error is the success signal.
//! The trait keeps the sync engine testable with a fake sink.

use std::time::Duration;

use async_trait::async_trait;

use crate::model::MutationPayload;

/// Write failures as seen by the sync engine. Every variant is retryable on
/// a later drain.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("network error: {0}")]
    Network(String),

    #[error("write timed out after {0:?}")]
    Timeout(Duration),

    #[error("sink rejected write: HTTP {0}")]
    Rejected(u16),
}

/// A write-only destination for expense mutations.
#[async_trait]
pub trait RemoteSink: Send + Sync {
    async fn write(&self, mutation: &MutationPayload) -> Result<(), SinkError>;
}

/// HTTP implementation posting one JSON mutation per request.
pub struct HttpSink {
    client: reqwest::Client,
    api_url: String,
    timeout: Duration,
}

impl HttpSink {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl RemoteSink for HttpSink {
    async fn write(&self, mutation: &MutationPayload) -> Result<(), SinkError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(mutation)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SinkError::Timeout(self.timeout)
                } else {
                    SinkError::Network(e.to_string())
                }
            })?;

        // No parseable confirmation body; a non-success status is the only
        // rejection signal available.
        if !response.status().is_success() {
            return Err(SinkError::Rejected(response.status().as_u16()));
        }

        Ok(())
    }
}

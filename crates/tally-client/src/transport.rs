//! Transport seam between the upload session and the server.
//!
//! The session never sees HTTP; it sees typed outcomes. That keeps the retry
//! state machine testable with a scripted fake and keeps classification of
//! server responses in one place.

use async_trait::async_trait;
use tally_core::constants::TRANSMIT_TIMEOUT;
use tally_core::models::{IngestRequest, IngestResponse};

/// Retriable failure classes, each with its own recovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// Server rejected the payload size (413): re-encode smaller, once.
    PayloadTooLarge,
    /// Server is shedding load (503): re-encode aggressively, once.
    MemoryPressure,
    /// Transient connectivity or server failure: back off and resend.
    Network,
}

/// Failures no retry can fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalKind {
    Unauthorized,
    /// Server-side validation or a malformed success response.
    Rejected,
}

/// Classified result of one transmit attempt.
#[derive(Debug, Clone)]
pub enum TransportOutcome {
    Success(IngestResponse),
    Retriable(RetryKind, String),
    Fatal(FatalKind, String),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform one transmit attempt. Classification, not error propagation:
    /// every failure mode maps to an outcome.
    async fn send(&self, request: &IngestRequest) -> TransportOutcome;
}

/// HTTP transport against the Tally ingest endpoint.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(TRANSMIT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &IngestRequest) -> TransportOutcome {
        let url = format!("{}/api/v1/assets", self.base_url);
        let response = match self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                // Timeouts and connection errors are both retriable.
                return TransportOutcome::Retriable(RetryKind::Network, e.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<IngestResponse>().await {
                Ok(body) if body.storage_key.is_empty() => TransportOutcome::Fatal(
                    FatalKind::Rejected,
                    "server returned an empty storage key".to_string(),
                ),
                Ok(body) => TransportOutcome::Success(body),
                Err(e) => TransportOutcome::Fatal(
                    FatalKind::Rejected,
                    format!("unparseable success response: {}", e),
                ),
            };
        }

        let body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 => TransportOutcome::Fatal(FatalKind::Unauthorized, body),
            413 => TransportOutcome::Retriable(RetryKind::PayloadTooLarge, body),
            503 => TransportOutcome::Retriable(RetryKind::MemoryPressure, body),
            code if (500..600).contains(&code) => {
                TransportOutcome::Retriable(RetryKind::Network, format!("{}: {}", status, body))
            }
            _ => TransportOutcome::Fatal(FatalKind::Rejected, format!("{}: {}", status, body)),
        }
    }
}

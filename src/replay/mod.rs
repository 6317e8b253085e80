//! # Replay Module
//!
//! Handles fetching CSV-replay rows from the telemetry server.
//!
//! This module handles:
//! - `GET /telemetry?i=<index>` requests against the replay server
//! - Mapping non-2xx statuses and network failures to transport errors
//! - The polling state machine that walks the index forward

pub mod polling;
pub mod source_trait;

pub use polling::{FetchTicket, PollOutcome, PollingLoop};
pub use source_trait::ReplaySource;

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{Result, TelloTwinError};
use crate::telemetry::TelemetryRecord;

/// Path of the replay endpoint relative to the server base URL
pub const TELEMETRY_PATH: &str = "/telemetry";

/// Upper bound on the TCP/TLS connect
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Replay client backed by `reqwest`
///
/// Reuses one connection pool for every tick.
#[derive(Debug, Clone)]
pub struct HttpReplaySource {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpReplaySource {
    /// Create a client for the replay server at `base_url`
    ///
    /// `timeout` bounds each request, body included.
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not a valid URL or the HTTP client
    /// cannot be built
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use tellotwin::replay::HttpReplaySource;
    ///
    /// let source = HttpReplaySource::new("http://localhost:8000", Duration::from_secs(5))?;
    /// assert_eq!(source.url_for(7).as_str(), "http://localhost:8000/telemetry?i=7");
    /// # Ok::<(), tellotwin::error::TelloTwinError>(())
    /// ```
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(base_url)?.join(TELEMETRY_PATH)?;
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| TelloTwinError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    /// Request URL for a row index
    pub fn url_for(&self, index: u64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("i", &index.to_string());
        url
    }
}

#[async_trait]
impl ReplaySource for HttpReplaySource {
    async fn fetch(&self, index: u64) -> Result<TelemetryRecord> {
        let url = self.url_for(index);
        debug!("Fetching replay row: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| TelloTwinError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelloTwinError::Transport(format!("HTTP {}", status.as_u16())));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| TelloTwinError::Transport(e.to_string()))?;

        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_url_for_index() {
        let source = HttpReplaySource::new("http://localhost:8000", TIMEOUT).unwrap();
        assert_eq!(source.url_for(0).as_str(), "http://localhost:8000/telemetry?i=0");
        assert_eq!(source.url_for(1234).as_str(), "http://localhost:8000/telemetry?i=1234");
    }

    #[test]
    fn test_url_for_ignores_base_path() {
        let source = HttpReplaySource::new("https://twin.example.com/app/", TIMEOUT).unwrap();
        assert_eq!(source.url_for(5).as_str(), "https://twin.example.com/telemetry?i=5");
    }

    #[test]
    fn test_invalid_base_url_returns_error() {
        let result = HttpReplaySource::new("not a url", TIMEOUT);
        assert!(matches!(result, Err(TelloTwinError::Url(_))));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_server_is_transport_error() {
        // Port 9 (discard) on loopback is expected to refuse connections
        let source = HttpReplaySource::new("http://127.0.0.1:9", TIMEOUT).unwrap();

        match source.fetch(0).await {
            Err(TelloTwinError::Transport(_)) => {}
            other => panic!("Expected Transport error, got: {:?}", other),
        }
    }
}

//! Trait abstraction for replay fetches to enable testing

use async_trait::async_trait;

use crate::error::Result;
use crate::telemetry::TelemetryRecord;

/// Anything that can serve the telemetry row at a given index
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplaySource: Send + Sync {
    /// Fetch the row at `index`
    async fn fetch(&self, index: u64) -> Result<TelemetryRecord>;
}

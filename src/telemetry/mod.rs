//! # Telemetry Module
//!
//! Telemetry data model and orientation decoding.
//!
//! This module handles:
//! - Replay rows from the CSV-replay endpoint
//! - Partial live payloads from the WebSocket subscription
//! - Decoding either source into one normalized [`Pose`]
//! - A rolling window of the replay Rate metric

pub mod decoder;
pub mod history;
pub mod types;

pub use history::MetricHistory;
pub use types::{coerce_number, parse_number, LivePayload, LiveState, Pose, TelemetryRecord};

//! # TelloTwin Library
//!
//! Live drone telemetry ingestion and pose smoothing for the TelloTwin
//! dashboard.
//!
//! This library provides the core behind the 3D view: polling a CSV-replay
//! server or subscribing to a live WebSocket stream, decoding either into one
//! normalized pose, and smoothing that pose frame by frame for rendering.

pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod live;
pub mod render;
pub mod replay;
pub mod telemetry;

//! # Error Types
//!
//! Custom error types for TelloTwin using `thiserror`.

use thiserror::Error;

/// Main error type for TelloTwin
#[derive(Debug, Error)]
pub enum TelloTwinError {
    /// Fetch or subscription transport failures (non-2xx status, network errors)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed JSON payloads
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Render asset unavailable or unreadable
    #[error("Model load error: {0}")]
    ModelLoad(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Unrecognized operator command
    #[error("Invalid command: {0}")]
    Command(String),

    /// Endpoint URL errors
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for TelloTwin
pub type Result<T> = std::result::Result<T, TelloTwinError>;

//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;
use url::Url;

use crate::error::{Result, TelloTwinError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub replay: ReplayConfig,
    #[serde(default)]
    pub live: LiveConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

/// CSV-replay polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ReplayConfig {
    #[serde(default = "default_replay_base_url")]
    pub base_url: String,

    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Longest a fetch may stay unanswered before the row is retried
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_autostart")]
    pub autostart: bool,

    /// Keep the replay timer running while live mode is displayed
    #[serde(default = "default_poll_in_live_mode")]
    pub poll_in_live_mode: bool,
}

/// Live WebSocket subscription configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LiveConfig {
    /// Page origin the subscription scheme and host are derived from
    #[serde(default = "default_live_base_url")]
    pub base_url: String,

    #[serde(default = "default_live_path")]
    pub path: String,

    #[serde(default)]
    pub enabled: bool,
}

/// Rendering configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_gain")]
    pub gain: f64,

    #[serde(default = "default_altitude_scale")]
    pub altitude_scale: f64,

    #[serde(default = "default_frame_rate_hz")]
    pub frame_rate_hz: u32,

    #[serde(default = "default_model_path")]
    pub model_path: String,
}

// Default value functions
fn default_replay_base_url() -> String { "http://localhost:8000".to_string() }
fn default_interval_ms() -> u64 { 300 }
fn default_timeout_ms() -> u64 { 5000 }
fn default_autostart() -> bool { true }
fn default_poll_in_live_mode() -> bool { true }

fn default_live_base_url() -> String { "http://localhost:8000".to_string() }
fn default_live_path() -> String { "/ws/tello".to_string() }

fn default_gain() -> f64 { 0.2 }
fn default_altitude_scale() -> f64 { 0.05 }
fn default_frame_rate_hz() -> u32 { 60 }
fn default_model_path() -> String { "models/tello.glb".to_string() }

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            base_url: default_replay_base_url(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
            autostart: default_autostart(),
            poll_in_live_mode: default_poll_in_live_mode(),
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            base_url: default_live_base_url(),
            path: default_live_path(),
            enabled: false,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            gain: default_gain(),
            altitude_scale: default_altitude_scale(),
            frame_rate_hz: default_frame_rate_hz(),
            model_path: default_model_path(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> TelloTwinError {
    TelloTwinError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tellotwin::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("replay.base_url", &self.replay.base_url),
            ("live.base_url", &self.live.base_url),
        ] {
            let url = Url::parse(value)
                .map_err(|e| invalid(format!("{} is not a valid URL: {}", name, e)))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(invalid(format!("{} must use http or https", name)));
            }
        }

        if !self.live.path.starts_with('/') {
            return Err(invalid("live.path must start with '/'"));
        }

        if self.replay.interval_ms == 0 || self.replay.interval_ms > 60000 {
            return Err(invalid("interval_ms must be between 1 and 60000"));
        }

        if self.replay.timeout_ms == 0 || self.replay.timeout_ms > 60000 {
            return Err(invalid("timeout_ms must be between 1 and 60000"));
        }

        if !(self.render.gain > 0.0 && self.render.gain <= 1.0) {
            return Err(invalid("gain must be greater than 0.0 and at most 1.0"));
        }

        if !self.render.altitude_scale.is_finite() || self.render.altitude_scale < 0.0 {
            return Err(invalid("altitude_scale must be a finite value >= 0.0"));
        }

        if self.render.frame_rate_hz == 0 || self.render.frame_rate_hz > 240 {
            return Err(invalid("frame_rate_hz must be between 1 and 240"));
        }

        if self.render.model_path.is_empty() {
            return Err(invalid("model_path cannot be empty"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.replay.base_url, "http://localhost:8000");
        assert_eq!(config.replay.interval_ms, 300);
        assert_eq!(config.replay.timeout_ms, 5000);
        assert!(config.replay.autostart);
        assert!(config.replay.poll_in_live_mode);
        assert_eq!(config.live.path, "/ws/tello");
        assert!(!config.live.enabled);
        assert_eq!(config.render.gain, 0.2);
        assert_eq!(config.render.altitude_scale, 0.05);
        assert_eq!(config.render.frame_rate_hz, 60);
    }

    #[test]
    fn test_invalid_gain() {
        for gain in [0.0, -0.1, 1.5, f64::NAN] {
            let mut config = Config::default();
            config.render.gain = gain;
            assert!(config.validate().is_err(), "gain {} should be rejected", gain);
        }

        let mut config = Config::default();
        config.render.gain = 1.0;
        assert!(config.validate().is_ok(), "gain 1.0 snaps straight to target");
    }

    #[test]
    fn test_invalid_interval() {
        let mut config = Config::default();
        config.replay.interval_ms = 0;
        assert!(config.validate().is_err());

        config.replay.interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_timeout() {
        let mut config = Config::default();
        config.replay.timeout_ms = 0;
        assert!(config.validate().is_err());

        config.replay.timeout_ms = 60001;
        assert!(config.validate().is_err());

        config.replay.timeout_ms = 250;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_urls() {
        let mut config = Config::default();
        config.replay.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.live.base_url = "ftp://localhost:8000".to_string();
        assert!(config.validate().is_err(), "only http and https origins are accepted");
    }

    #[test]
    fn test_invalid_live_path() {
        let mut config = Config::default();
        config.live.path = "ws/tello".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_frame_rate() {
        let mut config = Config::default();
        config.render.frame_rate_hz = 0;
        assert!(config.validate().is_err());

        config.render.frame_rate_hz = 241;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_altitude_scale() {
        let mut config = Config::default();
        config.render.altitude_scale = -0.05;
        assert!(config.validate().is_err());

        config.render.altitude_scale = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_model_path() {
        let mut config = Config::default();
        config.render.model_path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[replay]
base_url = "http://127.0.0.1:9000"
interval_ms = 150

[live]
base_url = "https://twin.example.com"
enabled = true

[render]
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.replay.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.replay.interval_ms, 150);
        assert!(config.replay.autostart);
        assert_eq!(config.live.base_url, "https://twin.example.com");
        assert!(config.live.enabled);
        assert_eq!(config.live.path, "/ws/tello");
        assert_eq!(config.render.gain, 0.2);
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.replay.interval_ms, 300);
        assert_eq!(config.render.model_path, "models/tello.glb");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[render]\ngain = 2.0\n").unwrap();
        temp_file.flush().unwrap();

        match Config::load(temp_file.path()) {
            Err(TelloTwinError::Config(e)) => assert!(e.to_string().contains("gain")),
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/tellotwin.toml");
        assert!(matches!(result, Err(TelloTwinError::Io(_))));
    }
}

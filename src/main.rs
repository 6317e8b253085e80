//! # TelloTwin
//!
//! Headless runner for the TelloTwin telemetry core.
//!
//! Polls the CSV-replay server (or subscribes to the live Tello stream) and
//! logs the smoothed pose the 3D view would draw.
//!
//! # Control Flow
//!
//! 1. **Initialization**
//!    - Set up logging with tracing subscriber
//!    - Load configuration (first argument, `config/default.toml`, or defaults)
//!    - Resolve the drone model once, falling back to the built-in shape
//!
//! 2. **Main Loop**
//!    - Dashboard event loop: replay polling, live subscription, 60Hz frames
//!    - Operator commands read from stdin (`pause`, `live on`, `interval 200`, ...)
//!    - Status line logged about once per second
//!
//! 3. **Graceful Shutdown**
//!    - `quit` or Ctrl+C closes the live subscription and exits
//!
//! # Examples
//!
//! ```bash
//! RUST_LOG=tellotwin=debug cargo run --release -- config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO tellotwin: TelloTwin v0.1.0 starting...
//! INFO tellotwin::dashboard: Dashboard running: replay every 300ms, CSV mode
//! INFO tellotwin: [CSV mode] roll: 15.0°, pitch: -15.0°, yaw: -140.0°, alt: 0.50 m (CSV simulation data) | row 3
//! ```

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use tellotwin::config::Config;
use tellotwin::console;
use tellotwin::dashboard::{Command, Dashboard, Snapshot};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Period of the status line
const STATUS_LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Pending operator commands before the console blocks
const COMMAND_QUEUE_DEPTH: usize = 16;

fn load_config() -> Result<Config> {
    if let Some(path) = std::env::args().nth(1) {
        return Config::load(&path).with_context(|| format!("Failed to load config from {}", path));
    }

    if Path::new(DEFAULT_CONFIG_PATH).exists() {
        return Config::load(DEFAULT_CONFIG_PATH)
            .with_context(|| format!("Failed to load config from {}", DEFAULT_CONFIG_PATH));
    }

    info!("No configuration file found, using defaults");
    Ok(Config::default())
}

/// Error to report when `current` differs from the last one seen
fn new_error(last: &mut Option<String>, current: Option<&str>) -> Option<String> {
    if last.as_deref() == current {
        return None;
    }
    *last = current.map(str::to_string);
    last.clone()
}

/// Log the status line every [`STATUS_LOG_INTERVAL`] and each new replay
/// error once, until the dashboard is gone
async fn present(snapshots: watch::Receiver<Snapshot>) {
    let mut ticker = tokio::time::interval(STATUS_LOG_INTERVAL);
    let mut last_error: Option<String> = None;

    loop {
        ticker.tick().await;
        if snapshots.has_changed().is_err() {
            break;
        }

        let (line, error) = {
            let snapshot = snapshots.borrow();
            (snapshot.status_line(), new_error(&mut last_error, snapshot.error.as_deref()))
        };

        if let Some(error) = error {
            warn!("Error: {}", error);
        }
        info!("{}", line);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("TelloTwin v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    let (dashboard, snapshots) = Dashboard::from_config(&config)?;

    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
    console::spawn_stdin_reader(commands_tx.clone());
    let presenter = tokio::spawn(present(snapshots));
    let mut runner = tokio::spawn(dashboard.run(commands_rx));

    info!("Commands: pause | start | toggle | reset | interval <ms> | live on|off | quit");
    info!("Press Ctrl+C to exit");

    tokio::select! {
        result = &mut runner => {
            result.context("Dashboard task failed")??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            // Ignore the error: the dashboard may already be gone
            let _ = commands_tx.send(Command::Shutdown).await;
            runner.await.context("Dashboard task failed")??;
        }
    }

    presenter.abort();
    Ok(())
}

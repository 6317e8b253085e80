//! # Dashboard Controller
//!
//! Top-level owner of all runtime state: the replay polling loop, the live
//! connection, the display mode and the smoothed render pose.
//!
//! ## Event Loop
//!
//! [`Dashboard::run`] is a single cooperative `tokio::select!` loop over:
//!
//! 1. **Poll timer** - issue the next replay fetch (one in flight at most)
//! 2. **Fetch completions** - feed responses back into the polling loop
//! 3. **Live events** - open/close/message from the active subscription
//! 4. **Frame timer** - advance the smoothed pose one frame
//! 5. **Commands** - operator controls (pause, interval, reset, live mode)
//!
//! After every event a fresh [`Snapshot`] is published on a `watch` channel
//! for presentation. Only the loop mutates state, so no two sources ever
//! write concurrently.
//!
//! ## Source Selection
//!
//! The mode flag decides which source feeds the target pose. The replay
//! timer keeps running in live mode unless `poll_in_live_mode` is off; its
//! rows are simply not shown until live mode is switched off again.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, TelloTwinError};
use crate::live::{live_url, LiveConnection, LiveEvent, LiveSource, WsLiveSource};
use crate::render::{RenderedPose, Renderable, Smoother};
use crate::replay::{FetchTicket, HttpReplaySource, PollOutcome, PollingLoop, ReplaySource};
use crate::telemetry::decoder::{decode_live, decode_record};
use crate::telemetry::{MetricHistory, Pose, TelemetryRecord};

/// Operator controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SetRunning(bool),
    ToggleRunning,
    /// Polling period in milliseconds; 0 restores the default
    SetInterval(u64),
    ResetIndex,
    SetLiveMode(bool),
    Shutdown,
}

/// Connectivity label shown next to the mode toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    CsvMode,
    Connecting,
    Connected,
}

impl LinkStatus {
    pub fn from_flags(live_mode: bool, connected: bool) -> Self {
        match (live_mode, connected) {
            (false, _) => LinkStatus::CsvMode,
            (true, false) => LinkStatus::Connecting,
            (true, true) => LinkStatus::Connected,
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LinkStatus::CsvMode => "CSV mode",
            LinkStatus::Connecting => "connecting…",
            LinkStatus::Connected => "connected",
        };
        f.write_str(label)
    }
}

/// Everything presentation needs, published after each change
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Decoded pose from the active source
    pub target: Pose,
    /// Smoothed pose as currently drawn
    pub rendered: RenderedPose,
    pub live_mode: bool,
    /// `live_mode && connected`
    pub connected: bool,
    pub status: LinkStatus,
    /// Next replay row to fetch
    pub index: u64,
    /// Latest accepted replay row
    pub record: Option<TelemetryRecord>,
    /// Last replay fetch failure, cleared by the next success
    pub error: Option<String>,
    /// `Rate` of the most recent accepted rows
    pub rate_history: MetricHistory,
    pub running: bool,
    pub interval: Duration,
    pub renderable: Renderable,
}

impl Snapshot {
    pub fn source_label(&self) -> &'static str {
        if self.live_mode {
            "Live Tello data"
        } else {
            "CSV simulation data"
        }
    }

    /// One-line textual display of the current state
    pub fn status_line(&self) -> String {
        let row = self
            .record
            .as_ref()
            .and_then(TelemetryRecord::index)
            .map_or_else(|| "—".to_string(), |i| i.to_string());

        format!(
            "[{}] {} ({}) | row {}{}",
            self.status,
            self.target,
            self.source_label(),
            row,
            if self.running { "" } else { " | paused" }
        )
    }
}

type FetchResult = (FetchTicket, Result<TelemetryRecord>);

/// Top-level controller
pub struct Dashboard {
    replay: Arc<dyn ReplaySource>,
    polling: PollingLoop,
    live: LiveConnection,
    live_mode: bool,
    poll_in_live_mode: bool,
    smoother: Smoother,
    rendered: RenderedPose,
    rate_history: MetricHistory,
    renderable: Renderable,
    frame_period: Duration,
    fetch_timeout: Duration,
    fetch_tx: mpsc::UnboundedSender<FetchResult>,
    fetch_rx: mpsc::UnboundedReceiver<FetchResult>,
    live_rx: mpsc::UnboundedReceiver<LiveEvent>,
    snapshots: watch::Sender<Snapshot>,
}

impl Dashboard {
    /// Build a dashboard with explicit transports
    ///
    /// # Errors
    ///
    /// Returns error if the live subscription URL cannot be derived from the
    /// configuration
    pub fn new(
        config: &Config,
        replay: Arc<dyn ReplaySource>,
        live_source: Arc<dyn LiveSource>,
        renderable: Renderable,
    ) -> Result<(Self, watch::Receiver<Snapshot>)> {
        let url = live_url(&config.live.base_url, &config.live.path)?;
        let (live_tx, live_rx) = mpsc::unbounded_channel();
        let (fetch_tx, fetch_rx) = mpsc::unbounded_channel();

        let polling = PollingLoop::new(config.replay.interval_ms, config.replay.autostart);
        let live = LiveConnection::new(live_source, url, live_tx);
        let smoother = Smoother::new(config.render.gain, config.render.altitude_scale);
        let frame_period = Duration::from_secs_f64(1.0 / f64::from(config.render.frame_rate_hz.max(1)));
        let fetch_timeout = Duration::from_millis(config.replay.timeout_ms.max(1));

        let (snapshots, receiver) = watch::channel(Self::placeholder_snapshot());

        let dashboard = Self {
            replay,
            polling,
            live,
            live_mode: config.live.enabled,
            poll_in_live_mode: config.replay.poll_in_live_mode,
            smoother,
            rendered: RenderedPose::default(),
            rate_history: MetricHistory::default(),
            renderable,
            frame_period,
            fetch_timeout,
            fetch_tx,
            fetch_rx,
            live_rx,
            snapshots,
        };

        dashboard.publish();
        Ok((dashboard, receiver))
    }

    /// Build a dashboard talking HTTP and WebSocket to the configured server
    ///
    /// The model asset is resolved here, once.
    ///
    /// # Errors
    ///
    /// Returns error if the configured URLs are invalid
    pub fn from_config(config: &Config) -> Result<(Self, watch::Receiver<Snapshot>)> {
        let timeout = Duration::from_millis(config.replay.timeout_ms);
        let replay = Arc::new(HttpReplaySource::new(&config.replay.base_url, timeout)?);
        let renderable = Renderable::resolve(&config.render.model_path);
        Self::new(config, replay, Arc::new(WsLiveSource), renderable)
    }

    fn placeholder_snapshot() -> Snapshot {
        Snapshot {
            target: Pose::ZERO,
            rendered: RenderedPose::default(),
            live_mode: false,
            connected: false,
            status: LinkStatus::CsvMode,
            index: 0,
            record: None,
            error: None,
            rate_history: MetricHistory::default(),
            running: false,
            interval: Duration::ZERO,
            renderable: Renderable::Fallback(Default::default()),
        }
    }

    pub fn is_live_mode(&self) -> bool {
        self.live_mode
    }

    pub fn polling(&self) -> &PollingLoop {
        &self.polling
    }

    pub fn live(&self) -> &LiveConnection {
        &self.live
    }

    pub fn rendered(&self) -> &RenderedPose {
        &self.rendered
    }

    /// Target pose from whichever source the mode selects
    pub fn target(&self) -> Pose {
        if self.live_mode {
            decode_live(self.live.state())
        } else {
            decode_record(self.polling.last_record())
        }
    }

    /// Live connectivity as shown to presentation
    pub fn connected(&self) -> bool {
        self.live_mode && self.live.is_connected()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            target: self.target(),
            rendered: self.rendered,
            live_mode: self.live_mode,
            connected: self.connected(),
            status: LinkStatus::from_flags(self.live_mode, self.live.is_connected()),
            index: self.polling.index(),
            record: self.polling.last_record().cloned(),
            error: self.polling.last_error().map(str::to_string),
            rate_history: self.rate_history.clone(),
            running: self.polling.is_running(),
            interval: self.polling.interval(),
            renderable: self.renderable.clone(),
        }
    }

    /// Apply an operator command
    ///
    /// Returns true when the poll timer has to be re-armed. `Shutdown` is
    /// handled by [`Self::run`] and is a no-op here.
    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::SetRunning(running) => {
                let changed = self.polling.set_running(running);
                if changed {
                    info!("Replay {}", if running { "resumed" } else { "paused" });
                }
                changed
            }
            Command::ToggleRunning => {
                self.polling.toggle_running();
                info!("Replay {}", if self.polling.is_running() { "resumed" } else { "paused" });
                true
            }
            Command::SetInterval(interval_ms) => {
                self.polling.set_interval(interval_ms);
                info!("Replay interval set to {:?}", self.polling.interval());
                true
            }
            Command::ResetIndex => {
                self.polling.reset_index();
                info!("Replay index reset");
                true
            }
            Command::SetLiveMode(enabled) => {
                if enabled == self.live_mode {
                    return false;
                }
                self.live_mode = enabled;
                if enabled {
                    info!("Live mode on");
                    self.live.enable();
                } else {
                    info!("Live mode off");
                    self.live.disable();
                }
                // A polling loop held back during live mode resumes with an immediate fetch
                !self.poll_in_live_mode
            }
            Command::Shutdown => false,
        }
    }

    /// Advance the smoothed pose one frame
    pub fn frame(&mut self) {
        let target = self.target();
        self.smoother.step(&mut self.rendered, &target);
    }

    fn should_poll(&self) -> bool {
        self.polling.is_running() && (!self.live_mode || self.poll_in_live_mode)
    }

    fn issue_fetch(&mut self) {
        let Some(ticket) = self.polling.begin_fetch() else {
            debug!("Replay fetch still pending; skipping tick");
            return;
        };

        let replay = Arc::clone(&self.replay);
        let tx = self.fetch_tx.clone();
        let timeout = self.fetch_timeout;
        tokio::spawn(async move {
            // An unanswered fetch must not hold the in-flight slot forever
            let result = match tokio::time::timeout(timeout, replay.fetch(ticket.index)).await {
                Ok(result) => result,
                Err(_) => Err(TelloTwinError::Transport(format!(
                    "no response within {}ms",
                    timeout.as_millis()
                ))),
            };
            let _ = tx.send((ticket, result));
        });
    }

    fn complete_fetch(&mut self, ticket: FetchTicket, result: Result<TelemetryRecord>) {
        match self.polling.complete(ticket, result) {
            PollOutcome::Advanced { index } => {
                debug!("Replay row {} received", index - 1);
                if let Some(record) = self.polling.last_record() {
                    self.rate_history.push(record.number("Rate"));
                }
            }
            PollOutcome::Failed => warn!(
                "Replay fetch for row {} failed: {}",
                ticket.index,
                self.polling.last_error().unwrap_or_default()
            ),
            PollOutcome::Stale => debug!("Dropping stale replay response for row {}", ticket.index),
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    /// Run until [`Command::Shutdown`] or until every command sender is gone
    ///
    /// The live subscription is torn down before returning.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<()> {
        if self.live_mode {
            self.live.enable();
        }

        let mut poll_timer = self.polling.timer();
        let mut frame_timer = interval(self.frame_period);
        frame_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Dashboard running: replay every {:?}, {} mode",
            self.polling.interval(),
            if self.live_mode { "live" } else { "CSV" }
        );
        self.publish();

        loop {
            let polling = self.should_poll();

            tokio::select! {
                _ = poll_timer.tick(), if polling => self.issue_fetch(),

                Some((ticket, result)) = self.fetch_rx.recv() => self.complete_fetch(ticket, result),

                Some(event) = self.live_rx.recv() => {
                    self.live.handle_event(event);
                }

                _ = frame_timer.tick() => self.frame(),

                command = commands.recv() => match command {
                    None | Some(Command::Shutdown) => break,
                    Some(command) => {
                        if self.apply(command) {
                            poll_timer = self.polling.timer();
                        }
                    }
                },
            }

            self.publish();
        }

        self.live.disable();
        self.publish();
        info!("Dashboard stopped");
        Ok(())
    }
}

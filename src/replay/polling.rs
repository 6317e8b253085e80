//! # Polling Loop
//!
//! State machine behind the replay timer. The dashboard owns the actual
//! `tokio` timer and fetch tasks; this type decides what to fetch next and
//! which responses still count.
//!
//! ## Generations
//!
//! Every control change that cancels the pending timer (pause, resume,
//! interval change, index reset) starts a new generation. A response whose
//! ticket belongs to an older generation is stale and dropped, so a slow
//! fetch can never overwrite state produced after the change.
//!
//! ## Index rules
//!
//! - Starts at 0
//! - A successful fetch advances the index by exactly one
//! - A failed fetch leaves the index alone; the same row is retried next tick

use std::time::Duration;
use tokio::time::{interval, Interval, MissedTickBehavior};

use crate::error::Result;
use crate::telemetry::TelemetryRecord;

/// Lower bound on the polling period in milliseconds
pub const MIN_INTERVAL_MS: u64 = 50;

/// Period used when no interval has been entered
pub const DEFAULT_INTERVAL_MS: u64 = 300;

/// Identifies one issued fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    pub generation: u64,
    pub index: u64,
}

/// Result of feeding a fetch response back into the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Row accepted; `index` is the next row to fetch
    Advanced { index: u64 },
    /// Fetch failed; index unchanged
    Failed,
    /// Response belonged to a cancelled generation and was ignored
    Stale,
}

/// Replay polling state
#[derive(Debug, Clone)]
pub struct PollingLoop {
    index: u64,
    running: bool,
    interval_ms: u64,
    generation: u64,
    in_flight: Option<FetchTicket>,
    last_record: Option<TelemetryRecord>,
    last_error: Option<String>,
}

impl PollingLoop {
    /// Create a loop at index 0
    ///
    /// # Examples
    ///
    /// ```
    /// use tellotwin::replay::PollingLoop;
    ///
    /// let mut polling = PollingLoop::new(300, true);
    /// let ticket = polling.begin_fetch().unwrap();
    /// assert_eq!(ticket.index, 0);
    ///
    /// // Only one fetch may be outstanding
    /// assert!(polling.begin_fetch().is_none());
    /// ```
    pub fn new(interval_ms: u64, running: bool) -> Self {
        Self {
            index: 0,
            running,
            interval_ms: normalize_interval(interval_ms),
            generation: 0,
            in_flight: None,
            last_record: None,
            last_error: None,
        }
    }

    /// Next row index to fetch
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Interval as entered, before flooring
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Effective timer period (floored at [`MIN_INTERVAL_MS`])
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(MIN_INTERVAL_MS))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Most recently accepted row
    pub fn last_record(&self) -> Option<&TelemetryRecord> {
        self.last_record.as_ref()
    }

    /// Message of the last failed fetch, cleared by the next success
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a fetch of the current generation is outstanding
    pub fn is_fetching(&self) -> bool {
        self.in_flight
            .is_some_and(|ticket| ticket.generation == self.generation)
    }

    /// Pause or resume; returns true when the state changed
    pub fn set_running(&mut self, running: bool) -> bool {
        if self.running == running {
            return false;
        }
        self.running = running;
        self.restart();
        true
    }

    pub fn toggle_running(&mut self) {
        self.set_running(!self.running);
    }

    /// Change the period; 0 falls back to [`DEFAULT_INTERVAL_MS`]
    pub fn set_interval(&mut self, interval_ms: u64) {
        self.interval_ms = normalize_interval(interval_ms);
        self.restart();
    }

    /// Rewind to row 0
    pub fn reset_index(&mut self) {
        self.index = 0;
        self.restart();
    }

    /// Issue a fetch for the current index
    ///
    /// Returns `None` while paused or while a fetch of this generation is
    /// still outstanding.
    pub fn begin_fetch(&mut self) -> Option<FetchTicket> {
        if !self.running || self.is_fetching() {
            return None;
        }

        let ticket = FetchTicket {
            generation: self.generation,
            index: self.index,
        };
        self.in_flight = Some(ticket);
        Some(ticket)
    }

    /// Feed a fetch response back
    pub fn complete(&mut self, ticket: FetchTicket, result: Result<TelemetryRecord>) -> PollOutcome {
        if self.in_flight == Some(ticket) {
            self.in_flight = None;
        }

        if ticket.generation != self.generation || ticket.index != self.index {
            return PollOutcome::Stale;
        }

        match result {
            Ok(record) => {
                self.last_record = Some(record);
                self.last_error = None;
                self.index += 1;
                PollOutcome::Advanced { index: self.index }
            }
            Err(e) => {
                self.last_error = Some(e.to_string());
                PollOutcome::Failed
            }
        }
    }

    /// Fresh timer for the current period
    ///
    /// The first tick completes immediately, so a resumed or re-timed loop
    /// fetches at once and then settles into its cadence.
    pub fn timer(&self) -> Interval {
        let mut timer = interval(self.interval());
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    }

    fn restart(&mut self) {
        self.generation += 1;
    }
}

fn normalize_interval(interval_ms: u64) -> u64 {
    if interval_ms == 0 {
        DEFAULT_INTERVAL_MS
    } else {
        interval_ms
    }
}

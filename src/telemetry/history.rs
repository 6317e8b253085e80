//! # Metric History
//!
//! Bounded rolling window over one replay metric, oldest sample first.
//! Feeds the Rate trend alongside the pose.

use std::collections::VecDeque;

/// Samples kept for the Rate trend
pub const RATE_HISTORY_LEN: usize = 80;

/// Rolling window of the most recent samples
///
/// # Examples
///
/// ```
/// use tellotwin::telemetry::history::MetricHistory;
///
/// let mut history = MetricHistory::new(2);
/// history.push(5.0);
/// history.push(7.0);
/// history.push(9.0);
///
/// assert_eq!(history.samples().collect::<Vec<_>>(), vec![7.0, 9.0]);
/// assert_eq!(history.range(), (0.0, 9.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MetricHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for MetricHistory {
    fn default() -> Self {
        Self::new(RATE_HISTORY_LEN)
    }
}

impl MetricHistory {
    /// Create an empty window holding at most `capacity` samples (at least 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once full
    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    /// Plot range: the samples' min and max, widened to include 0 and 1
    pub fn range(&self) -> (f64, f64) {
        self.samples()
            .fold((0.0_f64, 1.0_f64), |(min, max), v| (min.min(v), max.max(v)))
    }
}

//! # Backoff schedules.
//!
//! A [`BackoffSchedule`] is an explicit, ordered list of waits. It is consumed left-to-right,
//! one delay per retry; once it is exhausted the next failure is terminal. An empty schedule
//! means exactly one attempt.
//!
//! Every task takes its own copy of the schedule ([`BackoffSchedule::to_queue`]), so tasks
//! defined with the "same" schedule never share consumption state.
//!
//! Schedules can be written out by hand or generated with [`ExponentialBackoff`]:
//! ```rust
//! use std::time::Duration;
//! use loadvisor::{BackoffSchedule, ExponentialBackoff, JitterPolicy};
//!
//! let manual = BackoffSchedule::from_millis([200, 300]);
//! assert_eq!(manual.len(), 2);
//! assert_eq!(manual.total(), Duration::from_millis(500));
//!
//! let generated = ExponentialBackoff {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(1),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! }
//! .schedule(4);
//! assert_eq!(generated, BackoffSchedule::from_millis([100, 200, 400, 800]));
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Ordered waits between attempts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackoffSchedule {
    delays: Vec<Duration>,
}

impl BackoffSchedule {
    /// Creates a schedule from explicit delays.
    pub fn new(delays: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            delays: delays.into_iter().collect(),
        }
    }

    /// Creates a schedule from millisecond delays.
    pub fn from_millis(delays: impl IntoIterator<Item = u64>) -> Self {
        Self::new(delays.into_iter().map(Duration::from_millis))
    }

    /// Number of retries this schedule allows.
    pub fn len(&self) -> usize {
        self.delays.len()
    }

    /// `true` when no retry is allowed.
    pub fn is_empty(&self) -> bool {
        self.delays.is_empty()
    }

    /// Sum of all delays.
    pub fn total(&self) -> Duration {
        self.delays.iter().sum()
    }

    /// Iterates the delays in consumption order.
    pub fn iter(&self) -> impl Iterator<Item = &Duration> {
        self.delays.iter()
    }

    /// Independent, consumable copy for one run.
    pub(crate) fn to_queue(&self) -> VecDeque<Duration> {
        self.delays.iter().copied().collect()
    }
}

/// Generator for exponentially growing schedules.
///
/// The delay for retry `n` (0-indexed) is `first × factor^n`, clamped to `max`, then jittered.
/// The base is derived from `n` alone, so jitter never feeds back into later delays.
#[derive(Clone, Copy, Debug)]
pub struct ExponentialBackoff {
    /// Delay before the first retry.
    pub first: Duration,
    /// Cap for any single delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for ExponentialBackoff {
    /// `first = 100ms`, `factor = 2.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl ExponentialBackoff {
    /// Delay for retry `n` (0-indexed).
    pub fn next(&self, n: u32) -> Duration {
        let exp = n.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };
        self.jitter.apply(base)
    }

    /// Materializes a schedule allowing `retries` retries.
    pub fn schedule(&self, retries: u32) -> BackoffSchedule {
        BackoffSchedule::new((0..retries).map(|n| self.next(n)))
    }
}

//! # Retry policy for a single load.
//!
//! [`RetryPolicy`] bundles what the retry controller needs for one run:
//! - [`RetryPolicy::backoff`] waits between attempts;
//! - [`RetryPolicy::attempt_timeout`] optional bound on each attempt (`0` = none);
//! - [`RetryPolicy::fail_on_timeout`] whether a timed out attempt counts as a failure
//!   carrying [`LoadError::Timeout`](crate::LoadError::Timeout), or only as a signal to move
//!   on to the next attempt.
//!
//! ## Timeout modes
//! ```text
//! fail_on_timeout = true   → timeout is an error: retried while backoff remains, then rejected
//! fail_on_timeout = false  → timeout is advisory: retried while backoff remains; on the last
//!                            attempt the controller keeps waiting for the attempt itself
//! ```
//!
//! A policy is immutable once a load starts; each run consumes its own copy of the schedule.

use std::time::Duration;

use crate::policies::BackoffSchedule;

/// Retry configuration for one load.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Waits between attempts, consumed one per retry.
    pub backoff: BackoffSchedule,
    /// Per-attempt timeout (`None` or zero = unbounded).
    pub attempt_timeout: Option<Duration>,
    /// Whether a timed out attempt produces [`LoadError::Timeout`](crate::LoadError::Timeout).
    pub fail_on_timeout: bool,
}

impl RetryPolicy {
    /// Creates a policy with explicit parameters.
    pub fn new(
        backoff: BackoffSchedule,
        attempt_timeout: Option<Duration>,
        fail_on_timeout: bool,
    ) -> Self {
        Self {
            backoff,
            attempt_timeout,
            fail_on_timeout,
        }
    }

    /// Returns the effective per-attempt timeout; zero is treated as none.
    #[inline]
    pub fn timeout(&self) -> Option<Duration> {
        self.attempt_timeout.filter(|d| !d.is_zero())
    }

    /// Total user-visible budget across the whole retry sequence.
    ///
    /// With a per-attempt timeout `t` and a schedule `[d1..dn]` (n > 0) the budget is
    /// `t × n + Σ di`; without backoff it is `t`. `None` when no timeout was given.
    ///
    /// An explicit zero timeout still counts here: the engine ignores it, but the budget is
    /// then `Σ di` (or zero), so `timed_out` flips once the backoff waits are used up.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use loadvisor::{BackoffSchedule, RetryPolicy};
    ///
    /// let policy = RetryPolicy::new(
    ///     BackoffSchedule::from_millis([200, 200]),
    ///     Some(Duration::from_millis(400)),
    ///     false,
    /// );
    /// assert_eq!(policy.total_budget(), Some(Duration::from_millis(1200)));
    /// ```
    pub fn total_budget(&self) -> Option<Duration> {
        let timeout = self.attempt_timeout?;
        if self.backoff.is_empty() {
            return Some(timeout);
        }
        let retries = u32::try_from(self.backoff.len()).unwrap_or(u32::MAX);
        Some(timeout.saturating_mul(retries).saturating_add(self.backoff.total()))
    }

    /// Returns a new policy with updated timeout mode.
    pub fn with_fail_on_timeout(mut self, fail: bool) -> Self {
        self.fail_on_timeout = fail;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_timeout_disables_attempt_limit() {
        let policy = RetryPolicy::new(BackoffSchedule::default(), Some(Duration::ZERO), true);
        assert_eq!(policy.timeout(), None);
        assert_eq!(policy.total_budget(), Some(Duration::ZERO));
    }

    #[test]
    fn test_zero_timeout_budget_is_backoff_sum() {
        let policy = RetryPolicy::new(
            BackoffSchedule::from_millis([100, 250]),
            Some(Duration::ZERO),
            false,
        );
        assert_eq!(policy.timeout(), None);
        assert_eq!(policy.total_budget(), Some(Duration::from_millis(350)));
    }

    #[test]
    fn test_no_timeout_has_no_budget() {
        let policy = RetryPolicy::new(BackoffSchedule::from_millis([100]), None, false);
        assert_eq!(policy.total_budget(), None);
    }

    #[test]
    fn test_budget_without_backoff_is_timeout() {
        let policy = RetryPolicy::new(
            BackoffSchedule::default(),
            Some(Duration::from_millis(300)),
            false,
        );
        assert_eq!(policy.total_budget(), Some(Duration::from_millis(300)));
    }

    #[test]
    fn test_budget_adds_backoff() {
        let policy = RetryPolicy::new(
            BackoffSchedule::from_millis([100, 200, 300]),
            Some(Duration::from_millis(50)),
            false,
        );
        assert_eq!(policy.total_budget(), Some(Duration::from_millis(750)));
    }
}

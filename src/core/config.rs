//! # Preloader configuration.
//!
//! [`PreloadConfig`] centralizes the defaults every definition inherits unless its builder
//! overrides them, plus the event bus sizing.
//!
//! ## Sentinel values
//! - `timeout = 0s` → no per-attempt timeout and no `timed_out` flag
//! - `bus_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::BackoffSchedule;

/// Global configuration for a [`Preloader`](crate::Preloader).
///
/// ## Field semantics
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `delay`: default time before a mounted load reports `past_delay`
/// - `timeout`: default per-attempt timeout (`0s` = none)
/// - `backoff`: default retry schedule (empty = single attempt)
#[derive(Clone, Debug)]
pub struct PreloadConfig {
    /// Capacity of the event bus broadcast channel.
    pub bus_capacity: usize,
    /// Default delay before `past_delay` flips.
    pub delay: Duration,
    /// Default per-attempt timeout.
    pub timeout: Duration,
    /// Default retry schedule.
    pub backoff: BackoffSchedule,
}

impl PreloadConfig {
    /// Returns the default delay (always set; `0` flips `past_delay` immediately).
    #[inline]
    pub fn default_delay(&self) -> Option<Duration> {
        Some(self.delay)
    }

    /// Returns the default per-attempt timeout as an `Option` (`0s` → `None`).
    #[inline]
    pub fn default_timeout(&self) -> Option<Duration> {
        if self.timeout.is_zero() {
            None
        } else {
            Some(self.timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for PreloadConfig {
    /// Default configuration:
    ///
    /// - `bus_capacity = 1024`
    /// - `delay = 200ms`
    /// - `timeout = 0s` (none)
    /// - `backoff = []`
    fn default() -> Self {
        Self {
            bus_capacity: 1024,
            delay: Duration::from_millis(200),
            timeout: Duration::ZERO,
            backoff: BackoffSchedule::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = PreloadConfig::default();
        assert_eq!(cfg.default_delay(), Some(Duration::from_millis(200)));
        assert_eq!(cfg.default_timeout(), None);
        assert!(cfg.backoff.is_empty());
    }

    #[test]
    fn test_sentinels() {
        let cfg = PreloadConfig {
            bus_capacity: 0,
            timeout: Duration::from_millis(500),
            ..PreloadConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.default_timeout(), Some(Duration::from_millis(500)));
    }
}

//! Retry policies.
//!
//! This module groups the knobs that control **how often** a load is attempted
//! and **how long** each attempt may take.
//!
//! ## Contents
//! - [`RetryPolicy`]        per-load bundle: backoff schedule, per-attempt timeout, timeout mode
//! - [`BackoffSchedule`]    explicit ordered delays, one consumed per retry
//! - [`ExponentialBackoff`] generator for schedules (first / factor / max + jitter)
//! - [`JitterPolicy`]       randomization applied to generated delays
//!
//! ## Quick wiring
//! ```text
//! ChunkBuilder { backoff, timeout } ──► RetryPolicy { backoff, attempt_timeout, fail_on_timeout }
//!      └─► core::retry::RetryController:
//!           - attempt_timeout bounds each attempt
//!           - backoff.to_queue() is popped once per retry; empty queue = terminal
//! ```
//!
//! ## Defaults
//! - `BackoffSchedule::default()` is empty: one attempt, first failure is terminal.
//! - `RetryPolicy::default()` has no timeout and `fail_on_timeout = false`.

mod backoff;
mod jitter;
mod retry;

pub use backoff::{BackoffSchedule, ExponentialBackoff};
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;

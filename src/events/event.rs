//! # Load events.
//!
//! [`EventKind`] classifies events in three groups:
//! - **Attempt events**: one load's progress (starting, failed, timeout, backoff, settled)
//! - **Registry events**: definitions registered, drains started/finished/failed, deferrals
//! - **Subscriber events**: overflow and panics inside subscriber workers
//!
//! [`Event`] carries optional metadata; which fields are set depends on the kind.
//!
//! ## Ordering guarantees
//! Each event gets a process-wide, monotonically increasing `seq`.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use loadvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BackoffScheduled)
//!     .with_task("settings-page")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(300))
//!     .with_reason("network");
//!
//! assert_eq!(ev.kind, EventKind::BackoffScheduled);
//! assert_eq!(ev.delay_ms, Some(300));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of load events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Attempt events ===
    /// An attempt is starting.
    ///
    /// Sets: `task`, `attempt` (1-based).
    LoadStarting,

    /// An attempt failed (the load may still be retried).
    ///
    /// Sets: `task`, `attempt`, `reason`.
    AttemptFailed,

    /// An attempt exceeded its per-attempt timeout.
    ///
    /// Sets: `task`, `attempt`, `timeout_ms`.
    TimeoutHit,

    /// The next attempt was scheduled.
    ///
    /// Sets: `task`, `attempt` (the failed one), `delay_ms`, `reason` (absent for advisory timeouts).
    BackoffScheduled,

    /// The load settled with a value.
    ///
    /// Sets: `task`, `attempt`.
    LoadSucceeded,

    /// The load settled with an error; no more attempts.
    ///
    /// Sets: `task`, `attempt`, `reason`.
    LoadFailed,

    // === Registry events ===
    /// A definition was registered for preloading.
    ///
    /// Sets: `task`.
    ChunkRegistered,

    /// A definition discarded its current load and started over.
    ///
    /// Sets: `task`.
    RetryRequested,

    /// A drain pass is starting.
    ///
    /// Sets: `reason` (registry name), `count` (initializers in this pass), `attempt` (pass number).
    DrainStarted,

    /// A drain completed with the registry empty (or nothing ready).
    ///
    /// Sets: `reason` (registry name).
    DrainFinished,

    /// A forced drain stopped on the first surfaced error.
    ///
    /// Sets: `reason` (error message), `count` (pass number).
    DrainFailed,

    /// Readiness-gated entries were left registered for a later pass.
    ///
    /// Sets: `count` (entries deferred), `reason` (`"not_ready"` or `"no_probe"`).
    ReadyDeferred,

    // === Subscriber events ===
    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason`.
    SubscriberOverflow,

    /// Subscriber panicked while processing an event.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic info).
    SubscriberPanicked,
}

/// Load event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Definition/loader name, if applicable.
    pub task: Option<Arc<str>>,
    /// Attempt (or drain pass) number, starting from 1.
    pub attempt: Option<u32>,
    /// Backoff delay in milliseconds.
    pub delay_ms: Option<u32>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: Option<u32>,
    /// Number of entries involved (drains, deferrals).
    pub count: Option<u32>,
    /// Human-readable reason (errors, registry names, overflow details).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            attempt: None,
            delay_ms: None,
            timeout_ms: None,
            count: None,
            reason: None,
        }
    }

    /// Attaches a definition/loader name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches an attempt number.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a timeout (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an entry count.
    #[inline]
    pub fn with_count(mut self, n: usize) -> Self {
        self.count = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

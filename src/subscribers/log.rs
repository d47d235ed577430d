//! # LogWriter: simple event printer
//!
//! A minimal subscriber that prints incoming [`Event`]s to stdout. Use it for demos and tests.
//!
//! ## Example output
//! ```text
//! [registered] chunk="settings"
//! [starting] chunk="settings" attempt=1
//! [timeout] chunk="settings" attempt=1 timeout_ms=400
//! [backoff] chunk="settings" delay_ms=200 after_attempt=1 err=None
//! [loaded] chunk="settings" attempt=2
//! [drain-finished] registry="all"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let task = e.task.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref();
        match e.kind {
            EventKind::ChunkRegistered => println!("[registered] chunk={task:?}"),
            EventKind::RetryRequested => println!("[retry] chunk={task:?}"),
            EventKind::LoadStarting => {
                println!("[starting] chunk={task:?} attempt={:?}", e.attempt)
            }
            EventKind::AttemptFailed => {
                println!(
                    "[attempt-failed] chunk={task:?} attempt={:?} err={reason:?}",
                    e.attempt
                )
            }
            EventKind::TimeoutHit => println!(
                "[timeout] chunk={task:?} attempt={:?} timeout_ms={:?}",
                e.attempt, e.timeout_ms
            ),
            EventKind::BackoffScheduled => println!(
                "[backoff] chunk={task:?} delay_ms={:?} after_attempt={:?} err={reason:?}",
                e.delay_ms, e.attempt
            ),
            EventKind::LoadSucceeded => {
                println!("[loaded] chunk={task:?} attempt={:?}", e.attempt)
            }
            EventKind::LoadFailed => println!(
                "[failed] chunk={task:?} attempt={:?} err={reason:?}",
                e.attempt
            ),
            EventKind::DrainStarted => println!(
                "[drain] registry={reason:?} pass={:?} count={:?}",
                e.attempt, e.count
            ),
            EventKind::DrainFinished => println!("[drain-finished] registry={reason:?}"),
            EventKind::DrainFailed => {
                println!("[drain-failed] pass={:?} err={reason:?}", e.attempt)
            }
            EventKind::ReadyDeferred => {
                println!("[ready-deferred] count={:?} reason={reason:?}", e.count)
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber-overflow] subscriber={task:?} reason={reason:?}")
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber-panicked] subscriber={task} info={reason:?}")
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}

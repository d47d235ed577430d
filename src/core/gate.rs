//! # TimingGate: UI timing flags for one pending load.
//!
//! Two monotonic flags derived from timers that start when the gate is attached:
//! - `past_delay` becomes `true` once `delay` elapsed while the load is still pending
//!   (show a placeholder),
//! - `timed_out` becomes `true` once `timeout` elapsed while the load is still pending
//!   (show a "taking too long" state).
//!
//! ```text
//! attach(completion, delay, timeout)
//!   ├─ delay == 0 ─► past_delay = true (synchronously)
//!   └─► spawn select! {
//!         completion       ─► stop (flags keep their values)
//!         cancel token     ─► stop (gate dropped or replaced)
//!         join(delay timer ─► past_delay = true,
//!              timeout timer ─► timed_out = true)
//!       }
//! ```
//!
//! ## Rules
//! - Flags only ever go `false → true`; they are not reset when the load settles.
//! - Both timers are cancelled when the load settles or the gate is dropped.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Snapshot of both flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TimingFlags {
    /// The placeholder delay elapsed before the load settled.
    pub past_delay: bool,
    /// The UI timeout elapsed before the load settled.
    pub timed_out: bool,
}

/// Owns the timers of one load; dropping it stops them.
#[derive(Debug)]
pub struct TimingGate {
    flags: watch::Receiver<TimingFlags>,
    cancel: CancellationToken,
}

impl TimingGate {
    /// Starts the timers; they are abandoned once `completion` resolves.
    ///
    /// `None` disables the corresponding timer. Must be called inside a tokio runtime.
    pub fn attach<F>(completion: F, delay: Option<Duration>, timeout: Option<Duration>) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let initial = TimingFlags {
            past_delay: delay == Some(Duration::ZERO),
            timed_out: false,
        };
        let (tx, rx) = watch::channel(initial);
        let cancel = CancellationToken::new();

        let delay = delay.filter(|d| !d.is_zero());
        if delay.is_some() || timeout.is_some() {
            let token = cancel.clone();
            tokio::spawn(async move {
                let delay_timer = async {
                    if let Some(d) = delay {
                        time::sleep(d).await;
                        tx.send_if_modified(|f| !std::mem::replace(&mut f.past_delay, true));
                    }
                };
                let timeout_timer = async {
                    if let Some(t) = timeout {
                        time::sleep(t).await;
                        tx.send_if_modified(|f| !std::mem::replace(&mut f.timed_out, true));
                    }
                };

                tokio::select! {
                    _ = completion => {}
                    _ = token.cancelled() => {}
                    _ = async { tokio::join!(delay_timer, timeout_timer) } => {}
                }
            });
        }

        Self { flags: rx, cancel }
    }

    /// Current flags.
    pub fn flags(&self) -> TimingFlags {
        *self.flags.borrow()
    }

    /// `true` once the placeholder delay elapsed while pending.
    pub fn past_delay(&self) -> bool {
        self.flags.borrow().past_delay
    }

    /// `true` once the UI timeout elapsed while pending.
    pub fn timed_out(&self) -> bool {
        self.flags.borrow().timed_out
    }

    /// A receiver notified on each flag change.
    pub fn subscribe(&self) -> watch::Receiver<TimingFlags> {
        self.flags.clone()
    }
}

impl Drop for TimingGate {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::{LoadState, LoadTask};
    use crate::policies::RetryPolicy;
    use crate::test_support::{Script, advance};
    use futures::FutureExt;

    fn ms(v: u64) -> Option<Duration> {
        Some(Duration::from_millis(v))
    }

    #[tokio::test(start_paused = true)]
    async fn test_flags_follow_pending_load() {
        let task = LoadTask::<&str>::create(Script::ok("slow", 400, "module"), RetryPolicy::default());
        let gate = TimingGate::attach(task.completion().map(|_| ()), ms(100), ms(200));

        assert_eq!(gate.flags(), TimingFlags::default());

        advance(150).await;
        assert!(gate.past_delay());
        assert!(!gate.timed_out());

        advance(100).await;
        assert!(gate.timed_out());
        assert!(task.is_loading());

        advance(200).await;
        assert_eq!(task.state(), LoadState::Loaded("module"));
        assert_eq!(
            gate.flags(),
            TimingFlags {
                past_delay: true,
                timed_out: true,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_delay_is_immediate() {
        let gate = TimingGate::attach(std::future::pending(), ms(0), None);
        assert!(gate.past_delay());
        assert!(!gate.timed_out());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_stops_timers() {
        let task = LoadTask::<u8>::create(Script::ok("fast", 50, 1u8), RetryPolicy::default());
        let gate = TimingGate::attach(task.completion().map(|_| ()), ms(100), ms(200));

        advance(300).await;
        assert_eq!(gate.flags(), TimingFlags::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_timers() {
        let gate = TimingGate::attach(std::future::pending(), ms(100), ms(200));
        let rx = gate.subscribe();
        drop(gate);

        advance(300).await;
        assert_eq!(*rx.borrow(), TimingFlags::default());
    }
}

//! # RetryController: one load, attempted until it settles.
//!
//! Runs a [`Loader`](crate::Loader) under a [`RetryPolicy`]:
//! - bounds each attempt by the per-attempt timeout,
//! - waits the next backoff delay after a failure or timeout,
//! - settles with the first value, or with the last error once the schedule is exhausted.
//!
//! ## Flow
//! ```text
//! loop {
//!   ├─► attempt += 1, publish LoadStarting
//!   ├─► loader.load()           (the first attempt is started by the caller, synchronously;
//!   │                            a panic here is Err)
//!   │     ├─ Err(e)             ─► failure(e)
//!   │     └─ Ok(fut) ─► timeout(fut)
//!   │           ├─ Ok(v)        ─► publish LoadSucceeded, return Ok(v)
//!   │           ├─ Err(e)       ─► failure(e)
//!   │           └─ elapsed      ─► publish TimeoutHit
//!   │                 ├─ last attempt, advisory ─► keep awaiting fut
//!   │                 └─ otherwise             ─► fut joins `late`,
//!   │                                             failure(Timeout) or failure(none)
//!   └─► backoff.pop_front()
//!         ├─ Some(d) ─► publish BackoffScheduled, sleep(d), continue
//!         └─ None    ─► publish LoadFailed, return Err(last error)
//! }
//!
//! every await above also polls `late`: the first timed out attempt to succeed settles the load
//! ```
//!
//! ## Rules
//! - Only one attempt is *started* at a time; a timed out attempt keeps running in `late`.
//! - A late success wins over everything still pending; a late failure is ignored.
//! - The schedule is a private copy consumed left-to-right.
//! - The controller returns at most once; the task layer additionally guards its state with a
//!   settled flag so a terminal state is never overwritten.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Either};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time;

use crate::{
    error::LoadError,
    events::{Bus, Event, EventKind},
    loaders::{LoadFuture, LoaderRef},
    policies::RetryPolicy,
};

/// Timed out attempts still running, tagged with their attempt number.
type Late<T> = FuturesUnordered<BoxFuture<'static, (u32, Result<T, LoadError>)>>;

/// Starts one attempt; a panic inside `load` counts as a synchronous failure.
pub(crate) fn start<T: 'static>(loader: &LoaderRef<T>) -> Result<LoadFuture<T>, LoadError> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| loader.load())) {
        Ok(started) => started,
        Err(payload) => Err(LoadError::from_panic(payload.as_ref())),
    }
}

/// Awaits `fut` unless a late attempt succeeds first.
async fn race<T, F: Future>(late: &mut Late<T>, fut: F) -> Either<F::Output, (u32, T)> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            out = &mut fut => return Either::Left(out),
            Some((n, res)) = late.next(), if !late.is_empty() => {
                if let Ok(v) = res {
                    return Either::Right((n, v));
                }
            }
        }
    }
}

/// Drives the attempts of a single load.
pub(crate) struct RetryController<T> {
    loader: LoaderRef<T>,
    policy: RetryPolicy,
    bus: Bus,
}

impl<T: Send + 'static> RetryController<T> {
    pub(crate) fn new(loader: LoaderRef<T>, policy: RetryPolicy, bus: Bus) -> Self {
        Self {
            loader,
            policy,
            bus,
        }
    }

    /// Runs until the load settles.
    ///
    /// `first` is the already started first attempt.
    pub(crate) async fn run(self, first: Result<LoadFuture<T>, LoadError>) -> Result<T, LoadError> {
        let mut backoff: VecDeque<Duration> = self.policy.backoff.to_queue();
        let mut late: Late<T> = FuturesUnordered::new();
        let mut started = Some(first);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.publish(Event::new(EventKind::LoadStarting).with_attempt(attempt));

            let begun = match started.take() {
                Some(first) => first,
                None => start(&self.loader),
            };
            let last = backoff.is_empty();

            let failure = match begun {
                Ok(fut) => match self.attempt(&mut late, fut, attempt, last).await {
                    Ok((n, value)) => return Ok(self.succeeded(n, value)),
                    Err(failure) => failure,
                },
                Err(e) => Some(e),
            };

            if let Some(e) = &failure {
                self.publish(
                    Event::new(EventKind::AttemptFailed)
                        .with_attempt(attempt)
                        .with_reason(e.to_string()),
                );
            }

            let Some(delay) = backoff.pop_front() else {
                return match failure {
                    Some(e) => {
                        self.publish(
                            Event::new(EventKind::LoadFailed)
                                .with_attempt(attempt)
                                .with_reason(e.to_string()),
                        );
                        Err(e)
                    }
                    // Advisory timeout with nothing left to try: only a late attempt can settle.
                    None => match race(&mut late, std::future::pending::<Infallible>()).await {
                        Either::Left(never) => match never {},
                        Either::Right((n, value)) => Ok(self.succeeded(n, value)),
                    },
                };
            };

            let mut ev = Event::new(EventKind::BackoffScheduled)
                .with_attempt(attempt)
                .with_delay(delay);
            if let Some(e) = &failure {
                ev = ev.with_reason(e.to_string());
            }
            self.publish(ev);

            if let Either::Right((n, value)) = race(&mut late, time::sleep(delay)).await {
                return Ok(self.succeeded(n, value));
            }
        }
    }

    /// Awaits one attempt under the per-attempt timeout.
    ///
    /// Returns the winning attempt number with its value. `Err(None)` is an advisory timeout:
    /// move on without an error.
    async fn attempt(
        &self,
        late: &mut Late<T>,
        mut fut: LoadFuture<T>,
        attempt: u32,
        last: bool,
    ) -> Result<(u32, T), Option<LoadError>> {
        let Some(limit) = self.policy.timeout() else {
            return match race(late, &mut fut).await {
                Either::Left(res) => res.map(|v| (attempt, v)).map_err(Some),
                Either::Right(won) => Ok(won),
            };
        };

        match race(late, time::timeout(limit, &mut fut)).await {
            Either::Left(Ok(res)) => return res.map(|v| (attempt, v)).map_err(Some),
            Either::Right(won) => return Ok(won),
            Either::Left(Err(_elapsed)) => {}
        }

        self.publish(
            Event::new(EventKind::TimeoutHit)
                .with_attempt(attempt)
                .with_timeout(limit),
        );
        if last && !self.policy.fail_on_timeout {
            return match race(late, fut).await {
                Either::Left(res) => res.map(|v| (attempt, v)).map_err(Some),
                Either::Right(won) => Ok(won),
            };
        }

        late.push(async move { (attempt, fut.await) }.boxed());
        if self.policy.fail_on_timeout {
            Err(Some(LoadError::Timeout { timeout: limit }))
        } else {
            Err(None)
        }
    }

    fn succeeded(&self, attempt: u32, value: T) -> T {
        self.publish(Event::new(EventKind::LoadSucceeded).with_attempt(attempt));
        value
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev.with_task(self.loader.name()));
    }
}

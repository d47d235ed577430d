//! # PreloadRegistry: ordered initializers drained on demand.
//!
//! Every defined chunk appends its [`Initializer`] here at definition time. A drain forces all
//! of them to run to settlement, including initializers registered *while* the drain is running
//! (side effects of the loads themselves).
//!
//! ## Drain
//! ```text
//! drain_all(surface)
//! loop {
//!   ├─► batch = take-and-clear(entries)        (one lock, no await in between)
//!   ├─ batch empty ─► publish DrainFinished, return Ok
//!   ├─► futs = batch.map(init.invoke(surface))
//!   └─► await futs in completion order
//!         ├─ Err(e) && surface ─► publish DrainFailed, return Err(e)  (siblings keep running)
//!         └─ all settled        ─► next pass
//! }
//! ```
//!
//! ## Rules
//! - An initializer is taken out exactly once, so it is never invoked twice by drains.
//! - Initializers are idempotent: invoking the same one twice joins the same load.
//! - An initializer registered during a pass is picked up by the next pass.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};

use crate::{
    error::LoadError,
    events::{Bus, Event, EventKind},
};

/// Settlement future returned by an initializer.
pub type InitFuture = BoxFuture<'static, Result<(), LoadError>>;

/// Lazily starts (or joins) one load and returns its settlement future.
///
/// `invoke(true)` surfaces the load's terminal error; `invoke(false)` resolves `Ok(())` once
/// settled regardless of the outcome.
#[derive(Clone)]
pub struct Initializer {
    name: Arc<str>,
    f: Arc<dyn Fn(bool) -> InitFuture + Send + Sync>,
}

impl Initializer {
    /// Wraps a closure as an initializer.
    pub fn new<F>(name: impl Into<Arc<str>>, f: F) -> Self
    where
        F: Fn(bool) -> InitFuture + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            f: Arc::new(f),
        }
    }

    /// Name of the chunk behind this initializer.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts (or joins) the load.
    pub fn invoke(&self, surface: bool) -> InitFuture {
        (self.f)(surface)
    }
}

impl std::fmt::Debug for Initializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Initializer").field(&self.name).finish()
    }
}

/// Invokes a batch and awaits it.
///
/// With `surface = true` the first error in completion order is returned as soon as it is seen;
/// the remaining loads keep running in the background.
pub(crate) async fn drain_batch(batch: Vec<Initializer>, surface: bool) -> Result<(), LoadError> {
    let mut pending: FuturesUnordered<InitFuture> =
        batch.iter().map(|init| init.invoke(surface)).collect();

    while let Some(res) = pending.next().await {
        if let Err(e) = res {
            if surface {
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Process-wide list of initializers.
pub struct PreloadRegistry {
    entries: Mutex<Vec<Initializer>>,
    bus: Bus,
}

impl PreloadRegistry {
    /// Creates an empty registry publishing drain events to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            bus,
        }
    }

    /// Appends an initializer. Duplicates are allowed.
    pub fn register(&self, init: Initializer) {
        self.lock().push(init);
    }

    /// Number of initializers waiting for a drain.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if nothing waits for a drain.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forgets every registered initializer without invoking it.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drains until the registry stays empty.
    ///
    /// With `surface = true` the first load error anywhere in the transitive drain fails the
    /// returned future.
    pub async fn drain_all(&self, surface: bool) -> Result<(), LoadError> {
        let mut pass = 0u32;
        loop {
            let batch = self.take();
            if batch.is_empty() {
                self.bus.publish(
                    Event::new(EventKind::DrainFinished)
                        .with_attempt(pass)
                        .with_reason("all"),
                );
                return Ok(());
            }

            pass += 1;
            self.bus.publish(
                Event::new(EventKind::DrainStarted)
                    .with_attempt(pass)
                    .with_count(batch.len())
                    .with_reason("all"),
            );

            if let Err(e) = drain_batch(batch, surface).await {
                self.bus.publish(
                    Event::new(EventKind::DrainFailed)
                        .with_attempt(pass)
                        .with_reason(e.to_string()),
                );
                return Err(e);
            }
        }
    }

    fn take(&self) -> Vec<Initializer> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Initializer>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for PreloadRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreloadRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::task::LoadTask;
    use crate::test_support::{Script, Step, advance, lazy_init};
    use futures::FutureExt;

    #[tokio::test(start_paused = true)]
    async fn test_drain_settles_everything() {
        let reg = PreloadRegistry::new(Bus::detached());
        let a = Script::ok("a", 100, 1u32);
        let b = Script::ok("b", 300, 2u32);
        let (init_a, task_a) = lazy_init(&a);
        let (init_b, task_b) = lazy_init(&b);
        reg.register(init_a);
        reg.register(init_b);

        assert_eq!(a.calls(), 0, "registration does not start loads");
        reg.drain_all(false).await.expect("drain");

        assert!(reg.is_empty());
        assert!(task_a().is_some_and(|t| t.has_loaded()));
        assert!(task_b().is_some_and(|t| t.has_loaded()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_registration_loads_once() {
        let reg = PreloadRegistry::new(Bus::detached());
        let script = Script::ok("twice", 50, "v");
        let (init, _) = lazy_init(&script);
        reg.register(init.clone());
        reg.register(init);

        assert_eq!(reg.len(), 2);
        reg.drain_all(true).await.expect("drain");
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initializers_registered_during_drain_are_drained() {
        let reg = Arc::new(PreloadRegistry::new(Bus::detached()));
        let inner = Script::ok("inner", 100, 2u32);
        let (inner_init, inner_task) = lazy_init(&inner);

        let outer_reg = reg.clone();
        let outer = Initializer::new("outer", move |_surface| {
            let reg = outer_reg.clone();
            let inner_init = inner_init.clone();
            async move {
                advance(50).await;
                reg.register(inner_init);
                Ok(())
            }
            .boxed()
        });
        reg.register(outer);

        reg.drain_all(false).await.expect("drain");
        assert!(reg.is_empty());
        assert_eq!(inner.calls(), 1);
        assert!(inner_task().is_some_and(|t| t.has_loaded()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_drain_surfaces_first_error() {
        let reg = PreloadRegistry::new(Bus::new(16));
        let mut rx = reg.bus.subscribe();
        let thrower = Script::<u32>::new("thrower", vec![Step::Throw("boom")]);
        let slow = Script::ok("slow", 500, 1u32);
        let (init_slow, slow_task) = lazy_init(&slow);
        let (init_throw, _) = lazy_init(&thrower);
        reg.register(init_slow);
        reg.register(init_throw);

        let err = reg.drain_all(true).await.expect_err("forced drain fails");
        assert_eq!(err.to_string(), "boom");
        assert!(slow_task().is_some_and(|t: LoadTask<u32>| t.is_loading()));

        assert_eq!(rx.try_recv().map(|e| e.kind), Ok(EventKind::DrainStarted));
        assert_eq!(rx.try_recv().map(|e| e.kind), Ok(EventKind::DrainFailed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unforced_drain_swallows_errors() {
        let reg = PreloadRegistry::new(Bus::detached());
        let (init, task) = lazy_init(&Script::<u32>::err("broken", 10, "nope"));
        reg.register(init);

        assert_eq!(reg.drain_all(false).await, Ok(()));
        assert!(task().is_some_and(|t| t.state().error().is_some()));
    }

    #[tokio::test]
    async fn test_empty_drain_resolves() {
        let reg = PreloadRegistry::new(Bus::detached());
        assert_eq!(reg.drain_all(true).await, Ok(()));
    }
}

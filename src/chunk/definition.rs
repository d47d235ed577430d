//! Lazily started load shared by every consumer of one definition.
//!
//! ```text
//! init(surface) ──► current load? ── yes ─► join it
//!                          └─ no ──► source.start(policy.with_fail_on_timeout(surface))
//!               └─► settle(surface) ─► hoist once on success ─► resolve
//!
//! restart()     ──► source.start(policy) replaces the current load
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::{
    core::{GroupState, InitFuture, LoadTask, LoadTaskGroup},
    events::Bus,
    policies::RetryPolicy,
};

/// A started load as seen by the definition layer.
pub(crate) trait Loadable: Clone + Send + Sync + 'static {
    /// `true` once every value is available.
    fn has_loaded(&self) -> bool;

    /// Settlement future, surfacing the terminal error when asked to.
    fn settle(&self, surface: bool) -> InitFuture;

    /// Resolves once the load settled, whatever the outcome.
    fn finished(&self) -> BoxFuture<'static, ()>;
}

impl<T: Clone + Send + Sync + 'static> Loadable for LoadTask<T> {
    fn has_loaded(&self) -> bool {
        LoadTask::has_loaded(self)
    }

    fn settle(&self, surface: bool) -> InitFuture {
        LoadTask::settle(self, surface)
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        self.completion().map(|_| ()).boxed()
    }
}

impl<T: Clone + Send + Sync + 'static> Loadable for LoadTaskGroup<T> {
    fn has_loaded(&self) -> bool {
        LoadTaskGroup::has_loaded(self)
    }

    fn settle(&self, surface: bool) -> InitFuture {
        LoadTaskGroup::settle(self, surface)
    }

    fn finished(&self) -> BoxFuture<'static, ()> {
        self.completion().map(|_: GroupState<T>| ()).boxed()
    }
}

/// What a definition loads and how.
pub(crate) trait Source: Send + Sync + 'static {
    type Load: Loadable;

    /// Starts a fresh load.
    fn start(&self, policy: RetryPolicy, bus: &Bus) -> Self::Load;

    /// Runs once per definition after the first successful load.
    fn after_load(&self, _load: &Self::Load) {}
}

pub(crate) struct Definition<S: Source> {
    name: Arc<str>,
    source: S,
    policy: RetryPolicy,
    bus: Bus,
    current: Mutex<Option<S::Load>>,
    hoisted: AtomicBool,
}

impl<S: Source> Definition<S> {
    pub(crate) fn new(name: Arc<str>, source: S, policy: RetryPolicy, bus: Bus) -> Self {
        Self {
            name,
            source,
            policy,
            bus,
            current: Mutex::new(None),
            hoisted: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub(crate) fn bus(&self) -> &Bus {
        &self.bus
    }

    pub(crate) fn source(&self) -> &S {
        &self.source
    }

    /// Starts (first call) or joins the load and returns its settlement future.
    ///
    /// The first caller's `surface` decides whether attempt timeouts fail the load.
    pub(crate) fn init(self: &Arc<Self>, surface: bool) -> InitFuture {
        let load = self.current_or_start(surface);
        self.settle(load, surface)
    }

    /// Settlement future of `load` that hoists before resolving.
    pub(crate) fn settle(self: &Arc<Self>, load: S::Load, surface: bool) -> InitFuture {
        let def = Arc::clone(self);
        let settled = load.settle(surface);
        async move {
            settled.await?;
            def.hoist(&load);
            Ok(())
        }
        .boxed()
    }

    /// The current load, starting one if none exists yet.
    pub(crate) fn current_or_start(&self, fail_on_timeout: bool) -> S::Load {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(load) = current.as_ref() {
            return load.clone();
        }
        let load = self.start(fail_on_timeout);
        *current = Some(load.clone());
        load
    }

    /// Discards the current load and starts a new one.
    pub(crate) fn restart(&self) -> S::Load {
        let load = self.start(false);
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(load.clone());
        load
    }

    /// Runs the after-load hook if `load` succeeded and it has not run yet.
    pub(crate) fn hoist(&self, load: &S::Load) {
        if load.has_loaded() && !self.hoisted.swap(true, Ordering::AcqRel) {
            self.source.after_load(load);
        }
    }

    fn start(&self, fail_on_timeout: bool) -> S::Load {
        self.source.start(
            self.policy.clone().with_fail_on_timeout(fail_on_timeout),
            &self.bus,
        )
    }
}

//! # Chunk: a lazily loaded value with UI timing state.
//!
//! ```text
//! preloader.chunk(loader).with_delay(..).with_timeout(..).with_backoff(..).build()?
//!   ├─► PreloadRegistry::register(initializer)
//!   └─► ReadyRegistry::register(resources, initializer)      (only with resources)
//!
//! chunk.preload()  ─► init(true)   start or join, surface errors
//! chunk.mount()    ─► ChunkHandle { load, TimingGate(delay, budget) }
//!                        ├─ view()     snapshot for rendering
//!                        ├─ changed()  wait for a load or flag change
//!                        └─ retry()    new load + fresh gate (not after success)
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;

use super::definition::{Definition, Loadable, Source};
use crate::{
    core::{
        InitFuture, Initializer, LoadState, LoadTask, Preloader, ResourceIdsFn, TimingFlags,
        TimingGate,
    },
    error::{LoadError, UsageError},
    events::{Bus, Event, EventKind},
    loaders::LoaderRef,
    policies::{BackoffSchedule, RetryPolicy},
};

/// Maps the loaded value to the value exposed to renderers.
pub type ResolveFn<T, V> = Arc<dyn Fn(&T) -> V + Send + Sync>;

/// Receives the loaded value once, after the first successful load.
pub type HoistFn<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) struct Single<T, V> {
    loader: LoaderRef<T>,
    resolve: ResolveFn<T, V>,
    hoist: Option<HoistFn<T>>,
}

impl<T, V> Source for Single<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    type Load = LoadTask<T>;

    fn start(&self, policy: RetryPolicy, bus: &Bus) -> LoadTask<T> {
        LoadTask::spawn(self.loader.clone(), policy, bus)
    }

    fn after_load(&self, load: &LoadTask<T>) {
        if let (Some(hoist), LoadState::Loaded(value)) = (&self.hoist, load.state()) {
            hoist(&value);
        }
    }
}

/// Builder for a [`Chunk`].
pub struct ChunkBuilder<T, V = T> {
    preloader: Arc<Preloader>,
    name: Arc<str>,
    loader: Option<LoaderRef<T>>,
    delay: Option<Duration>,
    timeout: Option<Duration>,
    backoff: BackoffSchedule,
    resolve: ResolveFn<T, V>,
    hoist: Option<HoistFn<T>>,
    resources: Option<ResourceIdsFn>,
}

impl<T: Clone + Send + Sync + 'static> ChunkBuilder<T> {
    /// Starts a definition named `name`; options default to the preloader's config.
    pub fn new(preloader: Arc<Preloader>, name: impl Into<Arc<str>>) -> Self {
        let cfg = preloader.config();
        Self {
            delay: cfg.default_delay(),
            timeout: cfg.default_timeout(),
            backoff: cfg.backoff.clone(),
            preloader,
            name: name.into(),
            loader: None,
            resolve: Arc::new(|v: &T| v.clone()),
            hoist: None,
            resources: None,
        }
    }
}

impl<T, V> ChunkBuilder<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    /// Sets the loader.
    pub fn with_loader(mut self, loader: LoaderRef<T>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Time before `past_delay` flips; `None` never flips it, zero flips it at once.
    pub fn with_delay(mut self, delay: impl Into<Option<Duration>>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Per-attempt timeout (zero disables it).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry schedule.
    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }

    /// Maps the loaded value to what [`ChunkView::imported`] exposes.
    pub fn with_resolve<W, F>(self, resolve: F) -> ChunkBuilder<T, W>
    where
        F: Fn(&T) -> W + Send + Sync + 'static,
    {
        ChunkBuilder {
            preloader: self.preloader,
            name: self.name,
            loader: self.loader,
            delay: self.delay,
            timeout: self.timeout,
            backoff: self.backoff,
            resolve: Arc::new(resolve),
            hoist: self.hoist,
            resources: self.resources,
        }
    }

    /// Runs `hoist` once with the loaded value after the first success.
    pub fn with_hoist<F>(mut self, hoist: F) -> Self
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.hoist = Some(Arc::new(hoist));
        self
    }

    /// Resources this chunk needs; also registers it for readiness-gated preloading.
    pub fn with_resources<F>(mut self, ids: F) -> Self
    where
        F: Fn() -> Vec<crate::core::ResourceId> + Send + Sync + 'static,
    {
        self.resources = Some(Arc::new(ids));
        self
    }

    /// Validates the definition and registers it.
    pub fn build(self) -> Result<Chunk<T, V>, UsageError> {
        let Some(loader) = self.loader else {
            return Err(UsageError::MissingLoader {
                name: self.name.to_string(),
            });
        };

        let policy = RetryPolicy::new(self.backoff, self.timeout, false);
        let budget = policy.total_budget();
        let bus = self.preloader.bus().clone();
        let def = Arc::new(Definition::new(
            self.name.clone(),
            Single {
                loader,
                resolve: self.resolve,
                hoist: self.hoist,
            },
            policy,
            bus.clone(),
        ));

        let init = {
            let def = def.clone();
            Initializer::new(self.name.clone(), move |surface| def.init(surface))
        };
        self.preloader.registry().register(init.clone());
        if let Some(ids) = self.resources {
            self.preloader.ready_registry().register(ids, init.clone());
        }
        bus.publish(Event::new(EventKind::ChunkRegistered).with_task(self.name));

        Ok(Chunk {
            def,
            init,
            delay: self.delay,
            budget,
        })
    }
}

/// A registered single-loader definition. Cheap to clone.
pub struct Chunk<T, V = T>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    def: Arc<Definition<Single<T, V>>>,
    init: Initializer,
    delay: Option<Duration>,
    budget: Option<Duration>,
}

impl<T, V> Clone for Chunk<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    fn clone(&self) -> Self {
        Self {
            def: self.def.clone(),
            init: self.init.clone(),
            delay: self.delay,
            budget: self.budget,
        }
    }
}

impl<T, V> Chunk<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    /// Definition name.
    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// Starts (or joins) the load and surfaces its error.
    pub fn preload(&self) -> InitFuture {
        self.def.init(true)
    }

    /// The raw initializer, for [`Preloader::preload_chunks`].
    pub fn initializer(&self) -> Initializer {
        self.init.clone()
    }

    /// The UI timeout budget derived from the retry policy.
    pub fn timeout_budget(&self) -> Option<Duration> {
        self.budget
    }

    /// Starts (or joins) the load and attaches a fresh timing gate.
    pub fn mount(&self) -> ChunkHandle<T, V> {
        let load = self.def.current_or_start(false);
        ChunkHandle::attach(self.def.clone(), load, self.delay, self.budget)
    }
}

/// Snapshot of a mounted chunk.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkView<V> {
    /// The load is pending.
    pub is_loading: bool,
    /// The load succeeded.
    pub has_loaded: bool,
    /// The delay elapsed while pending.
    pub past_delay: bool,
    /// The UI budget elapsed while pending.
    pub timed_out: bool,
    /// Terminal error.
    pub error: Option<LoadError>,
    /// Resolved value.
    pub imported: Option<V>,
}

/// One consumer's view of a chunk: the current load plus its own timing gate.
pub struct ChunkHandle<T, V = T>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    def: Arc<Definition<Single<T, V>>>,
    delay: Option<Duration>,
    budget: Option<Duration>,
    load: LoadTask<T>,
    gate: TimingGate,
    state: watch::Receiver<LoadState<T>>,
    flags: watch::Receiver<TimingFlags>,
}

impl<T, V> ChunkHandle<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    fn attach(
        def: Arc<Definition<Single<T, V>>>,
        load: LoadTask<T>,
        delay: Option<Duration>,
        budget: Option<Duration>,
    ) -> Self {
        let gate = TimingGate::attach(load.finished(), delay, budget);
        Self {
            state: load.subscribe(),
            flags: gate.subscribe(),
            def,
            delay,
            budget,
            load,
            gate,
        }
    }

    /// The load this handle currently observes.
    pub fn load(&self) -> &LoadTask<T> {
        &self.load
    }

    /// Current timing flags.
    pub fn flags(&self) -> TimingFlags {
        self.gate.flags()
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> ChunkView<V> {
        let state = self.load.state();
        if state.is_loaded() {
            self.def.hoist(&self.load);
        }
        let flags = self.gate.flags();
        ChunkView {
            is_loading: state.is_pending(),
            has_loaded: state.is_loaded(),
            past_delay: flags.past_delay,
            timed_out: flags.timed_out,
            error: state.error().cloned(),
            imported: state.value().map(|v| (self.def.source().resolve)(v)),
        }
    }

    /// Waits until the load or a timing flag changes; `false` once nothing can change anymore.
    pub async fn changed(&mut self) -> bool {
        let state = &mut self.state;
        let flags = &mut self.flags;
        tokio::select! {
            Ok(()) = state.changed() => true,
            Ok(()) = flags.changed() => true,
            else => false,
        }
    }

    /// Restarts a load that has not succeeded; a no-op resolving at once after success.
    ///
    /// The returned future settles with the new load (errors stay in the view).
    pub fn retry(&mut self) -> InitFuture {
        if self.load.has_loaded() {
            return async { Ok(()) }.boxed();
        }
        self.def
            .bus()
            .publish(Event::new(EventKind::RetryRequested).with_task(self.def.name().clone()));

        let load = self.def.restart();
        *self = Self::attach(self.def.clone(), load, self.delay, self.budget);
        self.def.settle(self.load.clone(), false)
    }
}

impl Preloader {
    /// Starts a [`Chunk`] definition around `loader`, named after it.
    pub fn chunk<T: Clone + Send + Sync + 'static>(
        self: &Arc<Self>,
        loader: LoaderRef<T>,
    ) -> ChunkBuilder<T> {
        ChunkBuilder::new(self.clone(), loader.name()).with_loader(loader)
    }
}

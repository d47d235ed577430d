//! # Chunks: several keyed loaders defined and observed as one.
//!
//! Same lifecycle as [`Chunk`](super::Chunk), backed by a [`LoadTaskGroup`]. The view exposes
//! every loaded entry (resolved per key) and the group's first error.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;

use super::definition::{Definition, Loadable, Source};
use crate::{
    core::{
        GroupError, GroupState, InitFuture, Initializer, LoadTaskGroup, Preloader, ResourceId,
        ResourceIdsFn, TimingFlags, TimingGate, validate_keys,
    },
    error::UsageError,
    events::{Bus, Event, EventKind},
    loaders::LoaderRef,
    policies::{BackoffSchedule, RetryPolicy},
};

/// Maps one loaded entry (value, key) to the value exposed to renderers.
pub type KeyedResolveFn<T, V> = Arc<dyn Fn(&T, &str) -> V + Send + Sync>;

pub(crate) struct Keyed<T, V> {
    name: Arc<str>,
    loaders: Vec<(String, LoaderRef<T>)>,
    resolve: KeyedResolveFn<T, V>,
}

impl<T, V> Source for Keyed<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    type Load = LoadTaskGroup<T>;

    fn start(&self, policy: RetryPolicy, bus: &Bus) -> LoadTaskGroup<T> {
        LoadTaskGroup::spawn_unchecked(self.name.clone(), self.loaders.clone(), policy, bus)
    }
}

/// Builder for [`Chunks`].
pub struct ChunksBuilder<T, V = T> {
    preloader: Arc<Preloader>,
    name: Arc<str>,
    loaders: Vec<(String, LoaderRef<T>)>,
    delay: Option<Duration>,
    timeout: Option<Duration>,
    backoff: BackoffSchedule,
    resolve: KeyedResolveFn<T, V>,
    hoist: bool,
    resources: Option<ResourceIdsFn>,
}

impl<T: Clone + Send + Sync + 'static> ChunksBuilder<T> {
    /// Starts a keyed definition; options default to the preloader's config.
    pub fn new(
        preloader: Arc<Preloader>,
        name: impl Into<Arc<str>>,
        loaders: Vec<(String, LoaderRef<T>)>,
    ) -> Self {
        let cfg = preloader.config();
        Self {
            delay: cfg.default_delay(),
            timeout: cfg.default_timeout(),
            backoff: cfg.backoff.clone(),
            preloader,
            name: name.into(),
            loaders,
            resolve: Arc::new(|v: &T, _key: &str| v.clone()),
            hoist: false,
            resources: None,
        }
    }
}

impl<T, V> ChunksBuilder<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    /// Adds one keyed loader.
    pub fn with_loader(mut self, key: impl Into<String>, loader: LoaderRef<T>) -> Self {
        self.loaders.push((key.into(), loader));
        self
    }

    /// Time before `past_delay` flips; `None` never flips it, zero flips it at once.
    pub fn with_delay(mut self, delay: impl Into<Option<Duration>>) -> Self {
        self.delay = delay.into();
        self
    }

    /// Per-attempt timeout applied to every member (zero disables it).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Retry schedule applied to every member.
    pub fn with_backoff(mut self, backoff: BackoffSchedule) -> Self {
        self.backoff = backoff;
        self
    }

    /// Maps each loaded entry to what [`ChunksView::imported`] exposes.
    pub fn with_resolve<W, F>(self, resolve: F) -> ChunksBuilder<T, W>
    where
        F: Fn(&T, &str) -> W + Send + Sync + 'static,
    {
        ChunksBuilder {
            preloader: self.preloader,
            name: self.name,
            loaders: self.loaders,
            delay: self.delay,
            timeout: self.timeout,
            backoff: self.backoff,
            resolve: Arc::new(resolve),
            hoist: self.hoist,
            resources: self.resources,
        }
    }

    /// Keyed definitions cannot hoist; [`build`](Self::build) rejects this option.
    pub fn with_hoist<F>(mut self, _hoist: F) -> Self
    where
        F: Fn(&BTreeMap<String, T>) + Send + Sync + 'static,
    {
        self.hoist = true;
        self
    }

    /// Resources these chunks need; also registers them for readiness-gated preloading.
    pub fn with_resources<F>(mut self, ids: F) -> Self
    where
        F: Fn() -> Vec<ResourceId> + Send + Sync + 'static,
    {
        self.resources = Some(Arc::new(ids));
        self
    }

    /// Validates the definition and registers it.
    pub fn build(self) -> Result<Chunks<T, V>, UsageError> {
        if self.hoist {
            return Err(UsageError::HoistUnsupported {
                name: self.name.to_string(),
            });
        }
        if self.loaders.is_empty() {
            return Err(UsageError::EmptyLoaderMap {
                name: self.name.to_string(),
            });
        }
        validate_keys(&self.name, &self.loaders)?;

        let policy = RetryPolicy::new(self.backoff, self.timeout, false);
        let budget = policy.total_budget();
        let bus = self.preloader.bus().clone();
        let def = Arc::new(Definition::new(
            self.name.clone(),
            Keyed {
                name: self.name.clone(),
                loaders: self.loaders,
                resolve: self.resolve,
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

        Ok(Chunks {
            def,
            init,
            delay: self.delay,
            budget,
        })
    }
}

/// A registered keyed definition. Cheap to clone.
pub struct Chunks<T, V = T>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    def: Arc<Definition<Keyed<T, V>>>,
    init: Initializer,
    delay: Option<Duration>,
    budget: Option<Duration>,
}

impl<T, V> Clone for Chunks<T, V>
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

impl<T, V> Chunks<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    /// Definition name.
    pub fn name(&self) -> &str {
        self.def.name()
    }

    /// Starts (or joins) every member and surfaces the first error.
    pub fn preload(&self) -> InitFuture {
        self.def.init(true)
    }

    /// The raw initializer, for [`Preloader::preload_chunks`].
    pub fn initializer(&self) -> Initializer {
        self.init.clone()
    }

    /// Starts (or joins) the group and attaches a fresh timing gate.
    pub fn mount(&self) -> ChunksHandle<T, V> {
        let load = self.def.current_or_start(false);
        ChunksHandle::attach(self.def.clone(), load, self.delay, self.budget)
    }
}

/// Snapshot of mounted keyed chunks.
#[derive(Clone, Debug, PartialEq)]
pub struct ChunksView<V> {
    /// At least one member is pending.
    pub is_loading: bool,
    /// Every member succeeded.
    pub has_loaded: bool,
    /// The delay elapsed while pending.
    pub past_delay: bool,
    /// The UI budget elapsed while pending.
    pub timed_out: bool,
    /// First member failure.
    pub error: Option<GroupError>,
    /// Resolved member values; empty until every member loaded.
    pub imported: BTreeMap<String, V>,
    /// Every member key, sorted; empty until every member loaded.
    pub import_keys: Vec<String>,
}

/// One consumer's view of keyed chunks.
pub struct ChunksHandle<T, V = T>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    def: Arc<Definition<Keyed<T, V>>>,
    delay: Option<Duration>,
    budget: Option<Duration>,
    load: LoadTaskGroup<T>,
    gate: TimingGate,
    state: watch::Receiver<GroupState<T>>,
    flags: watch::Receiver<TimingFlags>,
}

impl<T, V> ChunksHandle<T, V>
where
    T: Clone + Send + Sync + 'static,
    V: 'static,
{
    fn attach(
        def: Arc<Definition<Keyed<T, V>>>,
        load: LoadTaskGroup<T>,
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

    /// The group this handle currently observes.
    pub fn load(&self) -> &LoadTaskGroup<T> {
        &self.load
    }

    /// Current timing flags.
    pub fn flags(&self) -> TimingFlags {
        self.gate.flags()
    }

    /// Snapshot for rendering.
    pub fn view(&self) -> ChunksView<V> {
        let state = self.load.state();
        let resolve = &self.def.source().resolve;
        let flags = self.gate.flags();
        let loaded = state.has_loaded();
        let (imported, import_keys) = if loaded {
            (
                state
                    .entries
                    .iter()
                    .filter_map(|(k, s)| s.value().map(|v| (k.clone(), resolve(v, k.as_str()))))
                    .collect(),
                state.entries.keys().cloned().collect(),
            )
        } else {
            Default::default()
        };
        ChunksView {
            is_loading: state.loading,
            has_loaded: loaded,
            past_delay: flags.past_delay,
            timed_out: flags.timed_out,
            imported,
            import_keys,
            error: state.error,
        }
    }

    /// Waits until a member or a timing flag changes; `false` once nothing can change anymore.
    pub async fn changed(&mut self) -> bool {
        let state = &mut self.state;
        let flags = &mut self.flags;
        tokio::select! {
            Ok(()) = state.changed() => true,
            Ok(()) = flags.changed() => true,
            else => false,
        }
    }

    /// Restarts every member unless the group already loaded; then it resolves at once.
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
    /// Starts a [`Chunks`] definition over keyed loaders.
    pub fn chunks<T: Clone + Send + Sync + 'static>(
        self: &Arc<Self>,
        name: impl Into<Arc<str>>,
        loaders: Vec<(String, LoaderRef<T>)>,
    ) -> ChunksBuilder<T> {
        ChunksBuilder::new(self.clone(), name, loaders)
    }
}

//! # ReadyRegistry: initializers gated on external resource readiness.
//!
//! Same storage and drain shape as [`PreloadRegistry`](crate::PreloadRegistry), but every entry
//! carries the [`ResourceId`]s it needs. A pass only invokes the entries whose resources the
//! current [`ReadinessProbe`] reports as available; the others stay registered for a later pass.
//!
//! ```text
//! drain_ready(surface)
//! loop {
//!   ├─ no probe            ─► publish ReadyDeferred("no_probe"), return Ok   (nothing invoked)
//!   ├─► take entries, evaluate probe with the lock released
//!   ├─► put not-ready entries back (ahead of anything registered meanwhile)
//!   ├─ nothing ready       ─► publish ReadyDeferred("not_ready") if any deferred, return Ok
//!   └─► drain_batch(ready, surface)  ─ Err && surface ─► return Err
//! }
//! ```
//!
//! ## Rules
//! - Deferred entries are neither failed nor retried; they are simply kept.
//! - A missing probe is a legal environment, not an error.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::{
    core::registry::{Initializer, drain_batch},
    error::LoadError,
    events::{Bus, Event, EventKind},
};

/// Opaque identifier of an external resource (for example a bundler module id).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(Arc<str>);

impl ResourceId {
    /// String form of the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for ResourceId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl From<u64> for ResourceId {
    fn from(n: u64) -> Self {
        Self(Arc::from(n.to_string()))
    }
}

/// Answers "are all of these resources currently available?".
pub trait ReadinessProbe: Send + Sync + 'static {
    /// `true` if every id is available.
    fn is_ready(&self, ids: &[ResourceId]) -> bool;
}

impl<F> ReadinessProbe for F
where
    F: Fn(&[ResourceId]) -> bool + Send + Sync + 'static,
{
    fn is_ready(&self, ids: &[ResourceId]) -> bool {
        self(ids)
    }
}

/// Mutable set of available resources, usable as a probe.
#[derive(Debug, Default)]
pub struct ResourceSet {
    ids: RwLock<HashSet<ResourceId>>,
}

impl ResourceSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a resource as available.
    pub fn insert(&self, id: impl Into<ResourceId>) -> bool {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into())
    }

    /// Marks a resource as unavailable.
    pub fn remove(&self, id: impl Into<ResourceId>) -> bool {
        self.ids
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id.into())
    }

    /// `true` if the resource is available.
    pub fn contains(&self, id: &ResourceId) -> bool {
        self.ids
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }
}

impl ReadinessProbe for ResourceSet {
    fn is_ready(&self, ids: &[ResourceId]) -> bool {
        let set = self.ids.read().unwrap_or_else(PoisonError::into_inner);
        ids.iter().all(|id| set.contains(id))
    }
}

/// Produces the resource ids an entry needs; evaluated on every pass.
pub type ResourceIdsFn = Arc<dyn Fn() -> Vec<ResourceId> + Send + Sync>;

struct Entry {
    ids: ResourceIdsFn,
    init: Initializer,
}

/// Process-wide list of readiness-gated initializers.
pub struct ReadyRegistry {
    entries: Mutex<Vec<Entry>>,
    probe: RwLock<Option<Arc<dyn ReadinessProbe>>>,
    bus: Bus,
}

impl ReadyRegistry {
    /// Creates an empty registry without a probe.
    pub fn new(bus: Bus) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            probe: RwLock::new(None),
            bus,
        }
    }

    /// Appends an initializer gated on `ids`.
    pub fn register(&self, ids: ResourceIdsFn, init: Initializer) {
        self.lock().push(Entry { ids, init });
    }

    /// Installs (or removes, with `None`) the readiness probe.
    pub fn set_probe(&self, probe: Option<Arc<dyn ReadinessProbe>>) {
        *self.probe.write().unwrap_or_else(PoisonError::into_inner) = probe;
    }

    /// Number of entries still waiting.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// `true` if nothing waits.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Forgets every entry without invoking it.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Drains the entries that are ready, pass after pass, until none is.
    pub async fn drain_ready(&self, surface: bool) -> Result<(), LoadError> {
        loop {
            let probe = self
                .probe
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            let Some(probe) = probe else {
                self.bus.publish(
                    Event::new(EventKind::ReadyDeferred)
                        .with_count(self.len())
                        .with_reason("no_probe"),
                );
                return Ok(());
            };

            let taken = std::mem::take(&mut *self.lock());
            let (ready, deferred): (Vec<Entry>, Vec<Entry>) = taken
                .into_iter()
                .partition(|e| probe.is_ready(&(e.ids)()));

            let deferred_count = deferred.len();
            if deferred_count > 0 {
                let mut entries = self.lock();
                let added = std::mem::replace(&mut *entries, deferred);
                entries.extend(added);
            }

            if ready.is_empty() {
                if deferred_count > 0 {
                    self.bus.publish(
                        Event::new(EventKind::ReadyDeferred)
                            .with_count(deferred_count)
                            .with_reason("not_ready"),
                    );
                }
                return Ok(());
            }

            self.bus.publish(
                Event::new(EventKind::DrainStarted)
                    .with_count(ready.len())
                    .with_reason("ready"),
            );
            let batch = ready.into_iter().map(|e| e.init).collect();
            if let Err(e) = drain_batch(batch, surface).await {
                self.bus
                    .publish(Event::new(EventKind::DrainFailed).with_reason(e.to_string()));
                return Err(e);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ReadyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyRegistry")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Script, lazy_init};

    fn ids(list: &[u64]) -> ResourceIdsFn {
        let ids: Vec<ResourceId> = list.iter().copied().map(ResourceId::from).collect();
        Arc::new(move || ids.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_entry_stays_registered() {
        let reg = ReadyRegistry::new(Bus::detached());
        let available = Arc::new(ResourceSet::new());
        available.insert(1u64);
        reg.set_probe(Some(available.clone() as Arc<dyn ReadinessProbe>));

        let script = Script::ok("gated", 10, "v");
        let (init, task) = lazy_init(&script);
        reg.register(ids(&[1, 2]), init);

        reg.drain_ready(false).await.expect("drain");
        assert_eq!(script.calls(), 0);
        assert_eq!(reg.len(), 1);

        available.insert(2u64);
        reg.drain_ready(false).await.expect("drain");
        assert_eq!(script.calls(), 1);
        assert!(reg.is_empty());
        assert!(task().is_some_and(|t| t.has_loaded()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_probe_invokes_nothing() {
        let reg = ReadyRegistry::new(Bus::new(8));
        let mut rx = reg.bus.subscribe();
        let script = Script::ok("gated", 10, 1u8);
        let (init, _) = lazy_init(&script);
        reg.register(ids(&[1]), init);

        assert_eq!(reg.drain_ready(true).await, Ok(()));
        assert_eq!(script.calls(), 0);
        assert_eq!(reg.len(), 1);

        let ev = rx.try_recv().expect("deferred event");
        assert_eq!(ev.kind, EventKind::ReadyDeferred);
        assert_eq!(ev.reason.as_deref(), Some("no_probe"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_ready_entries_run() {
        let reg = ReadyRegistry::new(Bus::detached());
        let probe: Arc<dyn ReadinessProbe> =
            Arc::new(|ids: &[ResourceId]| ids.iter().all(|id| id.as_str() != "blocked"));
        reg.set_probe(Some(probe));

        let open = Script::ok("open", 10, 1u8);
        let blocked = Script::ok("blocked", 10, 2u8);
        let (open_init, _) = lazy_init(&open);
        let (blocked_init, _) = lazy_init(&blocked);
        reg.register(Arc::new(|| vec![ResourceId::from("blocked")]), blocked_init);
        reg.register(Arc::new(|| vec![ResourceId::from("fine")]), open_init);

        reg.drain_ready(false).await.expect("drain");
        assert_eq!(open.calls(), 1);
        assert_eq!(blocked.calls(), 0);
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_forced_ready_drain_surfaces_errors() {
        let reg = ReadyRegistry::new(Bus::detached());
        reg.set_probe(Some(Arc::new(ResourceSet::new()) as Arc<dyn ReadinessProbe>));
        let (init, _) = lazy_init(&Script::<u8>::err("broken", 10, "nope"));
        reg.register(Arc::new(Vec::<ResourceId>::new), init);

        let err = reg.drain_ready(true).await.expect_err("surfaced");
        assert_eq!(err, LoadError::failed("nope"));
    }

    #[test]
    fn test_resource_set_membership() {
        let set = ResourceSet::new();
        assert!(set.insert("a"));
        assert!(!set.insert("a"));
        assert!(set.contains(&ResourceId::from("a")));
        assert!(set.remove("a"));
        assert!(set.is_ready(&[]));
        assert!(!set.is_ready(&[ResourceId::from("a")]));
    }
}

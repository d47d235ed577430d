//! # LoadTaskGroup: several keyed loads observed as one.
//!
//! Every key gets its own [`LoadTask`] (same policy, started immediately). The group state
//! aggregates them:
//! - `loading` is `true` until every member has settled,
//! - `error` records the **first** member failure in completion order and is never overwritten,
//! - `entries` holds each member's own state.
//!
//! ```text
//! create(name, {k1: l1, k2: l2})
//!   ├─► validate keys (DuplicateKey before anything starts)
//!   ├─► LoadTask::spawn(k1) , LoadTask::spawn(k2)      (synchronous first attempts)
//!   ├─► initial state: first synchronous failure, if any
//!   └─► driver: FuturesUnordered over completions
//!         ├─ Ok(v)  ─► entries[k] = Loaded(v)
//!         └─ Err(e) ─► entries[k] = Errored(e), error.get_or_insert(k, e)
//!       all settled ─► loading = false ─► done resolves
//! ```

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use futures::future::{BoxFuture, Shared};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::watch;

use crate::{
    core::task::{LoadState, LoadTask},
    error::{LoadError, UsageError},
    events::Bus,
    loaders::LoaderRef,
    policies::RetryPolicy,
};

/// The first member failure of a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupError {
    /// Key of the failed member.
    pub key: String,
    /// Its terminal error.
    pub error: LoadError,
}

/// Aggregated state of a [`LoadTaskGroup`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupState<T> {
    /// Per-key member state.
    pub entries: BTreeMap<String, LoadState<T>>,
    /// `true` until every member has settled.
    pub loading: bool,
    /// First failure, in completion order.
    pub error: Option<GroupError>,
}

impl<T: Clone> GroupState<T> {
    /// All values, if every member loaded.
    pub fn values(&self) -> Option<BTreeMap<String, T>> {
        self.entries
            .iter()
            .map(|(k, s)| s.value().map(|v| (k.clone(), v.clone())))
            .collect()
    }

    /// `true` once every member loaded.
    pub fn has_loaded(&self) -> bool {
        !self.loading && self.error.is_none() && self.entries.values().all(LoadState::is_loaded)
    }
}

/// Handle to a running group. Cheap to clone.
#[derive(Clone)]
pub struct LoadTaskGroup<T> {
    name: Arc<str>,
    state: watch::Receiver<GroupState<T>>,
    done: Shared<BoxFuture<'static, GroupState<T>>>,
}

impl<T> std::fmt::Debug for LoadTaskGroup<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTaskGroup")
            .field("name", &self.name)
            .field("loading", &self.state.borrow().loading)
            .finish()
    }
}

/// Rejects a loader list that repeats a key.
pub(crate) fn validate_keys<T>(
    name: &str,
    loaders: &[(String, LoaderRef<T>)],
) -> Result<(), UsageError> {
    let mut seen = HashSet::with_capacity(loaders.len());
    for (key, _) in loaders {
        if !seen.insert(key.as_str()) {
            return Err(UsageError::DuplicateKey {
                name: name.to_string(),
                key: key.clone(),
            });
        }
    }
    Ok(())
}

impl<T: Clone + Send + Sync + 'static> LoadTaskGroup<T> {
    /// Starts one load per key and returns the group handle.
    ///
    /// An empty list yields a group that is already settled with no entries.
    pub fn create(
        name: impl Into<Arc<str>>,
        loaders: Vec<(String, LoaderRef<T>)>,
        policy: RetryPolicy,
    ) -> Result<Self, UsageError> {
        let name = name.into();
        validate_keys(&name, &loaders)?;
        Ok(Self::spawn_unchecked(name, loaders, policy, &Bus::detached()))
    }

    /// Starts a group whose keys were already validated.
    pub(crate) fn spawn_unchecked(
        name: Arc<str>,
        loaders: Vec<(String, LoaderRef<T>)>,
        policy: RetryPolicy,
        bus: &Bus,
    ) -> Self {
        let members: Vec<(String, LoadTask<T>)> = loaders
            .into_iter()
            .map(|(key, loader)| (key, LoadTask::spawn(loader, policy.clone(), bus)))
            .collect();

        let mut initial = GroupState {
            entries: BTreeMap::new(),
            loading: !members.is_empty(),
            error: None,
        };
        for (key, task) in &members {
            let state = task.state();
            if let (Some(e), None) = (state.error(), &initial.error) {
                initial.error = Some(GroupError {
                    key: key.clone(),
                    error: e.clone(),
                });
            }
            initial.entries.insert(key.clone(), state);
        }

        let (tx, rx) = watch::channel(initial);
        let driver = async move {
            let mut pending: FuturesUnordered<_> = members
                .into_iter()
                .map(|(key, task)| {
                    let done = task.completion();
                    async move { (key, done.await) }
                })
                .collect();

            while let Some((key, res)) = pending.next().await {
                tx.send_modify(|s| match res {
                    Ok(v) => {
                        s.entries.insert(key, LoadState::Loaded(v));
                    }
                    Err(e) => {
                        if s.error.is_none() {
                            s.error = Some(GroupError {
                                key: key.clone(),
                                error: e.clone(),
                            });
                        }
                        s.entries.insert(key, LoadState::Errored(e));
                    }
                });
            }
            tx.send_modify(|s| s.loading = false);
            tx.borrow().clone()
        };

        let handle = tokio::spawn(driver);
        let fallback = rx.clone();
        let done = async move {
            match handle.await {
                Ok(state) => state,
                Err(_) => {
                    let mut state = fallback.borrow().clone();
                    state.loading = false;
                    state
                }
            }
        }
        .boxed()
        .shared();

        Self {
            name,
            state: rx,
            done,
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current aggregated state snapshot.
    pub fn state(&self) -> GroupState<T> {
        self.state.borrow().clone()
    }

    /// `true` until every member has settled.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// `true` once every member loaded.
    pub fn has_loaded(&self) -> bool {
        self.state.borrow().has_loaded()
    }

    /// First member failure, if any.
    pub fn error(&self) -> Option<GroupError> {
        self.state.borrow().error.clone()
    }

    /// A receiver notified on each member settlement.
    pub fn subscribe(&self) -> watch::Receiver<GroupState<T>> {
        self.state.clone()
    }

    /// Resolves with the final state once every member settled.
    pub fn completion(&self) -> Shared<BoxFuture<'static, GroupState<T>>> {
        self.done.clone()
    }

    /// Waits for every member; with `surface = true` the first member error is returned.
    pub fn settle(&self, surface: bool) -> BoxFuture<'static, Result<(), LoadError>> {
        let done = self.done.clone();
        async move {
            let state = done.await;
            match state.error {
                Some(g) if surface => Err(g.error),
                _ => Ok(()),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Script, Step, advance, keyed};

    #[tokio::test(start_paused = true)]
    async fn test_all_members_load() {
        let g = LoadTaskGroup::create(
            "panels",
            keyed(vec![
                ("left", Script::ok("left", 100, "L")),
                ("right", Script::ok("right", 300, "R")),
            ]),
            RetryPolicy::default(),
        )
        .expect("valid group");

        assert!(g.is_loading());
        advance(150).await;
        let mid = g.state();
        assert!(mid.loading);
        assert_eq!(mid.entries["left"], LoadState::Loaded("L"));
        assert_eq!(mid.entries["right"], LoadState::Pending);

        let done = g.completion().await;
        assert!(!done.loading);
        assert!(g.has_loaded());
        let values = done.values().expect("all loaded");
        assert_eq!(values["left"], "L");
        assert_eq!(values["right"], "R");
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_error_in_completion_order_wins() {
        let g = LoadTaskGroup::create(
            "widgets",
            keyed(vec![
                ("a", Script::<u8>::err("a", 100, "a failed")),
                ("b", Script::<u8>::err("b", 50, "b failed")),
            ]),
            RetryPolicy::default(),
        )
        .expect("valid group");

        let state = g.completion().await;
        assert_eq!(
            state.error,
            Some(GroupError {
                key: "b".into(),
                error: LoadError::failed("b failed"),
            })
        );
        assert_eq!(state.entries["a"], LoadState::Errored(LoadError::failed("a failed")));
        assert_eq!(g.settle(true).await, Err(LoadError::failed("b failed")));
        assert_eq!(g.settle(false).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronous_member_error_is_visible_immediately() {
        let g = LoadTaskGroup::create(
            "mixed",
            keyed(vec![
                ("ok", Script::ok("ok", 100, "fine")),
                ("bad", Script::new("bad", vec![Step::Throw("sync")])),
            ]),
            RetryPolicy::default(),
        )
        .expect("valid group");

        let state = g.state();
        assert!(state.loading);
        assert_eq!(state.error.map(|e| e.key), Some("bad".to_string()));

        let done = g.completion().await;
        assert_eq!(done.entries["ok"], LoadState::Loaded("fine"));
        assert_eq!(done.error.map(|e| e.error), Some(LoadError::failed("sync")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_key_is_rejected_before_start() {
        let first = Script::ok("x", 10, "1");
        let err = LoadTaskGroup::create(
            "dupes",
            keyed(vec![("x", first.clone()), ("x", Script::ok("x2", 10, "2"))]),
            RetryPolicy::default(),
        )
        .expect_err("duplicate key");

        assert_eq!(
            err,
            UsageError::DuplicateKey {
                name: "dupes".into(),
                key: "x".into(),
            }
        );
        assert_eq!(first.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_group_is_settled() {
        let g = LoadTaskGroup::<u8>::create("empty", Vec::new(), RetryPolicy::default())
            .expect("valid group");

        assert!(!g.is_loading());
        assert!(g.has_loaded());
        assert_eq!(g.settle(true).await, Ok(()));
        assert_eq!(g.completion().await.values(), Some(BTreeMap::new()));
    }
}

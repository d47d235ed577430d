//! # LoadTask: one load as an observable state object.
//!
//! Creating a [`LoadTask`] **is** starting the load: the first attempt is invoked synchronously
//! inside [`LoadTask::create`], then a spawned [`RetryController`] drives any retries.
//!
//! ```text
//! create(loader, policy)
//!   ├─► loader.load()                  (attempt #1, synchronous start; a panic becomes Err)
//!   │     └─ Err(e) with empty backoff ─► state = Errored(e) immediately
//!   └─► tokio::spawn(controller.run)   ─► settle(state) ─► completion resolves
//! ```
//!
//! ## Rules
//! - State moves `Pending → Loaded` or `Pending → Errored` **at most once** (settled flag).
//! - Dropping every handle does not cancel the load; its result is simply discarded.
//! - A retry never mutates a terminal task; it creates a new one.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::watch;

use crate::{
    core::retry::{self, RetryController},
    error::LoadError,
    events::Bus,
    loaders::LoaderRef,
    policies::RetryPolicy,
};

/// State of one load.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState<T> {
    /// Attempts are in progress.
    Pending,
    /// The load produced a value.
    Loaded(T),
    /// The load failed for good.
    Errored(LoadError),
}

impl<T> LoadState<T> {
    /// `true` while attempts are in progress.
    pub fn is_pending(&self) -> bool {
        matches!(self, LoadState::Pending)
    }

    /// `true` once a value is available.
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadState::Loaded(_))
    }

    /// The loaded value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            LoadState::Loaded(v) => Some(v),
            _ => None,
        }
    }

    /// The terminal error, if any.
    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LoadState::Errored(e) => Some(e),
            _ => None,
        }
    }
}

/// Shared settlement signal of a task.
pub type Completion<T> = Shared<BoxFuture<'static, Result<T, LoadError>>>;

/// Write side of a task's state; the first terminal write wins.
pub(crate) struct StateCell<T> {
    tx: watch::Sender<LoadState<T>>,
    settled: AtomicBool,
}

impl<T> StateCell<T> {
    fn new(tx: watch::Sender<LoadState<T>>) -> Self {
        Self {
            tx,
            settled: AtomicBool::new(false),
        }
    }

    /// Publishes a terminal state; returns `false` if the task had already settled.
    fn settle(&self, state: LoadState<T>) -> bool {
        if self.settled.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.tx.send_replace(state);
        true
    }
}

/// Handle to one running load. Cheap to clone; all clones observe the same load.
#[derive(Clone)]
pub struct LoadTask<T> {
    name: Arc<str>,
    state: watch::Receiver<LoadState<T>>,
    done: Completion<T>,
}

impl<T> std::fmt::Debug for LoadTask<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadTask")
            .field("name", &self.name)
            .field("pending", &self.state.borrow().is_pending())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> LoadTask<T> {
    /// Starts loading and returns the handle.
    ///
    /// Must be called inside a tokio runtime.
    ///
    /// # Example
    /// ```
    /// use loadvisor::{LoadError, LoadState, LoadTask, LoaderFn, LoaderRef, RetryPolicy};
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let loader: LoaderRef<u32> = LoaderFn::arc("answer", || async { Ok::<_, LoadError>(42) });
    /// let task = LoadTask::create(loader, RetryPolicy::default());
    /// assert!(task.is_loading());
    ///
    /// assert_eq!(task.completion().await, Ok(42));
    /// assert_eq!(task.state(), LoadState::Loaded(42));
    /// # }
    /// ```
    pub fn create(loader: LoaderRef<T>, policy: RetryPolicy) -> Self {
        Self::spawn(loader, policy, &Bus::detached())
    }

    pub(crate) fn spawn(loader: LoaderRef<T>, policy: RetryPolicy, bus: &Bus) -> Self {
        let name: Arc<str> = Arc::from(loader.name());
        let (tx, rx) = watch::channel(LoadState::Pending);
        let cell = Arc::new(StateCell::new(tx));

        let first = retry::start(&loader);
        if let Err(e) = &first {
            if policy.backoff.is_empty() {
                cell.settle(LoadState::Errored(e.clone()));
            }
        }

        let controller = RetryController::new(loader, policy, bus.clone());
        let driver = async move {
            let res = match AssertUnwindSafe(controller.run(first)).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => Err(LoadError::from_panic(payload.as_ref())),
            };
            cell.settle(match &res {
                Ok(v) => LoadState::Loaded(v.clone()),
                Err(e) => LoadState::Errored(e.clone()),
            });
            res
        };

        let handle = tokio::spawn(driver);
        let done = async move {
            match handle.await {
                Ok(res) => res,
                Err(join) => Err(LoadError::Panicked {
                    info: join.to_string(),
                }),
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

    /// Loader name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current state snapshot.
    pub fn state(&self) -> LoadState<T> {
        self.state.borrow().clone()
    }

    /// `true` while the load is pending.
    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_pending()
    }

    /// `true` once a value is available.
    pub fn has_loaded(&self) -> bool {
        self.state.borrow().is_loaded()
    }

    /// A receiver notified on the (single) state transition.
    pub fn subscribe(&self) -> watch::Receiver<LoadState<T>> {
        self.state.clone()
    }

    /// Settlement signal: the value or the terminal error.
    pub fn completion(&self) -> Completion<T> {
        self.done.clone()
    }

    /// Waits for settlement.
    ///
    /// With `surface = false` a failed load still resolves `Ok(())` (the error lives in the
    /// state); with `surface = true` the terminal error is returned.
    pub fn settle(&self, surface: bool) -> BoxFuture<'static, Result<(), LoadError>> {
        let done = self.done.clone();
        async move {
            match done.await {
                Ok(_) => Ok(()),
                Err(e) if surface => Err(e),
                Err(_) => Ok(()),
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::BackoffSchedule;
    use crate::test_support::{Script, Step, advance};

    fn task<T: Clone + Send + Sync + 'static>(script: &Arc<Script<T>>, backoff: &[u64]) -> LoadTask<T> {
        LoadTask::create(
            script.clone(),
            RetryPolicy::new(BackoffSchedule::from_millis(backoff.to_vec()), None, false),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_loaded() {
        let script = Script::ok("page", 400, "page-module");
        let t = task(&script, &[]);

        assert_eq!(script.calls(), 1, "construction starts the load");
        assert!(t.is_loading());

        advance(200).await;
        assert_eq!(t.state(), LoadState::Pending);

        advance(250).await;
        assert_eq!(t.state(), LoadState::Loaded("page-module"));
        assert!(t.has_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronous_throw_is_visible_immediately() {
        let script = Script::<u32>::new("throws", vec![Step::Throw("boom")]);
        let t = task(&script, &[]);

        assert_eq!(t.state(), LoadState::Errored(LoadError::failed("boom")));
        assert_eq!(t.completion().await, Err(LoadError::failed("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synchronous_throw_with_backoff_is_retried() {
        let script = Script::new("throws", vec![Step::Throw("boom"), Step::Ok(10, 5u32)]);
        let t = task(&script, &[100]);

        assert!(t.is_loading());
        assert_eq!(t.completion().await, Ok(5));
        assert_eq!(t.state(), LoadState::Loaded(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_swallows_unless_surfacing() {
        let script = Script::<u32>::err("broken", 50, "test error");
        let t = task(&script, &[]);

        assert_eq!(t.settle(false).await, Ok(()));
        assert_eq!(t.settle(true).await, Err(LoadError::failed("test error")));
        assert_eq!(t.state().error(), Some(&LoadError::failed("test error")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_loader_is_recorded() {
        let script = Script::<u32>::new("panics", vec![Step::Panic("bad bundle")]);
        let t = task(&script, &[]);

        let err = t.completion().await.expect_err("panicked");
        assert_eq!(
            err,
            LoadError::Panicked {
                info: "bad bundle".into()
            }
        );
        assert!(!t.is_loading());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_while_starting_is_recorded() {
        let script = Script::<u32>::new("panics-early", vec![Step::PanicNow("no bundle")]);
        let t = task(&script, &[]);

        let expected = LoadError::Panicked {
            info: "no bundle".into(),
        };
        assert_eq!(t.state(), LoadState::Errored(expected.clone()));
        assert_eq!(t.completion().await, Err(expected));
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_while_starting_is_retried() {
        let script = Script::new("panics-once", vec![Step::PanicNow("flaky"), Step::Ok(10, 4u32)]);
        let t = task(&script, &[50]);

        assert!(t.is_loading());
        assert_eq!(t.completion().await, Ok(4));
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_does_not_cancel() {
        let script = Script::ok("abandoned", 100, 1u32);
        let t = task(&script, &[]);
        let mut rx = t.subscribe();
        drop(t);

        rx.changed().await.expect("state change");
        assert_eq!(*rx.borrow(), LoadState::Loaded(1));
    }

    #[test]
    fn test_state_cell_settles_once() {
        let (tx, rx) = watch::channel(LoadState::<u32>::Pending);
        let cell = StateCell::new(tx);

        assert!(cell.settle(LoadState::Errored(LoadError::failed("first"))));
        assert!(!cell.settle(LoadState::Loaded(1)));
        assert_eq!(*rx.borrow(), LoadState::Errored(LoadError::failed("first")));
    }
}

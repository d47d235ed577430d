//! Scripted loaders shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::core::{Initializer, LoadTask};
use crate::error::LoadError;
use crate::loaders::{LoadFuture, Loader, LoaderRef};
use crate::policies::RetryPolicy;

/// One scripted attempt.
#[derive(Clone, Debug)]
pub(crate) enum Step<T> {
    /// Resolve with the value after the delay.
    Ok(u64, T),
    /// Fail with the message after the delay.
    Err(u64, &'static str),
    /// Fail synchronously, before any future exists.
    Throw(&'static str),
    /// Never complete.
    Hang,
    /// Panic inside the future.
    Panic(&'static str),
    /// Panic inside `load` itself.
    PanicNow(&'static str),
}

/// Loader playing back a fixed list of attempts; the last step repeats once the script runs out.
pub(crate) struct Script<T> {
    name: &'static str,
    steps: Mutex<VecDeque<Step<T>>>,
    calls: Mutex<Vec<Instant>>,
}

impl<T: Clone + Send + 'static> Script<T> {
    pub(crate) fn new(name: &'static str, steps: Vec<Step<T>>) -> Arc<Self> {
        Arc::new(Self {
            name,
            steps: Mutex::new(steps.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn ok(name: &'static str, ms: u64, value: T) -> Arc<Self> {
        Self::new(name, vec![Step::Ok(ms, value)])
    }

    pub(crate) fn err(name: &'static str, ms: u64, msg: &'static str) -> Arc<Self> {
        Self::new(name, vec![Step::Err(ms, msg)])
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn started_at(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    fn next_step(&self) -> Step<T> {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap()
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Loader<T> for Script<T> {
    fn name(&self) -> &str {
        self.name
    }

    fn load(&self) -> Result<LoadFuture<T>, LoadError> {
        self.calls.lock().unwrap().push(Instant::now());
        match self.next_step() {
            Step::Ok(ms, value) => Ok(Box::pin(async move {
                time::sleep(Duration::from_millis(ms)).await;
                Ok(value)
            })),
            Step::Err(ms, msg) => Ok(Box::pin(async move {
                time::sleep(Duration::from_millis(ms)).await;
                Err(LoadError::failed(msg))
            })),
            Step::Throw(msg) => Err(LoadError::failed(msg)),
            Step::Hang => Ok(Box::pin(std::future::pending())),
            Step::Panic(msg) => Ok(Box::pin(async move {
                time::sleep(Duration::from_millis(1)).await;
                panic!("{msg}")
            })),
            Step::PanicNow(msg) => panic!("{msg}"),
        }
    }
}

/// Advances virtual time by `ms` (tests run with a paused clock).
pub(crate) async fn advance(ms: u64) {
    time::sleep(Duration::from_millis(ms)).await;
}

/// Keyed member list for groups.
pub(crate) fn keyed<T: Clone + Send + Sync + 'static>(
    list: Vec<(&str, Arc<Script<T>>)>,
) -> Vec<(String, LoaderRef<T>)> {
    list.into_iter()
        .map(|(k, s)| (k.to_string(), s as LoaderRef<T>))
        .collect()
}

/// An initializer that lazily creates one task from `script`, plus a peek at that task.
pub(crate) fn lazy_init<T: Clone + Send + Sync + 'static>(
    script: &Arc<Script<T>>,
) -> (Initializer, impl Fn() -> Option<LoadTask<T>> + use<T>) {
    let slot: Arc<Mutex<Option<LoadTask<T>>>> = Arc::default();
    let loader: LoaderRef<T> = script.clone();

    let shared = slot.clone();
    let init = Initializer::new(script.name, move |surface| {
        let mut guard = shared.lock().unwrap();
        let task =
            guard.get_or_insert_with(|| LoadTask::create(loader.clone(), RetryPolicy::default()));
        task.settle(surface)
    });

    (init, move || slot.lock().unwrap().clone())
}

//! # Loader trait.
//!
//! A [`Loader`] is an opaque capability: every call to [`Loader::load`] is a fresh attempt
//! that eventually yields a value or a [`LoadError`]. Loaders are stateless from the engine's
//! point of view and may be invoked any number of times (once per retry).
//!
//! `load` itself is synchronous and may fail before any future exists. Such a failure is
//! treated exactly like a failed attempt, except that on a task's first attempt it becomes
//! visible in the task state immediately, without waiting for the runtime.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::LoadError;

/// Future produced by a single loader invocation.
pub type LoadFuture<T> = Pin<Box<dyn Future<Output = Result<T, LoadError>> + Send + 'static>>;

/// # Shared handle to a loader object.
pub type LoaderRef<T> = Arc<dyn Loader<T>>;

/// # Lazily produces a value.
///
/// # Example
/// ```
/// use loadvisor::{LoadError, LoadFuture, Loader};
///
/// struct Broken;
///
/// impl Loader<u32> for Broken {
///     fn name(&self) -> &str { "broken" }
///
///     fn load(&self) -> Result<LoadFuture<u32>, LoadError> {
///         Err(LoadError::failed("no such module"))
///     }
/// }
/// ```
pub trait Loader<T>: Send + Sync + 'static {
    /// Returns a stable, human-readable loader name used in events.
    fn name(&self) -> &str;

    /// Starts one attempt.
    ///
    /// Returning `Err` models a loader that fails before producing a future.
    fn load(&self) -> Result<LoadFuture<T>, LoadError>;
}

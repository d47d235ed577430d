//! # Loader abstractions.
//!
//! - [`Loader`] - trait for a zero-argument operation that starts producing a value
//! - [`LoaderFn`] - closure-backed implementation
//! - [`LoaderRef`] - shared handle (`Arc<dyn Loader<T>>`)
//! - [`LoadFuture`] - boxed future returned by one invocation

mod loader;
mod loader_fn;

pub use loader::{LoadFuture, Loader, LoaderRef};
pub use loader_fn::LoaderFn;

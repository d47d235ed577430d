//! # Function-backed loader (`LoaderFn`)
//!
//! [`LoaderFn`] wraps a closure `F: Fn() -> Fut`, producing a fresh future per attempt.
//! There is no hidden state between attempts; if attempts need to share something, capture
//! an `Arc<...>` in the closure explicitly.
//!
//! ## Example
//! ```rust
//! use loadvisor::{LoadError, LoaderFn, LoaderRef};
//!
//! let l: LoaderRef<&'static str> = LoaderFn::arc("greeting", || async {
//!     Ok::<_, LoadError>("hello")
//! });
//!
//! assert_eq!(l.name(), "greeting");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::error::LoadError;
use crate::loaders::loader::{LoadFuture, Loader};

/// Function-backed loader implementation.
#[derive(Debug)]
pub struct LoaderFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> LoaderFn<F> {
    /// Creates a new function-backed loader.
    ///
    /// Prefer [`LoaderFn::arc`] when you immediately need a [`LoaderRef`](crate::LoaderRef).
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the loader and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<T, F, Fut> Loader<T> for LoaderFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, LoadError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<LoadFuture<T>, LoadError> {
        Ok(Box::pin((self.f)()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::LoaderRef;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_each_load_is_a_fresh_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let l: LoaderRef<u32> = LoaderFn::arc("counter", move || {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok::<_, LoadError>(n) }
        });

        let first = l.load().expect("first start").await;
        let second = l.load().expect("second start").await;

        assert_eq!(first, Ok(1));
        assert_eq!(second, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

//! # Preloader: owner of the registries and the event fan-out.
//!
//! A [`Preloader`] replaces process-wide mutable lists with an explicit object: it owns the
//! [`PreloadRegistry`], the [`ReadyRegistry`], the event [`Bus`] and the [`SubscriberSet`].
//! Chunks are defined against a preloader and register their initializers into it.
//!
//! ```text
//! Preloader
//!   ├─ registry()        PreloadRegistry ◄── every defined chunk
//!   ├─ ready_registry()  ReadyRegistry   ◄── chunks declaring resources
//!   ├─ bus()             Bus ── listener ──► SubscriberSet ──► LogWriter / custom
//!   │
//!   ├─ preload_all()     = registry().drain_all(true)
//!   ├─ preload_ready()   = ready_registry().drain_ready(true)
//!   └─ preload_chunks()  = one forced pass over an explicit list
//! ```
//!
//! [`Preloader::global`] provides the process-wide instance; tests build their own, or call
//! [`Preloader::reset`] between cases.
//!
//! ## Example
//! ```rust
//! use loadvisor::{LoadError, LoaderFn, LoaderRef, PreloadConfig, Preloader};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let preloader = Preloader::builder(PreloadConfig::default()).build();
//!
//!     let loader: LoaderRef<&str> = LoaderFn::arc("page", || async { Ok::<_, LoadError>("page body") });
//!     let page = preloader.chunk(loader).build()?;
//!
//!     preloader.preload_all().await?;
//!     assert_eq!(page.mount().view().imported, Some("page body"));
//!     Ok(())
//! }
//! ```

use std::sync::{Arc, OnceLock};

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::{
    builder::PreloaderBuilder,
    config::PreloadConfig,
    ready::{ReadinessProbe, ReadyRegistry},
    registry::{Initializer, PreloadRegistry, drain_batch},
};
use crate::{
    error::LoadError,
    events::{Bus, Event, EventKind},
    subscribers::SubscriberSet,
};

static GLOBAL: OnceLock<Arc<Preloader>> = OnceLock::new();

/// Owns the registries, the event bus and the subscriber fan-out.
pub struct Preloader {
    cfg: PreloadConfig,
    bus: Bus,
    subs: Arc<SubscriberSet>,
    all: PreloadRegistry,
    ready: ReadyRegistry,
    listener: CancellationToken,
}

impl Preloader {
    /// Creates a builder for a preloader.
    pub fn builder(cfg: PreloadConfig) -> PreloaderBuilder {
        PreloaderBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: PreloadConfig,
        bus: Bus,
        subs: Arc<SubscriberSet>,
        all: PreloadRegistry,
        ready: ReadyRegistry,
        listener: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            bus,
            subs,
            all,
            ready,
            listener,
        }
    }

    /// The process-wide preloader (default config, no subscribers, no probe).
    pub fn global() -> Arc<Preloader> {
        GLOBAL
            .get_or_init(|| Preloader::builder(PreloadConfig::default()).build())
            .clone()
    }

    /// Forgets every registered initializer in both registries.
    pub fn reset(&self) {
        self.all.clear();
        self.ready.clear();
    }

    /// Defaults inherited by definitions.
    pub fn config(&self) -> &PreloadConfig {
        &self.cfg
    }

    /// Event bus all loads of this preloader publish to.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// The registry of every defined chunk.
    pub fn registry(&self) -> &PreloadRegistry {
        &self.all
    }

    /// The readiness-gated registry.
    pub fn ready_registry(&self) -> &ReadyRegistry {
        &self.ready
    }

    /// Installs (or removes) the readiness probe.
    pub fn set_probe(&self, probe: Option<Arc<dyn ReadinessProbe>>) {
        self.ready.set_probe(probe);
    }

    /// Forces every registered chunk (transitively) to settle; the first error fails the call.
    pub async fn preload_all(&self) -> Result<(), LoadError> {
        self.all.drain_all(true).await
    }

    /// Forces every chunk whose resources are ready to settle; the first error fails the call.
    pub async fn preload_ready(&self) -> Result<(), LoadError> {
        self.ready.drain_ready(true).await
    }

    /// Runs an explicit list of initializers once, surfacing the first error.
    pub async fn preload_chunks(&self, inits: Vec<Initializer>) -> Result<(), LoadError> {
        self.bus
            .publish(
                Event::new(EventKind::DrainStarted)
                    .with_count(inits.len())
                    .with_reason("manual"),
            );
        match drain_batch(inits, true).await {
            Ok(()) => {
                self.bus
                    .publish(Event::new(EventKind::DrainFinished).with_reason("manual"));
                Ok(())
            }
            Err(e) => {
                self.bus
                    .publish(Event::new(EventKind::DrainFailed).with_reason(e.to_string()));
                Err(e)
            }
        }
    }

    pub(super) fn subscribers(&self) -> &SubscriberSet {
        &self.subs
    }

    /// Forwards bus events to the subscribers until the preloader is dropped, then shuts the
    /// subscriber set down.
    pub(super) fn subscriber_listener(&self) {
        let mut rx = self.bus.subscribe();
        let set = self.subs.clone();
        let token = self.listener.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(&ev),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            // Last owner: let the workers finish what is already queued.
            if let Some(set) = Arc::into_inner(set) {
                set.shutdown().await;
            }
        });
    }
}

impl Drop for Preloader {
    fn drop(&mut self) {
        self.listener.cancel();
    }
}

impl std::fmt::Debug for Preloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Preloader")
            .field("cfg", &self.cfg)
            .field("registered", &self.all.len())
            .field("ready_registered", &self.ready.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Script, lazy_init};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<EventKind>>,
    }

    #[async_trait]
    impl crate::subscribers::Subscribe for Recorder {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().await.push(event.kind);
        }

        fn name(&self) -> &'static str {
            "recorder"
        }
    }

    #[test]
    fn test_global_is_shared() {
        let a = Preloader::global();
        let b = Preloader::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preload_chunks_runs_only_given_initializers() {
        let preloader = Preloader::builder(PreloadConfig::default()).build();
        let listed = Script::ok("listed", 10, 1u8);
        let other = Script::ok("other", 10, 2u8);
        let (listed_init, _) = lazy_init(&listed);
        let (other_init, _) = lazy_init(&other);
        preloader.registry().register(other_init);

        preloader
            .preload_chunks(vec![listed_init])
            .await
            .expect("manual drain");
        assert_eq!(listed.calls(), 1);
        assert_eq!(other.calls(), 0);
        assert_eq!(preloader.registry().len(), 1);

        preloader.reset();
        assert!(preloader.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_receive_drain_events() {
        let recorder = Arc::new(Recorder::default());
        let preloader = Preloader::builder(PreloadConfig::default())
            .with_subscribers(vec![recorder.clone() as Arc<dyn crate::subscribers::Subscribe>])
            .build();
        let (init, _) = lazy_init(&Script::ok("page", 10, 1u8));
        preloader.registry().register(init);

        preloader.preload_all().await.expect("drain");
        tokio::time::sleep(Duration::from_millis(1)).await;

        let seen = recorder.seen.lock().await.clone();
        assert_eq!(seen, vec![EventKind::DrainStarted, EventKind::DrainFinished]);
    }

    struct Slow(Mutex<usize>);

    #[async_trait]
    impl crate::subscribers::Subscribe for Slow {
        async fn on_event(&self, _event: &Event) {
            tokio::time::sleep(Duration::from_millis(100)).await;
            *self.0.lock().await += 1;
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_preloader_flushes_subscribers() {
        let slow = Arc::new(Slow(Mutex::new(0)));
        let preloader = Preloader::builder(PreloadConfig::default())
            .with_subscribers(vec![slow.clone() as Arc<dyn crate::subscribers::Subscribe>])
            .build();
        for _ in 0..3 {
            preloader.bus().publish(Event::new(EventKind::DrainStarted));
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
        drop(preloader);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(*slow.0.lock().await, 3);
        // every worker exited and released its subscriber
        assert_eq!(Arc::strong_count(&slow), 1);
    }
}

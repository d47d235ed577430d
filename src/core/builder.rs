use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{
    config::PreloadConfig, preloader::Preloader, ready::ReadinessProbe, ready::ReadyRegistry,
    registry::PreloadRegistry,
};
use crate::{
    events::Bus,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing a [`Preloader`] with optional features.
pub struct PreloaderBuilder {
    cfg: PreloadConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    probe: Option<Arc<dyn ReadinessProbe>>,
}

impl PreloaderBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: PreloadConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            probe: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive load events (attempts, retries, drains) through dedicated workers
    /// with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Installs the readiness probe consulted by [`Preloader::preload_ready`].
    pub fn with_probe(mut self, probe: Arc<dyn ReadinessProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Builds the preloader.
    ///
    /// With subscribers this spawns their workers and the bus listener, so it must then be called
    /// inside a tokio runtime.
    pub fn build(self) -> Arc<Preloader> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let subs = Arc::new(SubscriberSet::new(self.subscribers, bus.clone()));
        let listener = CancellationToken::new();

        let all = PreloadRegistry::new(bus.clone());
        let ready = ReadyRegistry::new(bus.clone());
        ready.set_probe(self.probe);

        let preloader = Arc::new(Preloader::new_internal(
            self.cfg,
            bus,
            subs,
            all,
            ready,
            listener,
        ));
        if !preloader.subscribers().is_empty() {
            preloader.subscriber_listener();
        }
        preloader
    }
}

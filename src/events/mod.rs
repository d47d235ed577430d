//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to publish/subscribe to
//! events emitted by retry controllers, registries and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `RetryController` (attempt lifecycle), `PreloadRegistry` / `ReadyRegistry`
//!   (drains), chunk definitions (registration, retry), `SubscriberSet` workers.
//! - **Consumers**: the `Preloader` listener, which fans out to the `SubscriberSet`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};

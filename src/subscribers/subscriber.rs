//! # Event subscriber trait.
//!
//! Each subscriber gets:
//! - a **dedicated worker task**,
//! - a **bounded queue** (capacity via [`Subscribe::queue_capacity`]),
//! - **panic isolation** (panics are reported as `EventKind::SubscriberPanicked`).
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use loadvisor::{Event, EventKind, Subscribe};
//!
//! struct SlowLoads;
//!
//! #[async_trait]
//! impl Subscribe for SlowLoads {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::TimeoutHit) {
//!             // report the slow resource
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "slow-loads" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Load event subscriber.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally.
/// - Slow processing only fills this subscriber's queue.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Processes a single event. Events arrive in FIFO order per subscriber.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    ///
    /// The default is `type_name::<Self>()`; override it with something short.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to at least 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}

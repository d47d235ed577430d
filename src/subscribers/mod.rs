//! # Event subscribers.
//!
//! [`Subscribe`] is the extension point for observing load events (logging, metrics,
//! tracing bridges). [`SubscriberSet`] fans events out to every subscriber through its own
//! bounded queue and worker, so a slow or panicking subscriber never stalls loads.
//!
//! ```text
//! RetryController / registries ── publish ──► Bus ──► Preloader listener ──► SubscriberSet
//!                                                                   ┌────────────┼────────────┐
//!                                                                   ▼            ▼            ▼
//!                                                               LogWriter     Metrics      Custom
//! ```

mod set;
mod subscriber;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscriber::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;

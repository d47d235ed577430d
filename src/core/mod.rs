//! Loading engine: tasks, groups, timing gates and the preload registries.
//!
//! Internal modules:
//! - [`retry`]: runs one load attempt after another under a retry policy;
//! - [`task`]: a single load as an observable state object;
//! - [`group`]: keyed loads joined into one state with first-error-wins;
//! - [`gate`]: `past_delay`/`timed_out` UI timers;
//! - [`registry`]: ordered initializers and the transitive drain;
//! - [`ready`]: initializers gated on resource readiness;
//! - [`preloader`]: owner of both registries and of the event fan-out.

mod builder;
mod config;
mod gate;
mod group;
mod preloader;
mod ready;
mod registry;
mod retry;
mod task;

pub use builder::PreloaderBuilder;
pub use config::PreloadConfig;
pub use gate::{TimingFlags, TimingGate};
pub use group::{GroupError, GroupState, LoadTaskGroup};
pub use preloader::Preloader;
pub use ready::{ReadinessProbe, ReadyRegistry, ResourceId, ResourceIdsFn, ResourceSet};
pub use registry::{InitFuture, Initializer, PreloadRegistry};
pub use task::{Completion, LoadState, LoadTask};

pub(crate) use group::validate_keys;

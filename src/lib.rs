//! # loadvisor
//!
//! **Loadvisor** is an async resource-loading orchestrator for Rust.
//!
//! It turns "loader" functions (fetch a bundle, read a template, warm a cache) into observable
//! loads with retry/backoff, per-attempt timeouts and UI timing flags, and lets a caller force
//! every registered load to settle before proceeding (pre-rendering, warm-up).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   Chunk<T>   │   │   Chunk<U>   │   │  Chunks<T>   │
//!     │ (one loader) │   │ (one loader) │   │(keyed loaders)│
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ register(initializer)               │
//!            ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Preloader                                                        │
//! │  - PreloadRegistry (every definition)                             │
//! │  - ReadyRegistry   (definitions with resources + ReadinessProbe)  │
//! │  - Bus (broadcast events) ─► SubscriberSet (per-sub queues)       │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │   LoadTask   │   │   LoadTask   │   │LoadTaskGroup │
//!     │ (retry loop) │   │ (retry loop) │   │ (N LoadTasks)│
//!     └──────────────┘   └──────────────┘   └──────────────┘
//!        │ Publishes: LoadStarting, AttemptFailed, TimeoutHit,
//!        │            BackoffScheduled, LoadSucceeded, LoadFailed
//!        ▼
//!     TimingGate per mounted handle: past_delay / timed_out
//! ```
//!
//! ### Lifecycle of one load
//! ```text
//! LoadTask::create(loader, policy)          (construction starts attempt #1)
//!
//! loop {
//!   ├─► publish LoadStarting{ attempt }
//!   ├─► timeout(per-attempt, loader.load())
//!   │       ├─ Ok       ──► publish LoadSucceeded, state = Loaded(v)
//!   │       ├─ Err      ──► publish AttemptFailed
//!   │       └─ elapsed  ──► publish TimeoutHit
//!   │                        ├─ fail_on_timeout ─► error "_t"
//!   │                        ├─ last attempt    ─► keep waiting (advisory)
//!   │                        └─ otherwise       ─► next attempt
//!   ├─► backoff.pop_front()
//!   │       ├─ Some(d) ──► publish BackoffScheduled, sleep(d), continue
//!   │       └─ None    ──► publish LoadFailed, state = Errored(e)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                        |
//! |-------------------|---------------------------------------------------------------|-------------------------------------------|
//! | **Loads**         | Observable single and keyed loads.                            | [`LoadTask`], [`LoadTaskGroup`]           |
//! | **Definitions**   | Lazily started, registered loads with views and retry.        | [`Chunk`], [`Chunks`], [`ChunkHandle`]    |
//! | **Preloading**    | Transitive and readiness-gated drains.                        | [`Preloader`], [`PreloadRegistry`]        |
//! | **Policies**      | Backoff schedules, jitter and per-attempt timeouts.           | [`RetryPolicy`], [`BackoffSchedule`]      |
//! | **UI timing**     | `past_delay` / `timed_out` flags.                             | [`TimingGate`], [`TimingFlags`]           |
//! | **Subscriber API**| Hook into load and drain events.                              | [`Subscribe`]                             |
//! | **Errors**        | Load errors as data, usage errors up front.                   | [`LoadError`], [`UsageError`]             |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use loadvisor::{BackoffSchedule, LoadError, LoaderFn, LoaderRef, PreloadConfig, Preloader};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let preloader = Preloader::builder(PreloadConfig::default()).build();
//!
//!     let settings: LoaderRef<String> = LoaderFn::arc("settings", || async {
//!         Ok::<_, LoadError>("theme=dark".to_string())
//!     });
//!     let chunk = preloader
//!         .chunk(settings)
//!         .with_timeout(Duration::from_secs(2))
//!         .with_backoff(BackoffSchedule::from_millis([100, 500]))
//!         .build()?;
//!
//!     // Force everything registered so far to settle; the first error fails the drain.
//!     preloader.preload_all().await?;
//!
//!     let view = chunk.mount().view();
//!     assert!(view.has_loaded);
//!     assert_eq!(view.imported.as_deref(), Some("theme=dark"));
//!     Ok(())
//! }
//! ```
mod chunk;
mod core;
mod error;
mod events;
mod loaders;
mod policies;
mod subscribers;

#[cfg(test)]
mod test_support;

// ---- Public re-exports ----

pub use chunk::{
    Chunk, ChunkBuilder, ChunkHandle, ChunkView, Chunks, ChunksBuilder, ChunksHandle, ChunksView,
    HoistFn, KeyedResolveFn, ResolveFn,
};
pub use core::{
    Completion, GroupError, GroupState, InitFuture, Initializer, LoadState, LoadTask,
    LoadTaskGroup, PreloadConfig, PreloadRegistry, Preloader, PreloaderBuilder, ReadinessProbe,
    ReadyRegistry, ResourceId, ResourceIdsFn, ResourceSet, TimingFlags, TimingGate,
};
pub use error::{LoadError, TIMEOUT_ERR, UsageError};
pub use events::{Bus, Event, EventKind};
pub use loaders::{LoadFuture, Loader, LoaderFn, LoaderRef};
pub use policies::{BackoffSchedule, ExponentialBackoff, JitterPolicy, RetryPolicy};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

//! # Chunk definitions.
//!
//! A chunk is a declared, lazily started load bound to a [`Preloader`](crate::Preloader):
//! - [`Chunk`] wraps one loader, [`Chunks`] wraps keyed loaders;
//! - defining one registers its [`Initializer`](crate::Initializer) for preloading;
//! - the load starts on the first `preload()`, `mount()` or drain, and every later call joins it;
//! - `mount()` gives a handle with its own [`TimingGate`](crate::TimingGate) and `retry()`.
//!
//! Options a builder does not set are inherited from [`PreloadConfig`](crate::PreloadConfig).

mod definition;
mod keyed;
mod single;

pub use keyed::{Chunks, ChunksBuilder, ChunksHandle, ChunksView, KeyedResolveFn};
pub use single::{Chunk, ChunkBuilder, ChunkHandle, ChunkView, HoistFn, ResolveFn};

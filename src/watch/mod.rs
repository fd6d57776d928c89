// src/watch/mod.rs

//! Debounced watch adapter.
//!
//! - [`patterns`] decides which changed paths belong to a task (source folder
//!   plus exclude globs).
//! - [`debounce`] collapses a burst of changes into one request and drops
//!   the burst caused by setting up a watch.
//! - [`watcher`] wires both to a `notify` watcher and feeds the pipeline.
//!
//! It does not know about schedulers; it only orders builds and restarts.

pub mod debounce;
pub mod patterns;
pub mod watcher;

pub use debounce::{Debouncer, WatchSignal};
pub use patterns::{ChangeFilter, build_globset, is_relevant};
pub use watcher::{
    PathFilter, WatchOptions, WatcherHandle, watch_composition, watch_paths, watch_task,
};

// src/watch/mod.rs

//! File watching: turns filesystem notifications into debounced batches of
//! root-relative [`ChangeEvent`](crate::types::ChangeEvent)s.
//!
//! It does not decide what to run; that is the dependency cache's job.

pub mod debounce;
pub mod ignore;
pub mod path_utils;
pub mod watcher;

pub use debounce::ChangeBatch;
pub use ignore::{DEFAULT_IGNORES, IgnoreSet};
pub use watcher::{DEFAULT_DEBOUNCE, WatcherHandle, change_kind, spawn_watcher};

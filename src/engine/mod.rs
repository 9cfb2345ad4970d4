// src/engine/mod.rs

//! Orchestration of test rounds.
//!
//! [`session`] holds the round pipeline (changes → targets → runs →
//! cache write-back → merged report). [`runtime`] is the async shell that
//! feeds it change batches from the watcher until shutdown.

pub mod session;
pub mod runtime;

use crate::types::ChangeEvent;

/// Events flowing into the runtime loop.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A debounced batch of file changes.
    ChangesDetected(Vec<ChangeEvent>),
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub use runtime::Runtime;
pub use session::{RoundReport, Session, UnitFailure};

// src/watch/debounce.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::{ChangeEvent, ChangeKind};

/// Collects changes between flushes, one entry per path.
#[derive(Debug, Default)]
pub struct ChangeBatch {
    pending: BTreeMap<PathBuf, ChangeKind>,
}

impl ChangeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change; a later kind for the same path replaces an earlier
    /// one.
    pub fn push(&mut self, path: PathBuf, kind: ChangeKind) {
        self.pending.insert(path, kind);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Drain everything collected so far, sorted by path.
    pub fn take(&mut self) -> Vec<ChangeEvent> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|(path, kind)| ChangeEvent::new(path, kind))
            .collect()
    }
}

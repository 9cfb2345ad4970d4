// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::event::{MetadataKind, ModifyKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::types::{ChangeEvent, ChangeKind};

use super::debounce::ChangeBatch;
use super::ignore::IgnoreSet;
use super::path_utils::relative_str;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Keeps the underlying `notify` watcher alive. Dropping it stops watching
/// and, once pending changes are flushed, closes the batch channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    root: PathBuf,
}

impl WatcherHandle {
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").field("root", &self.root).finish()
    }
}

/// Watch `root` recursively and send debounced batches of root-relative
/// [`ChangeEvent`]s to `batch_tx`.
///
/// A batch is flushed once `debounce` has passed without a new change.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    ignore: IgnoreSet,
    debounce: Duration,
    batch_tx: mpsc::Sender<Vec<ChangeEvent>>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Fails only once the async side has shut down.
                let _ = event_tx.send(event);
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )
    .context("creating file watcher")?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .with_context(|| format!("watching {}", root.display()))?;
    info!(root = %root.display(), ?debounce, "file watcher started");

    let loop_root = root.clone();
    tokio::spawn(async move {
        let mut batch = ChangeBatch::new();
        let mut flush_at: Option<Instant> = None;

        loop {
            let event = match flush_at {
                Some(at) => tokio::select! {
                    event = event_rx.recv() => event,
                    _ = tokio::time::sleep_until(at) => {
                        flush_at = None;
                        let events = batch.take();
                        debug!(changes = events.len(), "flushing change batch");
                        if batch_tx.send(events).await.is_err() {
                            break;
                        }
                        continue;
                    }
                },
                None => event_rx.recv().await,
            };

            let Some(event) = event else {
                break;
            };

            let Some(kind) = change_kind(&event.kind) else {
                continue;
            };
            for path in &event.paths {
                let Some(rel) = relative_str(&loop_root, path) else {
                    continue;
                };
                if rel.is_empty() || ignore.is_ignored(&rel) {
                    continue;
                }
                batch.push(PathBuf::from(rel), kind);
                flush_at = Some(Instant::now() + debounce);
            }
        }

        if !batch.is_empty() {
            let _ = batch_tx.send(batch.take()).await;
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle { _inner: watcher, root })
}

/// Map a notify event kind to a change kind; `None` for events that do not
/// change file contents (access, atime updates).
pub fn change_kind(kind: &EventKind) -> Option<ChangeKind> {
    match kind {
        EventKind::Create(_) => Some(ChangeKind::Created),
        EventKind::Remove(_) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(ChangeKind::Deleted),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(ChangeKind::Created),
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => None,
        EventKind::Modify(_) => Some(ChangeKind::Modified),
        EventKind::Access(_) | EventKind::Any | EventKind::Other => None,
    }
}

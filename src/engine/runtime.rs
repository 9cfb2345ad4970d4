// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::exec::PackageRunner;

use super::session::{RoundReport, Session};
use super::RuntimeEvent;

/// Async shell around a [`Session`]: consumes change batches and runs one
/// round per batch until shutdown.
///
/// Batches that queue up while a round is running are coalesced into the
/// next round.
pub struct Runtime<R: PackageRunner + 'static> {
    session: Session<R>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    shutdown: CancellationToken,
}

impl<R: PackageRunner + 'static> fmt::Debug for Runtime<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<R: PackageRunner + 'static> Runtime<R> {
    pub fn new(session: Session<R>, event_rx: mpsc::Receiver<RuntimeEvent>, shutdown: CancellationToken) -> Self {
        Self {
            session,
            event_rx,
            shutdown,
        }
    }

    pub fn session(&self) -> &Session<R> {
        &self.session
    }

    /// Main event loop. `on_round` sees every completed round.
    pub async fn run(mut self, mut on_round: impl FnMut(&RoundReport)) {
        info!("sentinel runtime started");

        loop {
            let event = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
                event = self.event_rx.recv() => event,
            };

            let mut changes = match event {
                Some(RuntimeEvent::ChangesDetected(changes)) => changes,
                Some(RuntimeEvent::ShutdownRequested) => {
                    info!("shutdown event received; stopping runtime");
                    break;
                }
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            let mut stop_after_round = false;
            while let Ok(queued) = self.event_rx.try_recv() {
                match queued {
                    RuntimeEvent::ChangesDetected(more) => changes.extend(more),
                    RuntimeEvent::ShutdownRequested => stop_after_round = true,
                }
            }

            debug!(changes = changes.len(), "starting round");
            let report = self.session.run_round(&self.shutdown, &changes).await;
            on_round(&report);

            if stop_after_round {
                info!("shutdown event received during round; stopping runtime");
                break;
            }
        }

        info!("runtime exiting");
    }
}

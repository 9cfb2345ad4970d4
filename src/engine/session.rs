// src/engine/session.rs

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::DependencyCache;
use crate::errors::SentinelError;
use crate::exec::PackageRunner;
use crate::scheduler::{MergedReport, ParallelConfig, ParallelScheduler, ParallelTestResult, merge_results};
use crate::types::ChangeEvent;

/// A unit that produced no suite this round.
#[derive(Debug)]
pub struct UnitFailure {
    pub target: String,
    pub error: SentinelError,
}

/// Everything one round decided and produced.
#[derive(Debug, Default)]
pub struct RoundReport {
    /// Targets affected by the round's changes (or requested explicitly).
    pub targets: Vec<String>,
    /// Targets that were actually dispatched.
    pub executed: Vec<String>,
    /// Targets answered from the cache instead of running.
    pub cache_hits: usize,
    pub failures: Vec<UnitFailure>,
    pub report: MergedReport,
    pub duration: Duration,
}

impl RoundReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty() && self.report.success()
    }

    /// `true` when the round was stopped rather than completed.
    pub fn cancelled(&self) -> bool {
        self.failures.iter().any(|f| f.error.is_cancellation())
    }
}

/// Ties the dependency cache and the parallel scheduler together.
pub struct Session<R: PackageRunner + 'static> {
    cache: Arc<DependencyCache>,
    scheduler: ParallelScheduler<R>,
    config: ParallelConfig,
}

impl<R: PackageRunner + 'static> Session<R> {
    pub fn new(runner: R, cache: Arc<DependencyCache>, concurrency: usize, config: ParallelConfig) -> Self {
        let scheduler = ParallelScheduler::new(runner, concurrency).with_cache(cache.clone());
        Self {
            cache,
            scheduler,
            config,
        }
    }

    pub fn cache(&self) -> &DependencyCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &ParallelScheduler<R> {
        &self.scheduler
    }

    /// Run one round for a batch of file changes.
    pub async fn run_round(&self, cancel: &CancellationToken, changes: &[ChangeEvent]) -> RoundReport {
        let targets = {
            let cache = Arc::clone(&self.cache);
            let changes = changes.to_vec();
            blocking(move || cache.determine_targets(&changes)).await
        };

        if targets.is_empty() {
            info!(changes = changes.len(), "no targets affected");
            return RoundReport::default();
        }

        self.run_selected(cancel, targets, changes).await
    }

    /// Run explicitly requested targets, trusting fresh cache records.
    pub async fn run_targets(&self, cancel: &CancellationToken, targets: &[String]) -> RoundReport {
        self.run_selected(cancel, targets.to_vec(), &[]).await
    }

    async fn run_selected(
        &self,
        cancel: &CancellationToken,
        targets: Vec<String>,
        changes: &[ChangeEvent],
    ) -> RoundReport {
        let started = Instant::now();

        let needs = {
            let cache = Arc::clone(&self.cache);
            let (targets, changes) = (targets.clone(), changes.to_vec());
            blocking(move || cache.needs_execution(&targets, &changes)).await
        };
        let needed: BTreeSet<&str> = needs.iter().map(String::as_str).collect();

        let mut results: Vec<ParallelTestResult> = targets
            .iter()
            .filter(|t| !needed.contains(t.as_str()))
            .filter_map(|t| {
                let suite = self.cache.record(t)?.suite?;
                Some(ParallelTestResult::cached(t.clone(), suite.as_ref().clone()))
            })
            .collect();
        let skipped = targets.len() - needs.len();

        let config = ParallelConfig {
            bypass_cache: changes.iter().any(ChangeEvent::is_new_change),
            ..self.config.clone()
        };
        let ran = self.scheduler.run_parallel(cancel, &needs, &config).await;
        let late_hits = ran.iter().filter(|r| r.from_cache).count();
        results.extend(ran);

        let mut report = MergedReport::default();
        merge_results(&mut report, &results);

        let failures: Vec<UnitFailure> = results
            .into_iter()
            .filter_map(|r| {
                r.error.map(|error| UnitFailure {
                    target: r.target,
                    error,
                })
            })
            .collect();

        let round = RoundReport {
            targets,
            executed: needs,
            cache_hits: skipped + late_hits,
            failures,
            report,
            duration: started.elapsed(),
        };

        info!(
            targets = round.targets.len(),
            executed = round.executed.len(),
            cache_hits = round.cache_hits,
            failed_units = round.failures.len(),
            passed = round.report.counts.passed,
            failed = round.report.counts.failed,
            skipped = round.report.counts.skipped,
            duration = ?round.duration,
            "round finished"
        );
        round
    }
}

/// Run filesystem-bound cache work off the async workers.
async fn blocking<T, F>(work: F) -> T
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + Default + 'static,
{
    tokio::task::spawn_blocking(work).await.unwrap_or_else(|err| {
        warn!(error = %err, "cache task failed");
        T::default()
    })
}

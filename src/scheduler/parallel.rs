// src/scheduler/parallel.rs

//! Bounded fan-out of execution units.
//!
//! Every target gets its own task immediately; a shared semaphore decides
//! how many of them hold a slot at once. Results arrive on an mpsc channel
//! that closes once the last task drops its sender. The tasks live in a
//! `JoinSet` owned by the dispatching future, so dropping that future
//! aborts whatever is still running.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::SuiteCache;
use crate::errors::SentinelError;
use crate::exec::PackageRunner;
use crate::model::{ExecutionOptions, TestSuite};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Per-call scheduling options.
#[derive(Debug, Clone, Default)]
pub struct ParallelConfig {
    pub options: ExecutionOptions,
    /// Per-unit timeout, used when `options.timeout` is unset.
    pub timeout: Option<Duration>,
    /// Skip cache lookups (write-back still happens).
    pub bypass_cache: bool,
}

impl ParallelConfig {
    fn effective_options(&self) -> ExecutionOptions {
        let mut options = self.options.clone();
        if options.timeout.is_none() {
            options.timeout = self.timeout;
        }
        options
    }
}

/// Outcome of one execution unit. Exactly one of `suite` and `error` is
/// set.
#[derive(Debug)]
pub struct ParallelTestResult {
    pub target: String,
    pub suite: Option<TestSuite>,
    pub error: Option<SentinelError>,
    pub duration: Duration,
    pub from_cache: bool,
}

impl ParallelTestResult {
    pub fn succeeded(target: impl Into<String>, suite: TestSuite, duration: Duration) -> Self {
        Self {
            target: target.into(),
            suite: Some(suite),
            error: None,
            duration,
            from_cache: false,
        }
    }

    pub fn cached(target: impl Into<String>, suite: TestSuite) -> Self {
        Self {
            target: target.into(),
            suite: Some(suite),
            error: None,
            duration: Duration::ZERO,
            from_cache: true,
        }
    }

    pub fn failed(target: impl Into<String>, error: SentinelError, duration: Duration) -> Self {
        Self {
            target: target.into(),
            suite: None,
            error: Some(error),
            duration,
            from_cache: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.suite.is_some()
    }
}

pub struct ParallelScheduler<R: PackageRunner + 'static> {
    runner: Arc<R>,
    cache: Option<Arc<dyn SuiteCache>>,
    concurrency: usize,
}

impl<R: PackageRunner + 'static> ParallelScheduler<R> {
    /// `concurrency == 0` falls back to [`DEFAULT_CONCURRENCY`].
    pub fn new(runner: R, concurrency: usize) -> Self {
        Self {
            runner: Arc::new(runner),
            cache: None,
            concurrency: if concurrency == 0 { DEFAULT_CONCURRENCY } else { concurrency },
        }
    }

    /// Signed variant for callers holding a raw configured value.
    pub fn with_signed_concurrency(runner: R, concurrency: i64) -> Self {
        Self::new(runner, usize::try_from(concurrency).unwrap_or(0))
    }

    pub fn with_cache(mut self, cache: Arc<dyn SuiteCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every target, at most `concurrency` at a time, and return one
    /// result per target in completion order.
    pub async fn run_parallel(
        &self,
        cancel: &CancellationToken,
        targets: &[String],
        config: &ParallelConfig,
    ) -> Vec<ParallelTestResult> {
        if targets.is_empty() {
            return Vec::new();
        }

        info!(targets = targets.len(), concurrency = self.concurrency, "dispatching units");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let options = Arc::new(config.effective_options());
        let cache = if config.bypass_cache { None } else { self.cache.clone() };
        let (tx, mut rx) = mpsc::channel(targets.len());
        // Dropping this future drops the set, which aborts every unit.
        let mut units = JoinSet::new();

        for target in targets {
            let unit = Unit {
                target: target.clone(),
                runner: Arc::clone(&self.runner),
                lookup: cache.clone(),
                store: self.cache.clone(),
                options: Arc::clone(&options),
                cancel: cancel.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            let tx = tx.clone();

            units.spawn(async move {
                let result = unit.run(semaphore).await;
                // Receiver only goes away if the caller stopped listening.
                let _ = tx.send(result).await;
            });
        }
        drop(tx);

        let mut results = Vec::with_capacity(targets.len());
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        // Every unit has reported; reap the finished tasks.
        while units.join_next().await.is_some() {}

        debug!(results = results.len(), "all units reported");
        results
    }
}

struct Unit<R: PackageRunner + 'static> {
    target: String,
    runner: Arc<R>,
    lookup: Option<Arc<dyn SuiteCache>>,
    store: Option<Arc<dyn SuiteCache>>,
    options: Arc<ExecutionOptions>,
    cancel: CancellationToken,
}

impl<R: PackageRunner + 'static> Unit<R> {
    async fn run(self, semaphore: Arc<Semaphore>) -> ParallelTestResult {
        let started = Instant::now();

        let _permit = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return ParallelTestResult::failed(self.target, SentinelError::Cancelled, started.elapsed());
            }
            permit = semaphore.acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => {
                    return ParallelTestResult::failed(self.target, SentinelError::Cancelled, started.elapsed());
                }
            },
        };

        if let Some(suite) = self.lookup_cached().await {
            debug!(target = %self.target, "cache hit");
            return ParallelTestResult::cached(self.target, suite);
        }

        let target = self.target.clone();
        let runner = Arc::clone(&self.runner);
        let options = Arc::clone(&self.options);
        let cancel = self.cancel.clone();
        // A set of one: aborting this unit aborts the runner call with it.
        let mut call = JoinSet::new();
        call.spawn(async move { runner.run_target(&cancel, &target, &options).await });

        let outcome = match call.join_next().await {
            Some(Ok(outcome)) => outcome,
            Some(Err(err)) => Err(SentinelError::Other(anyhow::anyhow!("unit task for {} failed: {err}", self.target))),
            None => Err(SentinelError::Other(anyhow::anyhow!("unit task for {} vanished", self.target))),
        };
        let duration = started.elapsed();

        match outcome {
            Ok(suite) => {
                self.write_back(&suite).await;
                info!(target = %self.target, ?duration, failed = suite.counts.failed, "unit finished");
                ParallelTestResult::succeeded(self.target, suite, duration)
            }
            Err(err) => {
                if err.is_cancellation() {
                    debug!(target = %self.target, error = %err, "unit stopped");
                } else {
                    warn!(target = %self.target, error = %err, "unit failed");
                }
                ParallelTestResult::failed(self.target, err, duration)
            }
        }
    }

    async fn lookup_cached(&self) -> Option<TestSuite> {
        let cache = self.lookup.clone()?;
        let target = self.target.clone();
        // Freshness checks stat files; keep them off the async workers.
        tokio::task::spawn_blocking(move || cache.cached_suite(&target))
            .await
            .unwrap_or_else(|err| {
                warn!(target = %self.target, error = %err, "cache lookup task failed");
                None
            })
    }

    async fn write_back(&self, suite: &TestSuite) {
        let Some(cache) = self.store.clone() else {
            return;
        };
        let target = self.target.clone();
        let suite = suite.clone();
        if let Err(err) = tokio::task::spawn_blocking(move || cache.store_suite(&target, &suite)).await {
            warn!(target = %self.target, error = %err, "cache write-back task failed");
        }
    }
}

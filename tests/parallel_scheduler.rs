// tests/parallel_scheduler.rs

use std::error::Error;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use sentinel::cache::{DependencyCache, SuiteCache};
use sentinel::errors::SentinelError;
use sentinel::fs::mock::MockFileSystem;
use sentinel::model::TestStatus;
use sentinel::scheduler::{DEFAULT_CONCURRENCY, MergedReport, ParallelConfig, ParallelScheduler, merge_results};
use sentinel_test_utils::builders::{suite, targets};
use sentinel_test_utils::fake_runner::FakeRunner;
use sentinel_test_utils::{init_tracing, with_timeout};
use tokio_util::sync::CancellationToken;

type TestResult = Result<(), Box<dyn Error>>;

fn many(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("pkg{i:02}")).collect()
}

#[tokio::test]
async fn empty_target_list_returns_nothing() {
    let scheduler = ParallelScheduler::new(FakeRunner::new(Duration::ZERO), 4);
    let results = scheduler
        .run_parallel(&CancellationToken::new(), &[], &ParallelConfig::default())
        .await;
    assert!(results.is_empty());
}

#[tokio::test]
async fn non_positive_concurrency_falls_back_to_default() {
    assert_eq!(ParallelScheduler::new(FakeRunner::default(), 0).concurrency(), DEFAULT_CONCURRENCY);
    assert_eq!(
        ParallelScheduler::with_signed_concurrency(FakeRunner::default(), -3).concurrency(),
        DEFAULT_CONCURRENCY
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_more_than_the_cap_at_once() {
    init_tracing();
    let runner = FakeRunner::new(Duration::from_millis(40));
    let scheduler = ParallelScheduler::new(runner.clone(), 3);

    let units = many(12);
    let results = with_timeout(scheduler.run_parallel(&CancellationToken::new(), &units, &ParallelConfig::default())).await;

    assert_eq!(results.len(), units.len());
    assert!(runner.max_active() <= 3, "max active was {}", runner.max_active());
    assert!(runner.max_active() >= 2, "units did not overlap");
}

#[tokio::test]
async fn every_unit_reports_exactly_once() {
    let runner = FakeRunner::build(Duration::from_millis(5), &["pkg03"], &["pkg05"]);
    let scheduler = ParallelScheduler::new(runner.clone(), 2);

    let units = many(8);
    let results = with_timeout(scheduler.run_parallel(&CancellationToken::new(), &units, &ParallelConfig::default())).await;

    let mut seen: Vec<_> = results.iter().map(|r| r.target.clone()).collect();
    seen.sort();
    assert_eq!(seen, units);

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).map(|r| r.target.as_str()).collect();
    assert_eq!(failed, vec!["pkg03"]);
    assert!(results.iter().all(|r| r.error.is_some() != r.suite.is_some()));

    let mut report = MergedReport::default();
    assert_eq!(merge_results(&mut report, &results), 7);
    assert_eq!(report.counts.total, 7);
    assert_eq!(report.counts.failed, 1);
}

#[tokio::test]
async fn cache_hits_skip_the_runner_and_misses_write_back() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file_at("a/a.go", SystemTime::now() - Duration::from_secs(60));
    fs.add_file_at("b/b.go", SystemTime::now() - Duration::from_secs(60));
    let cache = Arc::new(DependencyCache::with_fs(Arc::new(fs), "."));
    cache.store_suite("a", &suite("a", &[TestStatus::Pass]));

    let runner = FakeRunner::new(Duration::from_millis(5));
    let scheduler = ParallelScheduler::new(runner.clone(), 2).with_cache(cache.clone());

    let results = with_timeout(scheduler.run_parallel(
        &CancellationToken::new(),
        &targets(&["a", "b"]),
        &ParallelConfig::default(),
    ))
    .await;

    let a = results.iter().find(|r| r.target == "a").ok_or("missing a")?;
    assert!(a.from_cache);
    assert_eq!(a.duration, Duration::ZERO);
    let b = results.iter().find(|r| r.target == "b").ok_or("missing b")?;
    assert!(!b.from_cache);

    assert_eq!(runner.calls(), vec!["b"]);
    assert!(cache.cached_suite("b").is_some());
    Ok(())
}

#[tokio::test]
async fn failed_units_are_not_cached() {
    let fs = MockFileSystem::new();
    fs.add_file_at("a/a.go", SystemTime::now() - Duration::from_secs(60));
    let cache = Arc::new(DependencyCache::with_fs(Arc::new(fs), "."));

    let scheduler = ParallelScheduler::new(FakeRunner::build(Duration::ZERO, &["a"], &[]), 1).with_cache(cache.clone());
    let results = with_timeout(scheduler.run_parallel(&CancellationToken::new(), &targets(&["a"]), &ParallelConfig::default())).await;

    assert!(matches!(results[0].error, Some(SentinelError::PackageFailed { .. })));
    assert!(cache.record("a").is_none());
}

#[tokio::test]
async fn bypass_ignores_fresh_suites() {
    let fs = MockFileSystem::new();
    fs.add_file_at("a/a.go", SystemTime::now() - Duration::from_secs(60));
    let cache = Arc::new(DependencyCache::with_fs(Arc::new(fs), "."));
    cache.store_suite("a", &suite("a", &[TestStatus::Pass]));

    let runner = FakeRunner::new(Duration::ZERO);
    let scheduler = ParallelScheduler::new(runner.clone(), 1).with_cache(cache);
    let config = ParallelConfig {
        bypass_cache: true,
        ..ParallelConfig::default()
    };

    let results = with_timeout(scheduler.run_parallel(&CancellationToken::new(), &targets(&["a"]), &config)).await;
    assert!(!results[0].from_cache);
    assert_eq!(runner.calls(), vec!["a"]);
}

#[tokio::test]
async fn cancellation_unblocks_waiting_units() {
    let runner = FakeRunner::new(Duration::from_secs(30));
    let scheduler = ParallelScheduler::new(runner, 1);
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let results = with_timeout(scheduler.run_parallel(&cancel, &many(4), &ParallelConfig::default())).await;
    assert_eq!(results.len(), 4);
    assert!(results.iter().all(|r| matches!(r.error, Some(SentinelError::Cancelled))));
}

#[tokio::test]
async fn dropping_the_dispatch_aborts_pending_units() {
    let runner = FakeRunner::new(Duration::from_millis(200));
    let scheduler = ParallelScheduler::new(runner.clone(), 1);
    let units = many(3);
    let cancel = CancellationToken::new();
    let config = ParallelConfig::default();

    let dropped = tokio::time::timeout(
        Duration::from_millis(50),
        scheduler.run_parallel(&cancel, &units, &config),
    )
    .await;
    assert!(dropped.is_err());

    // Detached units would have worked through the queue by now.
    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(runner.calls().len(), 1);
}

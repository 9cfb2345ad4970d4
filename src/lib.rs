// src/lib.rs

pub mod cache;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod model;
pub mod parse;
pub mod scheduler;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::DependencyCache;
use crate::cli::CliArgs;
use crate::config::{SentinelConfig, load_or_default};
use crate::engine::{RoundReport, Runtime, RuntimeEvent, Session};
use crate::exec::ExecutorRunner;
use crate::scheduler::ParallelConfig;
use crate::watch::{IgnoreSet, spawn_watcher};

/// High-level entry point used by `main.rs`.
///
/// Runs the requested targets once, then (with `--watch`) keeps re-testing
/// whatever file changes affect until Ctrl-C. Returns whether the last
/// round succeeded.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = apply_cli_overrides(load_or_default(&args.config)?, &args);
    let root = project_root(&cfg);

    let cache = Arc::new(DependencyCache::new(root.clone()).with_recency_window(cfg.recency_window));
    let mut options = cfg.options.clone();
    options.working_directory.get_or_insert_with(|| root.clone());

    let session = Session::new(
        ExecutorRunner::new(cfg.tool.clone()),
        Arc::clone(&cache),
        cfg.concurrency,
        ParallelConfig {
            options,
            timeout: cfg.unit_timeout,
            bypass_cache: false,
        },
    );

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            shutdown.cancel();
        });
    }

    let first = session.run_targets(&shutdown, &args.targets).await;
    print_summary(&first);
    if !args.watch || shutdown.is_cancelled() {
        return Ok(first.success());
    }

    let ignore = IgnoreSet::new(&cfg.watch.ignore)?;
    let (batch_tx, mut batch_rx) = mpsc::channel(16);
    let _watcher = spawn_watcher(root, ignore, cfg.watch.debounce, batch_tx)?;

    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(16);
    tokio::spawn(async move {
        while let Some(batch) = batch_rx.recv().await {
            if rt_tx.send(RuntimeEvent::ChangesDetected(batch)).await.is_err() {
                break;
            }
        }
    });

    let mut last_success = first.success();
    Runtime::new(session, rt_rx, shutdown)
        .run(|report| {
            print_summary(report);
            last_success = report.success();
        })
        .await;

    info!("sentinel stopped");
    Ok(last_success)
}

fn apply_cli_overrides(mut cfg: SentinelConfig, args: &CliArgs) -> SentinelConfig {
    if let Some(concurrency) = args.concurrency {
        cfg.concurrency = concurrency;
    }
    if args.json {
        cfg.options.json_output = true;
    }
    if args.verbose {
        cfg.options.verbose = true;
    }
    cfg
}

/// The configured working directory, or the current directory.
fn project_root(cfg: &SentinelConfig) -> PathBuf {
    match cfg.options.working_directory.as_deref() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf()),
    }
}

/// One plain line per round; rendering proper belongs to a presentation
/// layer.
fn print_summary(report: &RoundReport) {
    let counts = report.report.counts;
    println!(
        "{} targets, {} run, {} cached: {} passed, {} failed, {} skipped, {} unit errors ({:.2?})",
        report.targets.len(),
        report.executed.len(),
        report.cache_hits,
        counts.passed,
        counts.failed,
        counts.skipped,
        report.failures.len(),
        report.duration,
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.target, failure.error);
    }
}

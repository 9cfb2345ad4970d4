// src/exec/executor.rs

//! Single-flight test executor.
//!
//! One `Executor` runs at most one execution at a time. Every call gets a
//! child of the caller's cancellation token; `cancel()` trips that child
//! from any task, and the guard returned by `begin` clears the in-flight
//! state on every exit path.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::errors::{Result, SentinelError};
use crate::model::{ExecutionOptions, ExecutionResult, PackageFailure, PackageResult, TestResult, TestStatus};
use crate::parse::demultiplex;

use super::args::{ToolCommand, build_test_args};
use super::expand::expand_targets;
use super::process::{self, ProcessOutput, SpawnRequest};

/// Slack added to the tool's own timeout before we kill it ourselves.
pub const DEADLINE_SLACK: Duration = Duration::from_secs(5);

/// Exit code the tool uses when it ran tests and some of them failed.
const TEST_FAILURE_EXIT: i32 = 1;

const PACKAGE_FAILED_MESSAGE: &str = "package failed without failing tests";

#[derive(Debug, Default)]
struct ExecState {
    running: bool,
    cancel: Option<CancellationToken>,
}

#[derive(Debug)]
pub struct Executor {
    tool: ToolCommand,
    state: Mutex<ExecState>,
}

/// Marks the executor busy for its lifetime.
struct RunGuard<'a> {
    executor: &'a Executor,
    token: CancellationToken,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.executor.lock_state();
        state.running = false;
        state.cancel = None;
        drop(state);
        // Anything still listening on this run's token is done too.
        self.token.cancel();
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self::with_tool(ToolCommand::default())
    }

    pub fn with_tool(tool: ToolCommand) -> Self {
        Self {
            tool,
            state: Mutex::new(ExecState::default()),
        }
    }

    pub fn tool(&self) -> &ToolCommand {
        &self.tool
    }

    pub fn is_running(&self) -> bool {
        self.lock_state().running
    }

    /// Stop the in-flight execution. Returns immediately; the running call
    /// observes the cancellation and tears its process group down.
    pub fn cancel(&self) -> Result<()> {
        let state = self.lock_state();
        match (&state.cancel, state.running) {
            (Some(token), true) => {
                info!("cancelling in-flight test execution");
                token.cancel();
                Ok(())
            }
            _ => Err(SentinelError::NotRunning),
        }
    }

    /// Run `targets` one package at a time. Wildcard targets are expanded
    /// first; any package-level error aborts the whole call.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        targets: &[String],
        options: &ExecutionOptions,
    ) -> Result<ExecutionResult> {
        let guard = self.begin(cancel)?;
        let start = SystemTime::now();

        let packages = expand_targets(&self.tool, &guard.token, targets, options).await?;
        info!(count = packages.len(), "executing packages sequentially");

        let mut results = Vec::with_capacity(packages.len());
        for package in &packages {
            results.push(self.run_package(&guard.token, package, options).await?);
        }

        Ok(ExecutionResult::from_packages(results, start, SystemTime::now()))
    }

    /// Run a single package (or test file) target.
    pub async fn execute_package(
        &self,
        cancel: &CancellationToken,
        target: &str,
        options: &ExecutionOptions,
    ) -> Result<PackageResult> {
        let guard = self.begin(cancel)?;
        self.run_package(&guard.token, target, options).await
    }

    /// Run every package in one tool invocation and split the combined
    /// stream back out per package.
    pub async fn execute_multiple_packages(
        &self,
        cancel: &CancellationToken,
        targets: &[String],
        options: &ExecutionOptions,
    ) -> Result<ExecutionResult> {
        let guard = self.begin(cancel)?;
        let start = SystemTime::now();

        let packages = expand_targets(&self.tool, &guard.token, targets, options).await?;
        if packages.is_empty() {
            return Ok(ExecutionResult::from_packages(Vec::new(), start, SystemTime::now()));
        }

        let started = Instant::now();
        let out = self.run_tool(&guard.token, &packages, options).await?;
        let elapsed = started.elapsed();

        let exit_code = out.status.code();
        let outputs = demultiplex(&out.output, &packages);
        let any_tests = outputs.iter().any(|o| !o.tests.is_empty());
        let explained = outputs
            .iter()
            .any(|o| o.package_failed || o.tests.iter().any(|t| t.status == TestStatus::Fail));

        if !out.status.success() && !(exit_code == Some(TEST_FAILURE_EXIT) && explained) {
            warn!(?exit_code, packages = packages.len(), "combined invocation failed without test results");
            let failed = PackageResult {
                package: packages.join(" "),
                success: false,
                duration: elapsed,
                error: Some(failure_from_output(exit_code, &out.output, any_tests)),
                output: out.output,
                tests: Vec::new(),
            };
            return Ok(ExecutionResult::from_packages(vec![failed], start, SystemTime::now()));
        }

        let results = outputs
            .into_iter()
            .map(|pkg| {
                let has_failures = pkg.tests.iter().any(|t| t.status == TestStatus::Fail);
                let error = (pkg.package_failed && !has_failures).then(|| PackageFailure {
                    exit_code,
                    message: PACKAGE_FAILED_MESSAGE.to_string(),
                });
                PackageResult {
                    success: !pkg.package_failed && !has_failures,
                    duration: top_level_duration(&pkg.tests),
                    package: pkg.package,
                    output: pkg.output,
                    tests: pkg.tests,
                    error,
                }
            })
            .collect();

        Ok(ExecutionResult::from_packages(results, start, SystemTime::now()))
    }

    fn begin(&self, parent: &CancellationToken) -> Result<RunGuard<'_>> {
        let mut state = self.lock_state();
        if state.running {
            debug!("rejecting concurrent execution");
            return Err(SentinelError::Busy);
        }

        let token = parent.child_token();
        state.running = true;
        state.cancel = Some(token.clone());

        Ok(RunGuard {
            executor: self,
            token,
        })
    }

    async fn run_package(
        &self,
        cancel: &CancellationToken,
        target: &str,
        options: &ExecutionOptions,
    ) -> Result<PackageResult> {
        let started = Instant::now();
        let targets = [target.to_string()];
        let out = self.run_tool(cancel, &targets, options).await?;
        let duration = started.elapsed();

        let exit_code = out.status.code();
        let mut package_failed = false;
        let mut tests = Vec::new();
        for pkg in demultiplex(&out.output, &targets) {
            package_failed |= pkg.package_failed;
            tests.extend(pkg.tests);
        }
        let has_failures = tests.iter().any(|t| t.status == TestStatus::Fail);

        // Exit 1 is the tool reporting failed tests. Any other non-zero
        // exit, or a package-level failure with every test passing
        // (TestMain exit, race report, late panic), means the package
        // itself failed.
        let explained = exit_code == Some(TEST_FAILURE_EXIT) && has_failures;
        let error = if !out.status.success() && !explained {
            Some(failure_from_output(exit_code, &out.output, !tests.is_empty()))
        } else if package_failed && !has_failures {
            Some(PackageFailure {
                exit_code,
                message: PACKAGE_FAILED_MESSAGE.to_string(),
            })
        } else {
            None
        };

        info!(
            package = target,
            ?exit_code,
            tests = tests.len(),
            failed = has_failures,
            ?duration,
            "package run finished"
        );

        Ok(PackageResult {
            package: target.to_string(),
            success: error.is_none() && !has_failures,
            duration,
            output: out.output,
            tests,
            error,
        })
    }

    async fn run_tool(
        &self,
        cancel: &CancellationToken,
        targets: &[String],
        options: &ExecutionOptions,
    ) -> Result<ProcessOutput> {
        let args = build_test_args(&self.tool, options, targets);
        let handle = process::spawn(SpawnRequest {
            program: &self.tool.program,
            args: &args,
            working_dir: options.working_directory.as_deref(),
            env: &options.env,
        })?;
        info!(
            program = %self.tool.program,
            pid = handle.pid(),
            targets = ?targets,
            "starting test process"
        );

        let deadline = options
            .timeout
            .filter(|t| !t.is_zero())
            .map(|t| t + DEADLINE_SLACK);
        handle.wait_with_output(cancel, deadline).await
    }

    fn lock_state(&self) -> MutexGuard<'_, ExecState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Summarise why a package failed: the first meaningful output line, or a
/// generic message depending on whether any test ran.
fn failure_from_output(exit_code: Option<i32>, output: &str, ran_tests: bool) -> PackageFailure {
    let message = output
        .lines()
        .map(str::trim)
        .find(|l| {
            !l.is_empty()
                && !l.starts_with('#')
                && !l.starts_with('{')
                && !l.starts_with("=== ")
                && !l.starts_with("--- ")
        })
        .map(str::to_string)
        .unwrap_or_else(|| {
            if ran_tests {
                PACKAGE_FAILED_MESSAGE.to_string()
            } else {
                "test tool exited without running tests".to_string()
            }
        });

    PackageFailure { exit_code, message }
}

/// Sum of top-level test durations; subtests are already included in their
/// parent's time.
fn top_level_duration(tests: &[TestResult]) -> Duration {
    tests
        .iter()
        .filter(|t| !t.name.contains('/'))
        .map(|t| t.duration)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_when_idle_is_not_running() {
        let executor = Executor::new();
        assert!(!executor.is_running());
        assert!(matches!(executor.cancel(), Err(SentinelError::NotRunning)));
    }

    #[test]
    fn guard_marks_busy_until_dropped() {
        let executor = Executor::new();
        let parent = CancellationToken::new();

        let guard = executor.begin(&parent).unwrap();
        assert!(executor.is_running());
        assert!(matches!(executor.begin(&parent), Err(SentinelError::Busy)));

        let token = guard.token.clone();
        drop(guard);
        assert!(!executor.is_running());
        assert!(token.is_cancelled());
        assert!(!parent.is_cancelled());
    }

    #[test]
    fn failure_message_skips_package_headers() {
        let out = "# example.com/m/pkg\npkg/a.go:3:1: syntax error\nFAIL\texample.com/m/pkg [build failed]\n";
        let failure = failure_from_output(Some(2), out, false);
        assert_eq!(failure.message, "pkg/a.go:3:1: syntax error");
        assert_eq!(failure.exit_code, Some(2));
    }

    #[test]
    fn failure_after_passing_tests_has_a_generic_message() {
        let out = "{\"Action\":\"pass\",\"Package\":\"m/a\",\"Test\":\"TestA\"}\n";
        let failure = failure_from_output(Some(1), out, true);
        assert_eq!(failure.message, PACKAGE_FAILED_MESSAGE);
    }
}

// src/model.rs

//! Typed result tree produced by the executor and consumed by the scheduler,
//! the cache and (externally) the presentation layer.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::Serialize;

/// Per-call execution configuration. Never mutated by the executor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub verbose: bool,
    /// Ask the tool for its line-delimited JSON event stream.
    pub json_output: bool,
    pub coverage: bool,
    pub coverage_profile: Option<PathBuf>,
    /// Passed to the tool as its own timeout; the executor also derives a
    /// hard deadline from it.
    pub timeout: Option<Duration>,
    /// Per-package test parallelism hint for the tool.
    pub parallel: Option<usize>,
    /// Extra arguments, appended after the built-in flags.
    pub args: Vec<String>,
    /// Environment overrides applied to the subprocess only.
    pub env: BTreeMap<String, String>,
    pub working_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pass,
    Fail,
    Skip,
    Running,
}

impl TestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TestStatus::Running)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestStatus::Pass => "pass",
            TestStatus::Fail => "fail",
            TestStatus::Skip => "skip",
            TestStatus::Running => "running",
        };
        f.write_str(s)
    }
}

/// One test outcome, created once by the parser and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestResult {
    pub name: String,
    pub package: String,
    pub status: TestStatus,
    pub duration: Duration,
    /// The raw output line the result was parsed from.
    pub output: String,
    pub error: Option<String>,
}

/// Why a package could not be built or run at all.
///
/// Distinct from test failures: a package with a `PackageFailure` ran no
/// (or not all) of its tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageFailure {
    pub exit_code: Option<i32>,
    pub message: String,
}

impl fmt::Display for PackageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "{} (exit status {code})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageResult {
    pub package: String,
    pub success: bool,
    pub duration: Duration,
    pub output: String,
    pub tests: Vec<TestResult>,
    pub error: Option<PackageFailure>,
}

impl PackageResult {
    pub fn counts(&self) -> TestCounts {
        TestCounts::tally(&self.tests)
    }
}

/// Pass/fail/skip tallies. `total` only counts terminal statuses, so
/// `total == passed + failed + skipped` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl TestCounts {
    pub fn tally<'a>(tests: impl IntoIterator<Item = &'a TestResult>) -> Self {
        let mut counts = TestCounts::default();
        for test in tests {
            counts.add(test.status);
        }
        counts
    }

    pub fn add(&mut self, status: TestStatus) {
        match status {
            TestStatus::Pass => self.passed += 1,
            TestStatus::Fail => self.failed += 1,
            TestStatus::Skip => self.skipped += 1,
            TestStatus::Running => return,
        }
        self.total += 1;
    }

    pub fn merge(&mut self, other: TestCounts) {
        self.total += other.total;
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

/// Aggregate outcome of one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionResult {
    pub packages: Vec<PackageResult>,
    pub success: bool,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub skipped_tests: usize,
    pub start_time: SystemTime,
    pub end_time: SystemTime,
    pub total_duration: Duration,
}

impl ExecutionResult {
    /// Fold package results into an aggregate.
    ///
    /// `end_time` is clamped to `start_time` if the wall clock stepped
    /// backwards during the run.
    pub fn from_packages(
        packages: Vec<PackageResult>,
        start_time: SystemTime,
        end_time: SystemTime,
    ) -> Self {
        let end_time = end_time.max(start_time);

        let mut counts = TestCounts::default();
        let mut success = true;
        for pkg in &packages {
            counts.merge(pkg.counts());
            success &= pkg.success;
        }
        success &= counts.failed == 0;

        Self {
            packages,
            success,
            total_tests: counts.total,
            passed_tests: counts.passed,
            failed_tests: counts.failed,
            skipped_tests: counts.skipped,
            start_time,
            end_time,
            total_duration: end_time.duration_since(start_time).unwrap_or_default(),
        }
    }

    pub fn counts(&self) -> TestCounts {
        TestCounts {
            total: self.total_tests,
            passed: self.passed_tests,
            failed: self.failed_tests,
            skipped: self.skipped_tests,
        }
    }
}

/// Summary of one execution unit's tests; the value the scheduler caches
/// and merges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestSuite {
    pub target: String,
    pub tests: Vec<TestResult>,
    pub duration: Duration,
    pub counts: TestCounts,
}

impl TestSuite {
    pub fn new(target: impl Into<String>, tests: Vec<TestResult>, duration: Duration) -> Self {
        let counts = TestCounts::tally(&tests);
        Self {
            target: target.into(),
            tests,
            duration,
            counts,
        }
    }

    pub fn from_package(target: impl Into<String>, pkg: &PackageResult) -> Self {
        Self::new(target, pkg.tests.clone(), pkg.duration)
    }

    pub fn success(&self) -> bool {
        self.counts.failed == 0
    }
}

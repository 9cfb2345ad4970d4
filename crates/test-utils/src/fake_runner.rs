use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentinel::errors::{Result, SentinelError};
use sentinel::exec::PackageRunner;
use sentinel::model::{ExecutionOptions, PackageFailure, TestStatus, TestSuite};
use tokio_util::sync::CancellationToken;

use crate::builders::suite;

#[derive(Debug, Default)]
struct Inner {
    delay: Duration,
    failing: HashSet<String>,
    failing_tests: HashSet<String>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    calls: Mutex<Vec<String>>,
}

/// A runner that never spawns processes.
///
/// Each call sleeps for `delay` (cancellably), records the target and
/// tracks how many calls overlap. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeRunner {
    inner: Arc<Inner>,
}

impl FakeRunner {
    pub fn new(delay: Duration) -> Self {
        Self::build(delay, &[], &[])
    }

    /// `failing` units return a package error; `failing_tests` units return
    /// a suite with one failed test.
    pub fn build(delay: Duration, failing: &[&str], failing_tests: &[&str]) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay,
                failing: failing.iter().map(|s| s.to_string()).collect(),
                failing_tests: failing_tests.iter().map(|s| s.to_string()).collect(),
                ..Inner::default()
            }),
        }
    }

    pub fn max_active(&self) -> usize {
        self.inner.max_active.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.calls.lock().unwrap().clone()
    }
}

impl PackageRunner for FakeRunner {
    fn run_target<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        target: &'a str,
        _options: &'a ExecutionOptions,
    ) -> Pin<Box<dyn Future<Output = Result<TestSuite>> + Send + 'a>> {
        Box::pin(async move {
            let inner = &self.inner;
            inner.calls.lock().unwrap().push(target.to_string());

            let now = inner.active.fetch_add(1, Ordering::SeqCst) + 1;
            inner.max_active.fetch_max(now, Ordering::SeqCst);

            let cancelled = tokio::select! {
                _ = tokio::time::sleep(inner.delay) => false,
                _ = cancel.cancelled() => true,
            };
            inner.active.fetch_sub(1, Ordering::SeqCst);

            if cancelled {
                return Err(SentinelError::Cancelled);
            }
            if inner.failing.contains(target) {
                return Err(SentinelError::PackageFailed {
                    package: target.to_string(),
                    failure: PackageFailure {
                        exit_code: Some(2),
                        message: "build failed".to_string(),
                    },
                });
            }

            let status = if inner.failing_tests.contains(target) {
                TestStatus::Fail
            } else {
                TestStatus::Pass
            };
            Ok(suite(target, &[status]))
        })
    }
}

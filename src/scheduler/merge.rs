// src/scheduler/merge.rs

use serde::Serialize;

use crate::model::{TestCounts, TestSuite};

use super::parallel::ParallelTestResult;

/// Receives the suites of successful units.
pub trait SuiteSink {
    fn add_suite(&mut self, suite: &TestSuite);
}

/// Discards everything; used when nothing consumes the report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl SuiteSink for NullSink {
    fn add_suite(&mut self, _suite: &TestSuite) {}
}

/// Aggregate of every merged suite.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedReport {
    /// Suites ordered by target.
    pub suites: Vec<TestSuite>,
    pub counts: TestCounts,
}

impl MergedReport {
    pub fn success(&self) -> bool {
        self.counts.failed == 0
    }
}

impl SuiteSink for MergedReport {
    fn add_suite(&mut self, suite: &TestSuite) {
        self.counts.merge(suite.counts);
        self.suites.push(suite.clone());
    }
}

/// Fold successful results into `sink`, in target order so the outcome
/// does not depend on completion order. Errored and suite-less results are
/// dropped. Returns how many suites were merged.
pub fn merge_results(sink: &mut dyn SuiteSink, results: &[ParallelTestResult]) -> usize {
    let mut ok: Vec<(&str, &TestSuite)> = results
        .iter()
        .filter(|r| r.error.is_none())
        .filter_map(|r| r.suite.as_ref().map(|s| (r.target.as_str(), s)))
        .collect();
    ok.sort_by(|a, b| a.0.cmp(b.0));

    for (_, suite) in &ok {
        sink.add_suite(suite);
    }
    ok.len()
}

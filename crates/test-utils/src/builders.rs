#![allow(dead_code)]

use std::time::Duration;

use sentinel::model::{TestResult, TestStatus, TestSuite};
use sentinel::types::ChangeEvent;

pub fn targets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

pub fn test_result(name: &str, package: &str, status: TestStatus) -> TestResult {
    TestResult {
        name: name.to_string(),
        package: package.to_string(),
        status,
        duration: Duration::ZERO,
        output: String::new(),
        error: None,
    }
}

/// A suite with one test per status, named `Test0`, `Test1`, ...
pub fn suite(target: &str, statuses: &[TestStatus]) -> TestSuite {
    let tests = statuses
        .iter()
        .enumerate()
        .map(|(i, status)| test_result(&format!("Test{i}"), target, *status))
        .collect();
    TestSuite::new(target, tests, Duration::from_millis(1))
}

pub fn modified(paths: &[&str]) -> Vec<ChangeEvent> {
    paths.iter().map(|p| ChangeEvent::modified(*p)).collect()
}

/// Text-protocol output for the given `(name, status)` pairs.
pub fn text_output(tests: &[(&str, TestStatus)]) -> String {
    let mut out = String::new();
    for (name, status) in tests {
        let tag = match status {
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Skip => "SKIP",
            TestStatus::Running => continue,
        };
        out.push_str(&format!("=== RUN   {name}\n--- {tag}: {name} (0.01s)\n"));
    }
    out
}

// src/parse/text.rs

//! `--- PASS|FAIL|SKIP: <name> (<duration>)` line protocol.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::{TestResult, TestStatus};
use crate::parse::duration::parse_duration;

static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^--- (PASS|FAIL|SKIP): (\S+)(?:\s+\(([^)]*)\))?")
        .expect("result line pattern is valid")
});

/// Parse one output line. Returns `None` for anything that is not a result
/// line (banners, coverage summaries, log output).
///
/// Subtests (`TestA/case_1`) come back as ordinary results; nesting is not
/// reconstructed.
pub fn parse_result_line(line: &str, package: &str) -> Option<TestResult> {
    let trimmed = line.trim();
    let caps = RESULT_LINE.captures(trimmed)?;

    let status = match &caps[1] {
        "PASS" => TestStatus::Pass,
        "FAIL" => TestStatus::Fail,
        _ => TestStatus::Skip,
    };
    let duration = caps
        .get(3)
        .map(|m| parse_duration(m.as_str()))
        .unwrap_or_default();

    Some(TestResult {
        name: caps[2].to_string(),
        package: package.to_string(),
        status,
        duration,
        output: trimmed.to_string(),
        error: None,
    })
}

/// Text-line mode over a whole output blob.
pub fn parse_test_lines(output: &str, package: &str) -> Vec<TestResult> {
    output
        .lines()
        .filter_map(|line| parse_result_line(line, package))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn parses_status_name_and_duration() {
        let r = parse_result_line("--- FAIL: TestY (0.02s)", "pkg").unwrap();
        assert_eq!(r.status, TestStatus::Fail);
        assert_eq!(r.name, "TestY");
        assert_eq!(r.package, "pkg");
        assert_eq!(r.duration, Duration::from_millis(20));
        assert_eq!(r.output, "--- FAIL: TestY (0.02s)");
    }

    #[test]
    fn missing_duration_defaults_to_zero() {
        let r = parse_result_line("--- SKIP: TestZ", "pkg").unwrap();
        assert_eq!(r.status, TestStatus::Skip);
        assert_eq!(r.duration, Duration::ZERO);
    }

    #[test]
    fn malformed_duration_defaults_to_zero() {
        let r = parse_result_line("--- PASS: TestX (soon)", "pkg").unwrap();
        assert_eq!(r.duration, Duration::ZERO);
    }

    #[test]
    fn subtests_are_flattened() {
        let out = "--- FAIL: TestA (0.00s)\n    --- PASS: TestA/one (0.00s)\n    --- FAIL: TestA/two (0.00s)\n";
        let names: Vec<_> = parse_test_lines(out, "pkg")
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["TestA", "TestA/one", "TestA/two"]);
    }

    #[test]
    fn noise_is_ignored() {
        let out = "=== RUN   TestX\nok  \tpkg\t0.01s\ncoverage: 80.0% of statements\nPASS\n--- PASSED: nope\n";
        assert!(parse_test_lines(out, "pkg").is_empty());
    }
}

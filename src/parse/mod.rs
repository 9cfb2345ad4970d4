// src/parse/mod.rs

//! Turning raw test-tool output into [`TestResult`]s.
//!
//! Two formats are understood and may be interleaved in one stream:
//! - the human-readable `--- PASS|FAIL|SKIP` line protocol ([`text`])
//! - the line-delimited JSON event stream ([`json`])
//!
//! Every public function here is a pure function of its input. A JSON
//! event carrying a `Package` switches the package that later plain-text
//! result lines are attributed to.

pub mod duration;
pub mod json;
pub mod text;

use std::collections::HashMap;

use crate::model::{TestResult, TestStatus};

use self::duration::duration_from_secs;
use self::json::{EventAction, decode_event, looks_like_event};

pub use duration::{format_go_duration, parse_duration, parse_duration_strict};
pub use text::{parse_result_line, parse_test_lines};

/// Demultiplexed output of one package within a combined stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageOutput {
    pub package: String,
    /// Results in stream order.
    pub tests: Vec<TestResult>,
    /// Raw output lines attributed to this package.
    pub output: String,
    /// A package-level `fail` event was seen (build error, panic in init,
    /// timeout).
    pub package_failed: bool,
}

impl PackageOutput {
    fn new(package: &str) -> Self {
        Self {
            package: package.to_string(),
            ..Self::default()
        }
    }

    fn push_output(&mut self, text: &str) {
        if !self.output.is_empty() {
            self.output.push('\n');
        }
        self.output.push_str(text);
    }
}

/// Parse a single package's output into a flat, ordered list of results.
///
/// Results attributed by a JSON event keep that event's package; everything
/// else is attributed to `package`.
pub fn parse_output(output: &str, package: &str) -> Vec<TestResult> {
    let mut parser = StreamParser::new(package);
    let mut tests = Vec::new();

    for line in output.lines() {
        for item in parser.feed(line) {
            if let Parsed::Test(test) = item {
                tests.push(test);
            }
        }
    }

    tests
}

/// Split a combined multi-package stream by package.
///
/// The listed `packages` come first, in order. Packages that only appear in
/// the stream are appended in order of first appearance. When the stream
/// carries no package markers at all, everything lands in the first listed
/// package.
pub fn demultiplex(output: &str, packages: &[String]) -> Vec<PackageOutput> {
    let fallback = packages.first().map(String::as_str).unwrap_or_default();
    let mut parser = StreamParser::new(fallback);

    let mut outputs: Vec<PackageOutput> = packages.iter().map(|p| PackageOutput::new(p)).collect();
    let mut index: HashMap<String, usize> = packages
        .iter()
        .enumerate()
        .map(|(i, p)| (p.clone(), i))
        .collect();

    let mut slot = |package: &str, outputs: &mut Vec<PackageOutput>| -> usize {
        *index.entry(package.to_string()).or_insert_with(|| {
            outputs.push(PackageOutput::new(package));
            outputs.len() - 1
        })
    };

    for line in output.lines() {
        for item in parser.feed(line) {
            match item {
                Parsed::Test(test) => {
                    let i = slot(&test.package, &mut outputs);
                    outputs[i].tests.push(test);
                }
                Parsed::Output { package, text } => {
                    let i = slot(&package, &mut outputs);
                    outputs[i].push_output(&text);
                }
                Parsed::PackageFailed(package) => {
                    let i = slot(&package, &mut outputs);
                    outputs[i].package_failed = true;
                }
            }
        }
    }

    outputs
}

enum Parsed {
    Test(TestResult),
    Output { package: String, text: String },
    PackageFailed(String),
}

/// Line-at-a-time state: the current package context and the output
/// collected per running test (used as the error text of failures).
struct StreamParser {
    current: String,
    test_output: HashMap<(String, String), String>,
}

impl StreamParser {
    fn new(package: &str) -> Self {
        Self {
            current: package.to_string(),
            test_output: HashMap::new(),
        }
    }

    fn feed(&mut self, line: &str) -> Vec<Parsed> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        if looks_like_event(trimmed) {
            return self.feed_event(trimmed);
        }

        let mut items = Vec::with_capacity(2);
        if let Some(test) = parse_result_line(trimmed, &self.current) {
            items.push(Parsed::Test(test));
        }
        items.push(Parsed::Output {
            package: self.current.clone(),
            text: trimmed.to_string(),
        });
        items
    }

    fn feed_event(&mut self, line: &str) -> Vec<Parsed> {
        let Some(event) = decode_event(line) else {
            return Vec::new();
        };

        if !event.package.is_empty() {
            self.current = event.package.clone();
        }
        let package = self.current.clone();

        let status = match event.kind() {
            EventAction::Pass => TestStatus::Pass,
            EventAction::Fail => TestStatus::Fail,
            EventAction::Skip => TestStatus::Skip,
            EventAction::Output => {
                let Some(text) = event.output.as_deref() else {
                    return Vec::new();
                };
                let text = text.trim_end_matches(['\n', '\r']);
                if let Some(test) = event.test_name() {
                    let buf = self
                        .test_output
                        .entry((package.clone(), test.to_string()))
                        .or_default();
                    buf.push_str(text);
                    buf.push('\n');
                }
                return vec![Parsed::Output {
                    package,
                    text: text.to_string(),
                }];
            }
            EventAction::Other => return Vec::new(),
        };

        let Some(name) = event.test_name() else {
            return match status {
                TestStatus::Fail => vec![Parsed::PackageFailed(package)],
                _ => Vec::new(),
            };
        };

        let collected = self.test_output.remove(&(package.clone(), name.to_string()));
        let error = match status {
            TestStatus::Fail => collected
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            _ => None,
        };

        vec![Parsed::Test(TestResult {
            name: name.to_string(),
            package,
            status,
            duration: event.elapsed.map(duration_from_secs).unwrap_or_default(),
            output: line.to_string(),
            error,
        })]
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    const JSON_TWO_PACKAGES: &str = r#"{"Action":"run","Package":"m/a","Test":"TestA"}
{"Action":"output","Package":"m/a","Test":"TestA","Output":"=== RUN   TestA\n"}
{"Action":"output","Package":"m/a","Test":"TestA","Output":"--- PASS: TestA (0.10s)\n"}
{"Action":"pass","Package":"m/a","Test":"TestA","Elapsed":0.1}
{"Action":"run","Package":"m/b","Test":"TestB"}
{"Action":"output","Package":"m/b","Test":"TestB","Output":"    b_test.go:9: boom\n"}
{"Action":"fail","Package":"m/b","Test":"TestB","Elapsed":0.2}
{"Action":"fail","Package":"m/b","Elapsed":0.3}
"#;

    #[test]
    fn text_lines_keep_their_order() {
        let out = "--- PASS: TestX (0.01s)\n--- FAIL: TestY (0.02s)\n--- SKIP: TestZ (0.00s)";
        let tests = parse_output(out, "pkg");
        let statuses: Vec<_> = tests.iter().map(|t| t.status).collect();
        assert_eq!(
            statuses,
            vec![TestStatus::Pass, TestStatus::Fail, TestStatus::Skip]
        );
    }

    #[test]
    fn json_events_yield_one_result_per_terminal_action() {
        let tests = parse_output(JSON_TWO_PACKAGES, "fallback");
        assert_eq!(tests.len(), 2);
        assert_eq!(tests[0].name, "TestA");
        assert_eq!(tests[0].package, "m/a");
        assert_eq!(tests[0].duration, Duration::from_millis(100));
        assert_eq!(tests[1].status, TestStatus::Fail);
        assert_eq!(tests[1].error.as_deref(), Some("b_test.go:9: boom"));
    }

    #[test]
    fn malformed_json_line_does_not_lose_the_rest() {
        let out = "{\"Action\":\"pass\",\"Package\":\"m/a\",\"Test\":\"T1\"}\n{\"Action\":\"pa\n{\"Action\":\"pass\",\"Package\":\"m/a\",\"Test\":\"T2\"}\n";
        let names: Vec<_> = parse_output(out, "x").into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["T1", "T2"]);
    }

    #[test]
    fn package_marker_switches_text_line_attribution() {
        let out = "--- PASS: Early (0.00s)\n{\"Action\":\"start\",\"Package\":\"m/b\"}\n--- FAIL: Late (0.00s)\n";
        let tests = parse_output(out, "m/a");
        assert_eq!(tests[0].package, "m/a");
        assert_eq!(tests[1].package, "m/b");
    }

    #[test]
    fn demultiplex_splits_by_package_field() {
        let packages = vec!["m/a".to_string(), "m/b".to_string()];
        let outputs = demultiplex(JSON_TWO_PACKAGES, &packages);
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].tests.len(), 1);
        assert!(!outputs[0].package_failed);
        assert_eq!(outputs[1].tests.len(), 1);
        assert!(outputs[1].package_failed);
        assert!(outputs[1].output.contains("boom"));
    }

    #[test]
    fn demultiplex_without_markers_uses_first_package() {
        let packages = vec!["m/a".to_string(), "m/b".to_string()];
        let outputs = demultiplex("--- PASS: T1 (0.00s)\n--- PASS: T2 (0.00s)\n", &packages);
        assert_eq!(outputs[0].tests.len(), 2);
        assert!(outputs[1].tests.is_empty());
    }

    #[test]
    fn demultiplex_appends_unlisted_packages() {
        let packages = vec!["./a".to_string()];
        let outputs = demultiplex(JSON_TWO_PACKAGES, &packages);
        let names: Vec<_> = outputs.iter().map(|o| o.package.as_str()).collect();
        assert_eq!(names, vec!["./a", "m/a", "m/b"]);
    }
}

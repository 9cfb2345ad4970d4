// src/parse/json.rs

//! Decoding of `go test -json` events.

use serde::Deserialize;
use tracing::trace;

/// One line of the JSON event stream. Only the fields the parser needs.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TestEvent {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub package: String,
    #[serde(default)]
    pub test: Option<String>,
    #[serde(default)]
    pub elapsed: Option<f64>,
    #[serde(default)]
    pub output: Option<String>,
}

/// What an event means for the result tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Pass,
    Fail,
    Skip,
    Output,
    /// `run`, `pause`, `cont`, `start`, `bench` and anything newer.
    Other,
}

impl TestEvent {
    pub fn kind(&self) -> EventAction {
        match self.action.as_str() {
            "pass" => EventAction::Pass,
            "fail" => EventAction::Fail,
            "skip" => EventAction::Skip,
            "output" => EventAction::Output,
            _ => EventAction::Other,
        }
    }

    pub fn test_name(&self) -> Option<&str> {
        self.test.as_deref().filter(|t| !t.is_empty())
    }
}

/// Lines that look like JSON objects are routed here instead of the text
/// parser.
pub fn looks_like_event(line: &str) -> bool {
    line.trim_start().starts_with('{')
}

/// Decode a single line. Malformed JSON is logged at trace level and
/// dropped; one corrupt line must not cost the rest of the run.
pub fn decode_event(line: &str) -> Option<TestEvent> {
    match serde_json::from_str::<TestEvent>(line.trim()) {
        Ok(event) => Some(event),
        Err(err) => {
            trace!(error = %err, line, "skipping malformed test event");
            None
        }
    }
}

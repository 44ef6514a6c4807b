//! Test results and the aggregate suite.
//!
//! A [`TestSuite`] only stores its ordered result list; the pass/fail/skip
//! counts are always derived from it, so `total == passed + failed + skipped`
//! cannot be violated.

use miette::Diagnostic;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::error::CheckError;

/// Which check produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    /// Connection and liveness checks.
    Connection,
    /// Discovery and existence checks.
    Capability,
    /// Tool invocation.
    Tool,
    /// Resource read.
    Resource,
    /// Prompt fetch.
    Prompt,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Connection => "connection",
            Self::Capability => "capability",
            Self::Tool => "tool",
            Self::Resource => "resource",
            Self::Prompt => "prompt",
        };
        f.write_str(label)
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    /// The check held.
    Pass,
    /// The check did not hold.
    Fail,
    /// The check was not executed.
    Skip,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Skip => "skip",
        };
        f.write_str(label)
    }
}

/// One recorded check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// Display name, e.g. `Tool: add`.
    pub name: String,
    /// Which check produced the result.
    pub kind: ResultKind,
    /// Outcome.
    pub status: TestStatus,
    /// Explanation (failure reason, diff, skip reason).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Rendered error that caused a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Time spent on the check.
    #[serde(
        rename = "durationMs",
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_opt_millis"
    )]
    pub duration: Option<Duration>,
}

impl TestResult {
    fn new(name: impl Into<String>, kind: ResultKind, status: TestStatus) -> Self {
        Self {
            name: name.into(),
            kind,
            status,
            message: None,
            error: None,
            duration: None,
        }
    }

    /// A passing result.
    pub fn pass(name: impl Into<String>, kind: ResultKind) -> Self {
        Self::new(name, kind, TestStatus::Pass)
    }

    /// A failing result.
    pub fn fail(name: impl Into<String>, kind: ResultKind) -> Self {
        Self::new(name, kind, TestStatus::Fail)
    }

    /// A skipped result.
    pub fn skip(name: impl Into<String>, kind: ResultKind) -> Self {
        Self::new(name, kind, TestStatus::Skip)
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attach the error that caused the result.
    #[must_use]
    pub fn with_error(mut self, error: &CheckError) -> Self {
        self.error = Some(error.to_string());
        self
    }

    /// Attach a duration.
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    /// Whether the check passed.
    #[must_use]
    pub fn is_pass(&self) -> bool {
        self.status == TestStatus::Pass
    }

    /// Whether the check failed.
    #[must_use]
    pub fn is_fail(&self) -> bool {
        self.status == TestStatus::Fail
    }
}

/// The aggregate outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestSuite {
    name: String,
    results: Vec<TestResult>,
    duration: Duration,
}

impl TestSuite {
    /// Create an empty suite.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            results: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// Append a result.
    pub fn push(&mut self, result: TestResult) {
        self.results.push(result);
    }

    /// Set the total run duration.
    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Suite name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Results in the order they were recorded.
    #[must_use]
    pub fn results(&self) -> &[TestResult] {
        &self.results
    }

    /// Total run duration.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Number of results.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of passing results.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.count(TestStatus::Pass)
    }

    /// Number of failing results.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.count(TestStatus::Fail)
    }

    /// Number of skipped results.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(TestStatus::Skip)
    }

    /// Whether no result failed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    /// First result with the given name.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == name)
    }

    fn count(&self, status: TestStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

impl Serialize for TestSuite {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TestSuite", 7)?;
        state.serialize_field("name", &self.name)?;
        state.serialize_field("total", &self.total())?;
        state.serialize_field("passed", &self.passed())?;
        state.serialize_field("failed", &self.failed())?;
        state.serialize_field("skipped", &self.skipped())?;
        state.serialize_field("durationMs", &millis(self.duration))?;
        state.serialize_field("results", &self.results)?;
        state.end()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[allow(clippy::ref_option)]
fn serialize_opt_millis<S: Serializer>(
    duration: &Option<Duration>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match duration {
        Some(duration) => serializer.serialize_u64(millis(*duration)),
        None => serializer.serialize_none(),
    }
}

/// A run that was aborted by a fatal connection error.
///
/// The partial suite, including the failed connection result, travels with
/// the error.
#[derive(Error, Diagnostic, Debug)]
#[error("Run aborted: {error}")]
#[diagnostic(code(mcpcheck::run::aborted))]
pub struct RunError {
    /// The fatal error.
    #[source]
    pub error: CheckError,
    /// Results recorded before the run was aborted.
    pub suite: TestSuite,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_counts_are_derived() {
        let mut suite = TestSuite::new("demo");
        suite.push(TestResult::pass("Connect", ResultKind::Connection));
        suite.push(TestResult::fail("Tool: add", ResultKind::Tool));
        suite.push(TestResult::skip("Tool: sub", ResultKind::Tool));
        suite.push(TestResult::pass("Tool: mul", ResultKind::Tool));

        assert_eq!(suite.total(), 4);
        assert_eq!(suite.passed(), 2);
        assert_eq!(suite.failed(), 1);
        assert_eq!(suite.skipped(), 1);
        assert_eq!(suite.total(), suite.passed() + suite.failed() + suite.skipped());
        assert!(!suite.is_success());
    }

    #[test]
    fn test_suite_serializes_summary() {
        let mut suite = TestSuite::new("demo");
        suite.push(
            TestResult::fail("Tool: add", ResultKind::Tool)
                .with_message("Expectation failed")
                .with_duration(Duration::from_millis(12)),
        );
        suite.set_duration(Duration::from_millis(40));

        let value = serde_json::to_value(&suite).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "demo",
                "total": 1,
                "passed": 0,
                "failed": 1,
                "skipped": 0,
                "durationMs": 40,
                "results": [{
                    "name": "Tool: add",
                    "kind": "tool",
                    "status": "fail",
                    "message": "Expectation failed",
                    "durationMs": 12
                }]
            })
        );
    }

    #[test]
    fn test_result_records_error_text() {
        let result = TestResult::fail("Connect", ResultKind::Connection)
            .with_error(&CheckError::connection("refused"));
        assert_eq!(result.error.as_deref(), Some("Connection failed: refused"));
    }
}

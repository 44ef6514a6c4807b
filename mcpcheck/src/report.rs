//! Console and JSON summaries of a finished run.

use mcpcheck_core::error::Result;
use mcpcheck_core::result::{TestResult, TestStatus, TestSuite};
use std::time::Duration;

/// Exit code when every test passed or was skipped.
pub const EXIT_SUCCESS: u8 = 0;

/// Exit code when at least one test failed.
pub const EXIT_FAILURES: u8 = 1;

/// Exit code for a fatal run error or an unusable configuration.
pub const EXIT_FATAL: u8 = 2;

/// Process exit code for a completed run.
#[must_use]
pub fn exit_code(suite: &TestSuite) -> u8 {
    if suite.is_success() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURES
    }
}

/// The suite as pretty-printed JSON.
pub fn render_json(suite: &TestSuite) -> Result<String> {
    Ok(serde_json::to_string_pretty(suite)?)
}

/// One line per result, messages indented beneath, then the totals.
#[must_use]
pub fn render_console(suite: &TestSuite) -> String {
    let mut out = format!("{}\n\n", suite.name());

    for result in suite.results() {
        out.push_str(&render_result(result));
    }

    out.push('\n');
    out.push_str(&format!(
        "{} {}: {} passed, {} failed, {} skipped ({})\n",
        suite.total(),
        if suite.total() == 1 { "test" } else { "tests" },
        suite.passed(),
        suite.failed(),
        suite.skipped(),
        millis(suite.duration()),
    ));
    out
}

fn render_result(result: &TestResult) -> String {
    let marker = match result.status {
        TestStatus::Pass => "PASS",
        TestStatus::Fail => "FAIL",
        TestStatus::Skip => "SKIP",
    };

    let mut line = format!("  {marker}  {}", result.name);
    if let Some(duration) = result.duration {
        line.push_str(&format!(" ({})", millis(duration)));
    }
    line.push('\n');

    if let Some(message) = &result.message {
        for text in message.lines() {
            line.push_str(&format!("        {text}\n"));
        }
    }
    line
}

fn millis(duration: Duration) -> String {
    format!("{} ms", duration.as_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpcheck_core::result::ResultKind;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    fn sample() -> TestSuite {
        let mut suite = TestSuite::new("calculator");
        suite.push(TestResult::pass("Connect to server", ResultKind::Connection));
        suite.push(
            TestResult::fail("Tool: add", ResultKind::Tool)
                .with_message("Snapshot 'tool-add' does not match:\n- a: 1\n+ a: 2"),
        );
        suite.push(
            TestResult::skip("Tool: slow", ResultKind::Tool)
                .with_message("Skipped: matches skip pattern"),
        );
        suite
    }

    #[test]
    fn test_console_summary() {
        let text = render_console(&sample());
        let expected = "calculator\n\
                        \n  PASS  Connect to server\
                        \n  FAIL  Tool: add\
                        \n        Snapshot 'tool-add' does not match:\
                        \n        - a: 1\
                        \n        + a: 2\
                        \n  SKIP  Tool: slow\
                        \n        Skipped: matches skip pattern\
                        \n\
                        \n3 tests: 1 passed, 1 failed, 1 skipped (0 ms)\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_json_summary() {
        let json: Value = serde_json::from_str(&render_json(&sample()).unwrap()).unwrap();
        assert_eq!(json["name"], "calculator");
        assert_eq!(json["total"], 3);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["results"][1]["status"], "fail");
        assert_eq!(json["results"][1]["kind"], "tool");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&sample()), EXIT_FAILURES);
        assert_eq!(exit_code(&TestSuite::new("empty")), EXIT_SUCCESS);
    }
}

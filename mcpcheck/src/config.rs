//! Suite file loading.
//!
//! A suite file is the JSON form of [`SuiteDeclaration`]. Loading validates
//! it and anchors a relative `snapshotDir` at the file's directory, so a
//! suite behaves the same wherever `mcpcheck` is started from.

use mcpcheck_client::StdioClient;
use mcpcheck_core::declaration::{ServerCommand, SuiteDeclaration};
use mcpcheck_core::error::{CheckError, Result};
use mcpcheck_runner::snapshot::DEFAULT_SNAPSHOT_DIR;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Suite file used when none is given on the command line.
pub const DEFAULT_SUITE_FILE: &str = "mcpcheck.json";

/// Read, parse and validate the suite at `path`.
///
/// The returned declaration always has a server command and a
/// `snapshot_dir`.
pub fn load_suite(path: impl AsRef<Path>) -> Result<SuiteDeclaration> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| CheckError::config(format!("cannot read {}: {e}", path.display())))?;
    parse_suite(&text, base_dir(path))
}

/// Parse suite JSON whose relative paths are relative to `base`.
pub fn parse_suite(text: &str, base: &Path) -> Result<SuiteDeclaration> {
    let mut declaration: SuiteDeclaration = serde_json::from_str(text)
        .map_err(|e| CheckError::config(format!("invalid suite file: {e}")))?;

    declaration.validate()?;
    if declaration.server.is_none() {
        return Err(CheckError::config("suite has no \"server\" to start"));
    }

    let snapshot_dir = declaration
        .snapshot_dir
        .take()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR));
    declaration.snapshot_dir = Some(anchor(base, snapshot_dir));

    debug!(
        suite = declaration.name.as_deref().unwrap_or("<unnamed>"),
        tests = declaration.test_count(),
        "Loaded suite"
    );
    Ok(declaration)
}

/// Build the stdio client for the declaration's server.
pub fn client_for(declaration: &SuiteDeclaration) -> Result<StdioClient> {
    let server = declaration
        .server
        .as_ref()
        .ok_or_else(|| CheckError::config("suite has no \"server\" to start"))?;
    Ok(stdio_client(server))
}

fn stdio_client(server: &ServerCommand) -> StdioClient {
    let mut builder = StdioClient::builder(&server.command)
        .args(&server.args)
        .envs(&server.env);
    if let Some(cwd) = &server.cwd {
        builder = builder.working_dir(cwd);
    }
    builder.build()
}

/// The snapshot directory a suite file uses, without loading its tests.
pub fn snapshot_dir_of(path: impl AsRef<Path>) -> Result<PathBuf> {
    let declaration = load_suite(path)?;
    declaration
        .snapshot_dir
        .ok_or_else(|| CheckError::config("suite has no snapshot directory"))
}

fn base_dir(path: &Path) -> &Path {
    path.parent().unwrap_or_else(|| Path::new(""))
}

fn anchor(base: &Path, dir: PathBuf) -> PathBuf {
    if dir.is_absolute() {
        dir
    } else {
        base.join(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcpcheck_core::declaration::{Expectation, SnapshotDirective};
    use pretty_assertions::assert_eq;

    const SUITE: &str = r#"{
        "name": "calculator",
        "server": { "command": "node", "args": ["calc.js"], "env": { "DEBUG": "1" } },
        "tools": [
            { "name": "add", "args": { "a": 3, "b": 5 }, "expect": "content[0].text === '8'" },
            { "name": "divide", "args": { "a": 1, "b": 0 }, "shouldThrow": true, "snapshot": "div" }
        ],
        "resources": [{ "uri": "file:///logs/*", "expect": "count > 0" }],
        "timeout": 5000
    }"#;

    #[test]
    fn test_parse_suite() {
        let declaration = parse_suite(SUITE, Path::new("/suites")).unwrap();

        assert_eq!(declaration.name.as_deref(), Some("calculator"));
        assert_eq!(declaration.tools.len(), 2);
        assert_eq!(
            declaration.tools[0].assertions.expect.as_ref().and_then(Expectation::as_expression),
            Some("content[0].text === '8'")
        );
        assert!(declaration.tools[1].assertions.should_throw);
        assert_eq!(
            declaration.tools[1].assertions.snapshot,
            Some(SnapshotDirective::Named("div".to_string()))
        );
        assert_eq!(declaration.connect_timeout().as_millis(), 5000);
        assert_eq!(
            declaration.snapshot_dir,
            Some(PathBuf::from("/suites/__snapshots__"))
        );
    }

    #[test]
    fn test_relative_snapshot_dir_is_anchored() {
        let text = r#"{ "server": { "command": "srv" }, "snapshotDir": "snaps" }"#;
        let declaration = parse_suite(text, Path::new("/work/suite")).unwrap();
        assert_eq!(declaration.snapshot_dir, Some(PathBuf::from("/work/suite/snaps")));
    }

    #[test]
    fn test_absolute_snapshot_dir_is_kept() {
        let text = r#"{ "server": { "command": "srv" }, "snapshotDir": "/var/snaps" }"#;
        let declaration = parse_suite(text, Path::new("/work")).unwrap();
        assert_eq!(declaration.snapshot_dir, Some(PathBuf::from("/var/snaps")));
    }

    #[test]
    fn test_missing_server_is_rejected() {
        let err = parse_suite(r#"{ "tools": [] }"#, Path::new("")).unwrap_err();
        assert!(matches!(err, CheckError::Config { .. }));
    }

    #[test]
    fn test_empty_tool_name_is_rejected() {
        let text = r#"{ "server": { "command": "srv" }, "tools": [{ "name": " " }] }"#;
        let err = parse_suite(text, Path::new("")).unwrap_err();
        assert!(err.to_string().contains("tools[0]"));
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        let err = parse_suite("{ not json", Path::new("")).unwrap_err();
        assert!(matches!(err, CheckError::Config { .. }));
    }

    #[test]
    fn test_client_for_uses_server_command() {
        let declaration = parse_suite(SUITE, Path::new("")).unwrap();
        let client = client_for(&declaration).unwrap();
        assert_eq!(client.command_line(), "node calc.js");
    }
}

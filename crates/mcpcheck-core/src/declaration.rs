//! Test declarations: which capabilities to exercise and how to judge them.
//!
//! Declarations are plain serde types with camelCase field names, so a whole
//! suite can be read from a JSON file:
//!
//! ```rust
//! use mcpcheck_core::declaration::SuiteDeclaration;
//!
//! let suite: SuiteDeclaration = serde_json::from_str(r#"{
//!     "tools": [
//!         { "name": "add", "args": { "a": 3, "b": 5 }, "expect": "content[0].text === '8'" },
//!         { "name": "divide", "args": { "a": 1, "b": 0 }, "shouldThrow": true }
//!     ],
//!     "resources": [
//!         { "uri": "file:///logs/*", "expect": "count >= 1" }
//!     ],
//!     "skip": "divide"
//! }"#).unwrap();
//!
//! assert_eq!(suite.tools.len(), 2);
//! ```
//!
//! Programmatic callers can use the builders and may pass a predicate instead
//! of an expression string:
//!
//! ```rust
//! use mcpcheck_core::declaration::{SuiteDeclaration, ToolTest};
//!
//! let suite = SuiteDeclaration::new()
//!     .tool(ToolTest::new("echo")
//!         .arg("message", "hi")
//!         .expect_with(|value| value["content"][0]["text"] == "hi"));
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{CheckError, Result};
use crate::glob::Glob;

/// Default connection timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Caller-supplied boolean judgment over a raw invocation result.
pub type PredicateFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// How an invocation result is judged when no snapshot is requested.
#[derive(Clone)]
pub enum Expectation {
    /// A small path/comparison expression, e.g. `content[0].text === '8'`.
    Expression(String),
    /// An opaque predicate, invoked with the raw result.
    Predicate(PredicateFn),
}

impl Expectation {
    /// Create an expression expectation.
    pub fn expression(expression: impl Into<String>) -> Self {
        Self::Expression(expression.into())
    }

    /// Create a predicate expectation.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// The expression text, if this is an expression.
    #[must_use]
    pub fn as_expression(&self) -> Option<&str> {
        match self {
            Self::Expression(expression) => Some(expression),
            Self::Predicate(_) => None,
        }
    }
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expression) => f.debug_tuple("Expression").field(expression).finish(),
            Self::Predicate(_) => f.debug_tuple("Predicate").field(&"<fn>").finish(),
        }
    }
}

impl From<&str> for Expectation {
    fn from(expression: &str) -> Self {
        Self::Expression(expression.to_string())
    }
}

impl From<String> for Expectation {
    fn from(expression: String) -> Self {
        Self::Expression(expression)
    }
}

impl Serialize for Expectation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Expression(expression) => serializer.serialize_str(expression),
            Self::Predicate(_) => serializer.serialize_str("<predicate>"),
        }
    }
}

impl<'de> Deserialize<'de> for Expectation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Expression)
    }
}

/// Which value a resource pattern's expectation is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceEvaluation {
    /// The content of the first matching resource.
    Content,
    /// The number of matching resources, exposed as `{ "count": n }`.
    Count,
}

/// Snapshot request as written in a declaration.
///
/// Accepts `true`/`false`, a snapshot name, or a detailed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SnapshotDirective {
    /// `true` snapshots under a derived name; `false` disables snapshotting.
    Enabled(bool),
    /// Snapshot under an explicit name.
    Named(String),
    /// Snapshot with name and projection options.
    Detailed(SnapshotOptions),
}

/// Detailed snapshot options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotOptions {
    /// Snapshot name; derived from the capability when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Allow-list of property paths to keep.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    /// Property paths to delete after the allow-list is applied.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// Property selection applied before a value is stored or compared.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotProjection {
    /// Allow-list of property paths (empty keeps everything).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<String>,
    /// Property paths to delete.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl SnapshotProjection {
    /// Whether the projection keeps the value unchanged.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        self.properties.is_empty() && self.exclude.is_empty()
    }
}

/// A snapshot directive resolved against its test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSnapshot {
    /// Snapshot name.
    pub name: String,
    /// Projection to apply.
    pub projection: SnapshotProjection,
}

impl SnapshotDirective {
    /// Resolve to a concrete name and projection.
    ///
    /// Returns `None` for `false`.
    #[must_use]
    pub fn resolve(&self, default_name: &str) -> Option<ResolvedSnapshot> {
        match self {
            Self::Enabled(false) => None,
            Self::Enabled(true) => Some(ResolvedSnapshot {
                name: default_name.to_string(),
                projection: SnapshotProjection::default(),
            }),
            Self::Named(name) => Some(ResolvedSnapshot {
                name: name.clone(),
                projection: SnapshotProjection::default(),
            }),
            Self::Detailed(options) => Some(ResolvedSnapshot {
                name: options
                    .name
                    .clone()
                    .unwrap_or_else(|| default_name.to_string()),
                projection: SnapshotProjection {
                    properties: options.properties.clone(),
                    exclude: options.exclude.clone(),
                },
            }),
        }
    }
}

/// Judgment settings shared by all declaration kinds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assertions {
    /// Expectation applied to the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expect: Option<Expectation>,
    /// The invocation is expected to fail.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub should_throw: bool,
    /// Compare against a stored snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotDirective>,
}

macro_rules! assertion_builders {
    () => {
        /// Judge the result with an expression.
        pub fn expect(mut self, expression: impl Into<String>) -> Self {
            self.assertions.expect = Some(Expectation::Expression(expression.into()));
            self
        }

        /// Judge the result with a predicate.
        pub fn expect_with<F>(mut self, f: F) -> Self
        where
            F: Fn(&Value) -> bool + Send + Sync + 'static,
        {
            self.assertions.expect = Some(Expectation::predicate(f));
            self
        }

        /// Expect the invocation to fail.
        pub fn should_throw(mut self) -> Self {
            self.assertions.should_throw = true;
            self
        }

        /// Compare against a snapshot.
        pub fn snapshot(mut self, directive: SnapshotDirective) -> Self {
            self.assertions.snapshot = Some(directive);
            self
        }
    };
}

/// A tool to call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolTest {
    /// Tool name (exact match).
    pub name: String,
    /// Call arguments.
    #[serde(default)]
    pub args: Map<String, Value>,
    /// How to judge the result.
    #[serde(flatten)]
    pub assertions: Assertions,
}

impl ToolTest {
    /// Declare a call to `name` with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
            assertions: Assertions::default(),
        }
    }

    /// Add one argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    assertion_builders!();
}

/// A resource URI pattern to read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceTest {
    /// URI or glob pattern (`*`, `?`, case-sensitive).
    pub uri: String,
    /// Explicit choice between content and match-count evaluation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluate: Option<ResourceEvaluation>,
    /// How to judge the result.
    #[serde(flatten)]
    pub assertions: Assertions,
}

impl ResourceTest {
    /// Declare a read of resources matching `uri`.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            evaluate: None,
            assertions: Assertions::default(),
        }
    }

    /// Set the evaluation target explicitly.
    pub fn evaluate(mut self, evaluation: ResourceEvaluation) -> Self {
        self.evaluate = Some(evaluation);
        self
    }

    /// What the expectation applies to.
    ///
    /// Without an explicit `evaluate`, an expression that mentions `count`
    /// targets the number of matches.
    #[must_use]
    pub fn evaluation(&self) -> ResourceEvaluation {
        if let Some(evaluation) = self.evaluate {
            return evaluation;
        }
        match self.assertions.expect.as_ref().and_then(Expectation::as_expression) {
            Some(expression) if expression.contains("count") => ResourceEvaluation::Count,
            _ => ResourceEvaluation::Content,
        }
    }

    assertion_builders!();
}

/// A prompt to fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptTest {
    /// Prompt name (exact match).
    pub name: String,
    /// Prompt arguments.
    #[serde(default)]
    pub args: Map<String, Value>,
    /// How to judge the result.
    #[serde(flatten)]
    pub assertions: Assertions,
}

impl PromptTest {
    /// Declare a fetch of prompt `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Map::new(),
            assertions: Assertions::default(),
        }
    }

    /// Add one argument.
    pub fn arg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.args.insert(key.into(), value.into());
        self
    }

    assertion_builders!();
}

/// How to launch the server under test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerCommand {
    /// Program to execute.
    pub command: String,
    /// Program arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
}

/// A complete test suite for one server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteDeclaration {
    /// Display name of the suite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Server launch command (used by the command-line runner).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerCommand>,
    /// Tool tests, in execution order.
    #[serde(default)]
    pub tools: Vec<ToolTest>,
    /// Resource tests, in execution order.
    #[serde(default)]
    pub resources: Vec<ResourceTest>,
    /// Prompt tests, in execution order.
    #[serde(default)]
    pub prompts: Vec<PromptTest>,
    /// Only run tests whose name matches (case-insensitive glob, unanchored).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Skip tests whose name matches (case-insensitive glob, unanchored); wins over `filter`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<String>,
    /// Connection timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Accepted for compatibility; every test is attempted exactly once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    /// Directory holding snapshot files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
}

impl SuiteDeclaration {
    /// Create an empty suite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the suite name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a tool test.
    pub fn tool(mut self, test: ToolTest) -> Self {
        self.tools.push(test);
        self
    }

    /// Add a resource test.
    pub fn resource(mut self, test: ResourceTest) -> Self {
        self.resources.push(test);
        self
    }

    /// Add a prompt test.
    pub fn prompt(mut self, test: PromptTest) -> Self {
        self.prompts.push(test);
        self
    }

    /// Set the filter pattern.
    pub fn filter(mut self, pattern: impl Into<String>) -> Self {
        self.filter = Some(pattern.into());
        self
    }

    /// Set the skip pattern.
    pub fn skip(mut self, pattern: impl Into<String>) -> Self {
        self.skip = Some(pattern.into());
        self
    }

    /// Set the connection timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// The connection timeout, defaulting to 30 seconds.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout.unwrap_or(DEFAULT_TIMEOUT_MS))
    }

    /// The compiled `filter`/`skip` selection.
    #[must_use]
    pub fn selection(&self) -> Selection {
        Selection {
            filter: self.filter.as_deref().map(Glob::name_filter),
            skip: self.skip.as_deref().map(Glob::name_filter),
        }
    }

    /// Number of declared tests.
    #[must_use]
    pub fn test_count(&self) -> usize {
        self.tools.len() + self.resources.len() + self.prompts.len()
    }

    /// Check that every declaration names something.
    pub fn validate(&self) -> Result<()> {
        if let Some(index) = self.tools.iter().position(|t| t.name.trim().is_empty()) {
            return Err(CheckError::config(format!("tools[{index}] has an empty name")));
        }
        if let Some(index) = self.resources.iter().position(|r| r.uri.trim().is_empty()) {
            return Err(CheckError::config(format!("resources[{index}] has an empty uri")));
        }
        if let Some(index) = self.prompts.iter().position(|p| p.name.trim().is_empty()) {
            return Err(CheckError::config(format!("prompts[{index}] has an empty name")));
        }
        if let Some(server) = &self.server {
            if server.command.trim().is_empty() {
                return Err(CheckError::config("server.command is empty"));
            }
        }
        Ok(())
    }
}

/// Why a declared test was not executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The name did not match the `filter` pattern.
    FilteredOut,
    /// The name matched the `skip` pattern.
    SkipPattern,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FilteredOut => write!(f, "does not match filter"),
            Self::SkipPattern => write!(f, "matches skip pattern"),
        }
    }
}

/// Compiled `filter`/`skip` patterns.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    filter: Option<Glob>,
    skip: Option<Glob>,
}

impl Selection {
    /// Decide whether a declared name runs. `None` means it runs.
    ///
    /// The skip pattern takes precedence over the filter.
    #[must_use]
    pub fn decide(&self, name: &str) -> Option<SkipReason> {
        if self.skip.as_ref().is_some_and(|glob| glob.matches(name)) {
            return Some(SkipReason::SkipPattern);
        }
        if self.filter.as_ref().is_some_and(|glob| !glob.matches(name)) {
            return Some(SkipReason::FilteredOut);
        }
        None
    }
}

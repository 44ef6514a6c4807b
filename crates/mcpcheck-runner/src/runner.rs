//! The orchestrator.
//!
//! One [`TestRunner::run`] drives one client through a fixed sequence of
//! phases, each recording [`TestResult`]s in order:
//!
//! 1. **connect**: open the connection (fatal on failure), then a
//!    non-fatal liveness probe
//! 2. **discover**: capture the capability catalog
//! 3. **verify**: apply `filter`/`skip`, then check every declared tool,
//!    resource pattern and prompt against the catalog
//! 4. **invoke**: call every selected capability and judge the result
//! 5. **teardown**: disconnect, always
//!
//! Only a connection failure escapes as an error ([`RunError`], carrying the
//! partial suite). Everything else becomes a failed or skipped result.
//!
//! # Example
//!
//! ```no_run
//! use mcpcheck_client::StdioClient;
//! use mcpcheck_core::declaration::{SuiteDeclaration, ToolTest};
//! use mcpcheck_runner::{RunOptions, TestRunner};
//!
//! # async fn example() -> Result<(), mcpcheck_core::RunError> {
//! let declaration = SuiteDeclaration::new()
//!     .tool(ToolTest::new("add").arg("a", 3).arg("b", 5).expect("content[0].text === '8'"));
//!
//! let mut client = StdioClient::builder("node").arg("calculator.js").build();
//! let runner = TestRunner::new(RunOptions::default().update_snapshots(false));
//! let suite = runner.run(&mut client, &declaration).await?;
//!
//! println!("{} passed, {} failed", suite.passed(), suite.failed());
//! # Ok(())
//! # }
//! ```

use mcpcheck_client::ProtocolClient;
use mcpcheck_core::catalog::CapabilityCatalog;
use mcpcheck_core::declaration::{
    Assertions, Expectation, PromptTest, ResourceEvaluation, ResourceTest, Selection,
    SuiteDeclaration, ToolTest,
};
use mcpcheck_core::error::Result;
use mcpcheck_core::result::{ResultKind, RunError, TestResult, TestSuite};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::discovery::discover;
use crate::evaluator::evaluate;
use crate::snapshot::{ComparisonOutcome, DEFAULT_SNAPSHOT_DIR, SnapshotStore, sanitize_name};

/// Name used when the declaration does not carry one.
pub const DEFAULT_SUITE_NAME: &str = "MCP Server Tests";

/// Longest rendering of an actual value quoted in a failure message.
const MAX_VALUE_PREVIEW: usize = 200;

/// Caller settings for a run. Values left unset fall back to the declaration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    connect_timeout: Option<Duration>,
    update_snapshots: bool,
    snapshot_dir: Option<PathBuf>,
}

impl RunOptions {
    /// Create default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the connection phase, overriding the declaration's `timeout`.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Accept missing or differing snapshots as the new baseline.
    #[must_use]
    pub const fn update_snapshots(mut self, update: bool) -> Self {
        self.update_snapshots = update;
        self
    }

    /// Store snapshots in `dir`, overriding the declaration's `snapshotDir`.
    #[must_use]
    pub fn snapshot_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }
}

/// Runs declared suites against protocol clients.
///
/// A runner holds only configuration, so one runner may drive several runs
/// concurrently against different clients.
#[derive(Debug, Clone, Default)]
pub struct TestRunner {
    options: RunOptions,
}

impl TestRunner {
    /// Create a runner.
    #[must_use]
    pub const fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Run `declaration` against `client`.
    ///
    /// # Errors
    ///
    /// Returns [`RunError`] when the connection cannot be established. The
    /// error carries the partial suite; the client has been disconnected.
    pub async fn run<C: ProtocolClient>(
        &self,
        client: &mut C,
        declaration: &SuiteDeclaration,
    ) -> std::result::Result<TestSuite, RunError> {
        let name = declaration
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_SUITE_NAME.to_string());
        let span = info_span!("run", suite = %name);

        let snapshot_dir = self
            .options
            .snapshot_dir
            .clone()
            .or_else(|| declaration.snapshot_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR));

        let run = Run {
            client,
            store: SnapshotStore::new(snapshot_dir),
            update: self.options.update_snapshots,
            suite: TestSuite::new(name),
        };

        let timeout = self
            .options
            .connect_timeout
            .unwrap_or_else(|| declaration.connect_timeout());

        run.execute(declaration, timeout).instrument(span).await
    }
}

/// A declared test, in declaration order.
#[derive(Debug, Clone, Copy)]
enum Declared<'a> {
    Tool(&'a ToolTest),
    Resource(&'a ResourceTest),
    Prompt(&'a PromptTest),
}

impl<'a> Declared<'a> {
    fn all(declaration: &'a SuiteDeclaration) -> Vec<Self> {
        declaration
            .tools
            .iter()
            .map(Self::Tool)
            .chain(declaration.resources.iter().map(Self::Resource))
            .chain(declaration.prompts.iter().map(Self::Prompt))
            .collect()
    }

    /// Name or URI pattern; also what `filter`/`skip` match against.
    fn key(self) -> &'a str {
        match self {
            Self::Tool(test) => &test.name,
            Self::Resource(test) => &test.uri,
            Self::Prompt(test) => &test.name,
        }
    }

    const fn kind(self) -> ResultKind {
        match self {
            Self::Tool(_) => ResultKind::Tool,
            Self::Resource(_) => ResultKind::Resource,
            Self::Prompt(_) => ResultKind::Prompt,
        }
    }

    const fn noun(self) -> &'static str {
        match self {
            Self::Tool(_) => "Tool",
            Self::Resource(_) => "Resource",
            Self::Prompt(_) => "Prompt",
        }
    }

    const fn assertions(self) -> &'a Assertions {
        match self {
            Self::Tool(test) => &test.assertions,
            Self::Resource(test) => &test.assertions,
            Self::Prompt(test) => &test.assertions,
        }
    }

    fn label(self) -> String {
        format!("{}: {}", self.noun(), self.key())
    }

    fn default_snapshot_name(self) -> String {
        sanitize_name(&format!("{}-{}", self.noun().to_lowercase(), self.key()))
    }
}

/// State of one run. Owned by exactly one `run` call.
struct Run<'c, C> {
    client: &'c mut C,
    store: SnapshotStore,
    update: bool,
    suite: TestSuite,
}

impl<C: ProtocolClient> Run<'_, C> {
    async fn execute(
        mut self,
        declaration: &SuiteDeclaration,
        timeout: Duration,
    ) -> std::result::Result<TestSuite, RunError> {
        let started = Instant::now();
        info!(tests = declaration.test_count(), "Starting run");

        if let Err(error) = self.connect(timeout).instrument(info_span!("connect")).await {
            self.teardown().await;
            self.suite.set_duration(started.elapsed());
            return Err(RunError {
                error,
                suite: self.suite,
            });
        }

        if let Some(catalog) = self.discover().instrument(info_span!("discover")).await {
            let selected = self
                .verify(declaration, &catalog)
                .instrument(info_span!("verify"))
                .await;
            self.invoke(&selected, &catalog)
                .instrument(info_span!("invoke"))
                .await;
        }

        self.teardown().await;
        self.suite.set_duration(started.elapsed());

        info!(
            total = self.suite.total(),
            passed = self.suite.passed(),
            failed = self.suite.failed(),
            skipped = self.suite.skipped(),
            "Run complete"
        );
        Ok(self.suite)
    }

    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        match self.client.connect(timeout).await {
            Ok(()) => {
                info!("Connected to server");
                self.suite.push(
                    TestResult::pass("Connect to server", ResultKind::Connection)
                        .with_duration(started.elapsed()),
                );
            }
            Err(error) => {
                warn!(error = %error, "Connection failed");
                self.suite.push(
                    TestResult::fail("Connect to server", ResultKind::Connection)
                        .with_message(error.to_string())
                        .with_error(&error)
                        .with_duration(started.elapsed()),
                );
                return Err(error);
            }
        }

        let started = Instant::now();
        let result = match self.client.ping().await {
            Ok(true) => TestResult::pass("Ping server", ResultKind::Connection),
            Ok(false) => TestResult::pass("Ping server", ResultKind::Connection)
                .with_message("Server does not support ping"),
            Err(error) => TestResult::fail("Ping server", ResultKind::Connection)
                .with_message(format!("Ping failed: {error}"))
                .with_error(&error),
        };
        self.suite.push(result.with_duration(started.elapsed()));
        Ok(())
    }

    async fn discover(&mut self) -> Option<CapabilityCatalog> {
        let started = Instant::now();
        match discover(&mut *self.client).await {
            Ok(catalog) => {
                let mut message = catalog.summary();
                if !catalog.unsupported.is_empty() {
                    let classes: Vec<String> =
                        catalog.unsupported.iter().map(ToString::to_string).collect();
                    message.push_str(&format!(" (not implemented: {})", classes.join(", ")));
                }
                info!(summary = %message, "Discovered capabilities");
                self.suite.push(
                    TestResult::pass("Discover capabilities", ResultKind::Capability)
                        .with_message(message)
                        .with_duration(started.elapsed()),
                );
                Some(catalog)
            }
            Err(error) => {
                warn!(error = %error, "Discovery failed");
                self.suite.push(
                    TestResult::fail("Discover capabilities", ResultKind::Capability)
                        .with_message(format!("Discovery failed: {error}"))
                        .with_error(&error)
                        .with_duration(started.elapsed()),
                );
                None
            }
        }
    }

    /// Record skips and existence checks; return the tests to invoke.
    async fn verify<'d>(
        &mut self,
        declaration: &'d SuiteDeclaration,
        catalog: &CapabilityCatalog,
    ) -> Vec<Declared<'d>> {
        let selection: Selection = declaration.selection();
        let mut selected = Vec::new();

        for test in Declared::all(declaration) {
            if let Some(reason) = selection.decide(test.key()) {
                debug!(test = %test.label(), %reason, "Skipping");
                self.suite.push(
                    TestResult::skip(test.label(), test.kind())
                        .with_message(format!("Skipped: {reason}")),
                );
                continue;
            }

            self.suite.push(check_exists(test, catalog));
            selected.push(test);
        }

        selected
    }

    async fn invoke(&mut self, selected: &[Declared<'_>], catalog: &CapabilityCatalog) {
        for &test in selected {
            let result = match test {
                Declared::Tool(tool) if !catalog.has_tool(&tool.name) => {
                    TestResult::skip(test.label(), test.kind())
                        .with_message("Not invoked: tool is not advertised")
                }
                Declared::Prompt(prompt) if !catalog.has_prompt(&prompt.name) => {
                    TestResult::skip(test.label(), test.kind())
                        .with_message("Not invoked: prompt is not advertised")
                }
                Declared::Tool(tool) => {
                    let started = Instant::now();
                    let outcome = self.client.call_tool(&tool.name, &tool.args).await;
                    self.judge(test, outcome).await.with_duration(started.elapsed())
                }
                Declared::Prompt(prompt) => {
                    let started = Instant::now();
                    let outcome = self.client.get_prompt(&prompt.name, &prompt.args).await;
                    self.judge(test, outcome).await.with_duration(started.elapsed())
                }
                Declared::Resource(resource) => self.invoke_resource(test, resource, catalog).await,
            };

            debug!(test = %result.name, status = %result.status, "Recorded result");
            self.suite.push(result);
        }
    }

    async fn invoke_resource(
        &mut self,
        test: Declared<'_>,
        resource: &ResourceTest,
        catalog: &CapabilityCatalog,
    ) -> TestResult {
        let matches = catalog.matching_resources(&resource.uri);

        match resource.evaluation() {
            ResourceEvaluation::Count => {
                let counted = json!({ "count": matches.len() });
                self.judge(test, Ok(counted)).await
            }
            ResourceEvaluation::Content => {
                let Some(first) = matches.first() else {
                    return TestResult::skip(test.label(), test.kind())
                        .with_message("Not read: no advertised resource matches");
                };
                let uri = first.uri.clone();
                let started = Instant::now();
                let outcome = self.client.read_resource(&uri).await;
                self.judge(test, outcome).await.with_duration(started.elapsed())
            }
        }
    }

    /// Turn an invocation outcome into a result.
    ///
    /// Precedence: `shouldThrow`, then snapshot, then expectation, then
    /// plain success.
    async fn judge(&self, test: Declared<'_>, outcome: Result<Value>) -> TestResult {
        let label = test.label();
        let kind = test.kind();
        let assertions = test.assertions();

        if assertions.should_throw {
            return match outcome {
                Ok(_) => TestResult::fail(label, kind)
                    .with_message("Expected an error, but the call succeeded"),
                Err(error) => TestResult::pass(label, kind)
                    .with_message(format!("Failed as expected: {error}")),
            };
        }

        let value = match outcome {
            Ok(value) => value,
            Err(error) => {
                return TestResult::fail(label, kind)
                    .with_message(format!("Invocation failed: {error}"))
                    .with_error(&error);
            }
        };

        let snapshot = assertions
            .snapshot
            .as_ref()
            .and_then(|directive| directive.resolve(&test.default_snapshot_name()));

        if let Some(snapshot) = snapshot {
            return match self
                .store
                .compare(&snapshot.name, &value, &snapshot.projection, self.update)
                .await
            {
                Ok(comparison) => match comparison.outcome {
                    ComparisonOutcome::Matched => TestResult::pass(label, kind),
                    ComparisonOutcome::Created => TestResult::pass(label, kind)
                        .with_message(format!("Snapshot '{}' created", snapshot.name)),
                    ComparisonOutcome::Updated => TestResult::pass(label, kind)
                        .with_message(format!("Snapshot '{}' updated", snapshot.name)),
                    ComparisonOutcome::Missing | ComparisonOutcome::Mismatched => {
                        TestResult::fail(label, kind).with_message(
                            comparison
                                .diff
                                .unwrap_or_else(|| "Snapshot mismatch".to_string()),
                        )
                    }
                },
                Err(error) => TestResult::fail(label, kind)
                    .with_message(format!("Snapshot comparison failed: {error}"))
                    .with_error(&error),
            };
        }

        if let Some(expectation) = &assertions.expect {
            if evaluate(&value, expectation) {
                return TestResult::pass(label, kind);
            }
            return TestResult::fail(label, kind).with_message(expectation_failure(expectation, &value));
        }

        TestResult::pass(label, kind)
    }

    async fn teardown(&mut self) {
        async {
            self.client.disconnect().await;
            debug!("Disconnected");
        }
        .instrument(info_span!("teardown"))
        .await;
    }
}

fn check_exists(test: Declared<'_>, catalog: &CapabilityCatalog) -> TestResult {
    let label = format!("{} exists: {}", test.noun(), test.key());

    let (found, available, plural) = match test {
        Declared::Tool(tool) => (catalog.has_tool(&tool.name), catalog.tool_names(), "tools"),
        Declared::Prompt(prompt) => {
            (catalog.has_prompt(&prompt.name), catalog.prompt_names(), "prompts")
        }
        Declared::Resource(resource) => {
            let matched = catalog.matching_resources(&resource.uri).len();
            if matched > 0 {
                let noun = if matched == 1 { "resource" } else { "resources" };
                return TestResult::pass(label, ResultKind::Capability)
                    .with_message(format!("Matched {matched} {noun}"));
            }
            (false, catalog.resource_uris(), "resources")
        }
    };

    if found {
        return TestResult::pass(label, ResultKind::Capability);
    }

    let listing = if available.is_empty() {
        "(none)".to_string()
    } else {
        available.join(", ")
    };
    let message = match test {
        Declared::Resource(resource) => {
            format!("No resource matches '{}'. Available {plural}: {listing}", resource.uri)
        }
        _ => format!(
            "{} '{}' not found. Available {plural}: {listing}",
            test.noun(),
            test.key()
        ),
    };
    TestResult::fail(label, ResultKind::Capability).with_message(message)
}

fn expectation_failure(expectation: &Expectation, value: &Value) -> String {
    let mut actual = value.to_string();
    if actual.chars().count() > MAX_VALUE_PREVIEW {
        actual = actual.chars().take(MAX_VALUE_PREVIEW).collect::<String>() + "...";
    }
    match expectation {
        Expectation::Expression(expression) => {
            format!("Expectation not met: {expression} (actual: {actual})")
        }
        Expectation::Predicate(_) => format!("Predicate returned false (actual: {actual})"),
    }
}

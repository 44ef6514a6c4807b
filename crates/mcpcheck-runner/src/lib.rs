//! The mcpcheck engine.
//!
//! This crate decides, for every declared test, whether it passed, failed or
//! was skipped, and why:
//!
//! - [`evaluator`]: judges a result against an expression or predicate
//! - [`snapshot`]: stores normalized, projected outputs and diffs new ones
//!   against them
//! - [`discovery`]: captures the capability catalog, tolerating servers that
//!   implement only part of the protocol
//! - [`runner`]: sequences connect, discover, verify, invoke and teardown for
//!   one suite and collects the results
//!
//! # Example
//!
//! ```no_run
//! use mcpcheck_client::StdioClient;
//! use mcpcheck_core::declaration::{ResourceTest, SuiteDeclaration, ToolTest};
//! use mcpcheck_runner::{RunOptions, TestRunner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let declaration = SuiteDeclaration::new()
//!         .tool(ToolTest::new("echo").arg("message", "hi").expect("content[0].text === 'hi'"))
//!         .resource(ResourceTest::new("file:///logs/*").expect("count >= 1"));
//!
//!     let mut client = StdioClient::builder("my-mcp-server").build();
//!     let runner = TestRunner::new(RunOptions::new().snapshot_dir("__snapshots__"));
//!     let suite = runner.run(&mut client, &declaration).await?;
//!
//!     for result in suite.results() {
//!         println!("[{}] {}", result.status, result.name);
//!     }
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![allow(clippy::module_name_repetitions)]

pub mod discovery;
pub mod evaluator;
pub mod runner;
pub mod snapshot;

pub use discovery::discover;
pub use evaluator::{evaluate, evaluate_expression};
pub use runner::{RunOptions, TestRunner};
pub use snapshot::{ComparisonOutcome, Snapshot, SnapshotComparison, SnapshotStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::discovery::discover;
    pub use crate::evaluator::{evaluate, evaluate_expression, Expression};
    pub use crate::runner::{RunOptions, TestRunner};
    pub use crate::snapshot::{
        deep_equal, diff, normalize, project, ComparisonOutcome, Snapshot, SnapshotComparison,
        SnapshotStore,
    };
}

//! # mcpcheck - declarative tests for MCP servers
//!
//! Describe what a Model Context Protocol server should offer and how it
//! should answer; mcpcheck connects to the server, discovers its
//! capabilities, invokes each declared tool, resource and prompt, and judges
//! every result with an expression, a predicate or a stored snapshot.
//!
//! ## Quick Start
//!
//! A suite file:
//!
//! ```json
//! {
//!   "name": "calculator",
//!   "server": { "command": "node", "args": ["calculator.js"] },
//!   "tools": [
//!     { "name": "add", "args": { "a": 3, "b": 5 }, "expect": "content[0].text === '8'" },
//!     { "name": "divide", "args": { "a": 1, "b": 0 }, "shouldThrow": true }
//!   ],
//!   "resources": [{ "uri": "file:///logs/*", "expect": "count >= 1" }]
//! }
//! ```
//!
//! Run it with `mcpcheck run calculator.json`, or from code:
//!
//! ```no_run
//! use mcpcheck::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let declaration = mcpcheck::config::load_suite("calculator.json")?;
//!     let mut client = mcpcheck::config::client_for(&declaration)?;
//!
//!     let suite = TestRunner::new(RunOptions::new())
//!         .run(&mut client, &declaration)
//!         .await?;
//!     print!("{}", mcpcheck::report::render_console(&suite));
//!     Ok(())
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`mcpcheck_core`] - Declarations, catalog, results and the error type
//! - [`mcpcheck_client`] - The protocol client boundary and the stdio client
//! - [`mcpcheck_runner`] - Orchestrator, expectation evaluator, snapshot store
//! - [`config`] - Suite file loading
//! - [`report`] - Console and JSON output

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod prelude;
pub mod report;

// Re-export all public items from core
pub use mcpcheck_core::*;

// Re-export client types
pub use mcpcheck_client::{ProtocolClient, StdioClient, StdioClientBuilder};

// Re-export engine types
pub use mcpcheck_runner::{
    ComparisonOutcome, RunOptions, Snapshot, SnapshotComparison, SnapshotStore, TestRunner,
    discover, evaluate, evaluate_expression,
};

// Re-export sub-crates for direct access
pub use mcpcheck_client as client;
pub use mcpcheck_runner as runner;

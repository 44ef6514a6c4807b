//! # mcpcheck-core
//!
//! Core types for mcpcheck, a test runner for Model Context Protocol servers.
//!
//! This crate provides the data model shared by the client and the runner:
//!
//! - **Declarations**: which tools, resources and prompts to exercise, and how
//!   to judge each result (expression, predicate, snapshot, `shouldThrow`)
//! - **Catalog**: the capabilities a server advertised at discovery time
//! - **Results**: per-check [`TestResult`]s and the aggregate [`TestSuite`]
//! - **Error handling**: the unified [`CheckError`] type with rich diagnostics
//! - **Paths and globs**: property-path traversal and `*`/`?` matching
//!
//! This crate is runtime-agnostic and does not depend on any async runtime.
//!
//! # Example
//!
//! ```rust
//! use mcpcheck_core::prelude::*;
//!
//! let suite = SuiteDeclaration::new()
//!     .name("calculator")
//!     .tool(ToolTest::new("add").arg("a", 3).arg("b", 5).expect("content[0].text === '8'"))
//!     .resource(ResourceTest::new("file:///logs/*").expect("count >= 1"))
//!     .skip("slow*");
//!
//! assert_eq!(suite.test_count(), 2);
//! assert!(suite.validate().is_ok());
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod declaration;
pub mod error;
pub mod glob;
pub mod path;
pub mod result;

pub use catalog::{CapabilityCatalog, CapabilityClass, PromptInfo, ResourceInfo, ToolInfo};
pub use declaration::{
    Expectation, PromptTest, ResourceEvaluation, ResourceTest, SnapshotDirective,
    SnapshotProjection, SuiteDeclaration, ToolTest,
};
pub use error::{CheckError, Result};
pub use result::{ResultKind, RunError, TestResult, TestStatus, TestSuite};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use mcpcheck_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::catalog::{
        CapabilityCatalog, CapabilityClass, PromptArgument, PromptInfo, ResourceInfo, ToolInfo,
    };
    pub use crate::declaration::{
        Assertions, Expectation, PromptTest, ResolvedSnapshot, ResourceEvaluation, ResourceTest,
        Selection, ServerCommand, SkipReason, SnapshotDirective, SnapshotOptions,
        SnapshotProjection, SuiteDeclaration, ToolTest,
    };
    pub use crate::error::{CheckError, Result};
    pub use crate::glob::{glob_match, Glob};
    pub use crate::result::{ResultKind, RunError, TestResult, TestStatus, TestSuite};
}

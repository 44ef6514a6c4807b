//! Prelude module for convenient imports.
//!
//! ```rust
//! use mcpcheck::prelude::*;
//!
//! let declaration = SuiteDeclaration::new()
//!     .tool(ToolTest::new("echo").arg("text", "hi").expect("content[0].text === 'hi'"));
//! assert_eq!(declaration.test_count(), 1);
//! ```

pub use mcpcheck_core::prelude::*;

pub use mcpcheck_client::{ProtocolClient, StdioClient, StdioClientBuilder};

pub use mcpcheck_runner::prelude::*;

pub use crate::config::{client_for, load_suite};
pub use crate::report::{render_console, render_json};

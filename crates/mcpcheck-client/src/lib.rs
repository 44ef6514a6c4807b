//! Protocol client for mcpcheck.
//!
//! This crate defines the boundary between the test runner and an MCP
//! server:
//!
//! - [`ProtocolClient`]: the operations the runner consumes (connect, list,
//!   call, read, get, ping, disconnect)
//! - [`StdioClient`]: an implementation that spawns the server as a
//!   subprocess and speaks newline-delimited JSON-RPC over its stdio
//!
//! # Example
//!
//! ```no_run
//! use mcpcheck_client::{ProtocolClient, StdioClient};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> mcpcheck_core::Result<()> {
//!     let mut client = StdioClient::builder("my-mcp-server").build();
//!     client.connect(Duration::from_secs(30)).await?;
//!
//!     for tool in client.list_tools().await? {
//!         println!("Tool: {}", tool.name);
//!     }
//!
//!     let args = serde_json::json!({ "a": 1, "b": 2 });
//!     let result = client.call_tool("add", args.as_object().unwrap()).await?;
//!     println!("{result}");
//!
//!     client.disconnect().await;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]

pub mod protocol;
pub mod stdio;
pub mod traits;

pub use stdio::{StdioClient, StdioClientBuilder};
pub use traits::ProtocolClient;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::stdio::{StdioClient, StdioClientBuilder};
    pub use crate::traits::ProtocolClient;
}

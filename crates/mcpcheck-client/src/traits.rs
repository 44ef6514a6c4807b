//! The protocol client boundary.
//!
//! The runner never talks to a server directly; it drives a
//! [`ProtocolClient`]. [`StdioClient`](crate::StdioClient) is the concrete
//! implementation for subprocess servers, and tests substitute scripted
//! in-memory clients.
//!
//! # Example Implementation
//!
//! ```ignore
//! struct Fixed;
//!
//! impl ProtocolClient for Fixed {
//!     async fn connect(&mut self, _timeout: Duration) -> Result<()> {
//!         Ok(())
//!     }
//!
//!     async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
//!         Ok(vec![ToolInfo::new("echo")])
//!     }
//!
//!     // ... other methods
//! }
//! ```

use mcpcheck_core::catalog::{PromptInfo, ResourceInfo, ToolInfo};
use mcpcheck_core::error::Result;
use serde_json::{Map, Value};
use std::future::Future;
use std::time::Duration;

/// Operations the runner needs from a connection to an MCP server.
///
/// Every method except [`disconnect`](Self::disconnect) may fail with a
/// categorized [`CheckError`](mcpcheck_core::CheckError). A server that does
/// not implement a method must be reported as
/// [`CheckError::MethodNotImplemented`](mcpcheck_core::CheckError::MethodNotImplemented).
pub trait ProtocolClient: Send {
    /// Open the connection and complete the protocol handshake within `timeout`.
    ///
    /// Fails with a connection-class error (`ConnectionFailed`, `Timeout`).
    fn connect(&mut self, timeout: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Close the connection. Never fails; calling it twice is harmless.
    fn disconnect(&mut self) -> impl Future<Output = ()> + Send;

    /// Liveness probe. `Ok(false)` means the server does not support `ping`.
    fn ping(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// List every advertised tool.
    fn list_tools(&mut self) -> impl Future<Output = Result<Vec<ToolInfo>>> + Send;

    /// List every advertised resource.
    fn list_resources(&mut self) -> impl Future<Output = Result<Vec<ResourceInfo>>> + Send;

    /// List every advertised prompt.
    fn list_prompts(&mut self) -> impl Future<Output = Result<Vec<PromptInfo>>> + Send;

    /// Call a tool and return its raw result.
    fn call_tool(
        &mut self,
        name: &str,
        args: &Map<String, Value>,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Read a resource and return its raw content.
    fn read_resource(&mut self, uri: &str) -> impl Future<Output = Result<Value>> + Send;

    /// Fetch a prompt and return its raw result.
    fn get_prompt(
        &mut self,
        name: &str,
        args: &Map<String, Value>,
    ) -> impl Future<Output = Result<Value>> + Send;
}

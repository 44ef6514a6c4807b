//! A scripted in-memory protocol client for orchestrator tests.

#![allow(dead_code)]

use mcpcheck_client::ProtocolClient;
use mcpcheck_core::catalog::{PromptInfo, ResourceInfo, ToolInfo};
use mcpcheck_core::error::{CheckError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Produces the result of a tool call or prompt fetch from its arguments.
pub type Handler = Arc<dyn Fn(&Map<String, Value>) -> Result<Value> + Send + Sync>;

/// How the mock answers `ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ping {
    Pong,
    Unsupported,
    Broken,
}

/// A protocol client whose server side is a set of closures.
///
/// A capability class left as `None` answers its listing with
/// `MethodNotImplemented`. Every call is appended to [`MockClient::calls`].
pub struct MockClient {
    tools: Option<Vec<ToolInfo>>,
    resources: Option<Vec<ResourceInfo>>,
    prompts: Option<Vec<PromptInfo>>,
    tool_handlers: HashMap<String, Handler>,
    prompt_handlers: HashMap<String, Handler>,
    contents: HashMap<String, Value>,
    refuse_connection: bool,
    broken_tool_listing: bool,
    ping: Ping,
    connected: bool,
    /// Calls received, in order, e.g. `"connect"`, `"tools/call add"`.
    pub calls: Vec<String>,
    /// Number of `disconnect` calls.
    pub disconnects: usize,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    /// A server implementing every capability class, with nothing advertised.
    pub fn new() -> Self {
        Self {
            tools: Some(Vec::new()),
            resources: Some(Vec::new()),
            prompts: Some(Vec::new()),
            tool_handlers: HashMap::new(),
            prompt_handlers: HashMap::new(),
            contents: HashMap::new(),
            refuse_connection: false,
            broken_tool_listing: false,
            ping: Ping::Pong,
            connected: false,
            calls: Vec::new(),
            disconnects: 0,
        }
    }

    /// Advertise a tool answered by `handler`.
    pub fn tool<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.tools.get_or_insert_with(Vec::new).push(ToolInfo::new(name));
        self.tool_handlers.insert(name.to_string(), Arc::new(handler));
        self
    }

    /// Advertise a tool that returns `value` whatever the arguments.
    pub fn tool_returning(self, name: &str, value: Value) -> Self {
        self.tool(name, move |_| Ok(value.clone()))
    }

    /// Advertise a resource whose content is `content`.
    pub fn resource(mut self, uri: &str, content: Value) -> Self {
        self.resources
            .get_or_insert_with(Vec::new)
            .push(ResourceInfo::new(uri, uri.rsplit('/').next().unwrap_or(uri)));
        self.contents.insert(uri.to_string(), content);
        self
    }

    /// Advertise a prompt answered by `handler`.
    pub fn prompt<F>(mut self, name: &str, handler: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value> + Send + Sync + 'static,
    {
        self.prompts.get_or_insert_with(Vec::new).push(PromptInfo::new(name));
        self.prompt_handlers.insert(name.to_string(), Arc::new(handler));
        self
    }

    /// Answer `resources/list` with "method not found".
    pub fn without_resources(mut self) -> Self {
        self.resources = None;
        self
    }

    /// Answer `prompts/list` with "method not found".
    pub fn without_prompts(mut self) -> Self {
        self.prompts = None;
        self
    }

    /// Fail every connection attempt.
    pub fn refusing_connections(mut self) -> Self {
        self.refuse_connection = true;
        self
    }

    /// Fail `tools/list` with a transport error.
    pub fn with_broken_tool_listing(mut self) -> Self {
        self.broken_tool_listing = true;
        self
    }

    /// Choose how `ping` is answered.
    pub fn with_ping(mut self, ping: Ping) -> Self {
        self.ping = ping;
        self
    }

    /// Whether a call starting with `prefix` was received.
    pub fn received(&self, prefix: &str) -> bool {
        self.calls.iter().any(|call| call.starts_with(prefix))
    }

    fn require_connection(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(CheckError::NotConnected)
        }
    }
}

impl ProtocolClient for MockClient {
    async fn connect(&mut self, _timeout: Duration) -> Result<()> {
        self.calls.push("connect".to_string());
        if self.refuse_connection {
            return Err(CheckError::connection("connection refused"));
        }
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.calls.push("disconnect".to_string());
        self.disconnects += 1;
        self.connected = false;
    }

    async fn ping(&mut self) -> Result<bool> {
        self.require_connection()?;
        self.calls.push("ping".to_string());
        match self.ping {
            Ping::Pong => Ok(true),
            Ping::Unsupported => Ok(false),
            Ping::Broken => Err(CheckError::transport("ping lost")),
        }
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        self.require_connection()?;
        self.calls.push("tools/list".to_string());
        if self.broken_tool_listing {
            return Err(CheckError::transport("pipe closed"));
        }
        self.tools
            .clone()
            .ok_or_else(|| CheckError::not_implemented("tools/list"))
    }

    async fn list_resources(&mut self) -> Result<Vec<ResourceInfo>> {
        self.require_connection()?;
        self.calls.push("resources/list".to_string());
        self.resources
            .clone()
            .ok_or_else(|| CheckError::not_implemented("resources/list"))
    }

    async fn list_prompts(&mut self) -> Result<Vec<PromptInfo>> {
        self.require_connection()?;
        self.calls.push("prompts/list".to_string());
        self.prompts
            .clone()
            .ok_or_else(|| CheckError::not_implemented("prompts/list"))
    }

    async fn call_tool(&mut self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        self.require_connection()?;
        self.calls.push(format!("tools/call {name}"));
        match self.tool_handlers.get(name) {
            Some(handler) => handler(args),
            None => Err(CheckError::rpc("tools/call", -32602, format!("Unknown tool: {name}"))),
        }
    }

    async fn read_resource(&mut self, uri: &str) -> Result<Value> {
        self.require_connection()?;
        self.calls.push(format!("resources/read {uri}"));
        self.contents
            .get(uri)
            .cloned()
            .ok_or_else(|| CheckError::rpc("resources/read", -32002, "Resource not found"))
    }

    async fn get_prompt(&mut self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        self.require_connection()?;
        self.calls.push(format!("prompts/get {name}"));
        match self.prompt_handlers.get(name) {
            Some(handler) => handler(args),
            None => Err(CheckError::rpc("prompts/get", -32602, format!("Unknown prompt: {name}"))),
        }
    }
}

//! A [`ProtocolClient`] for servers launched as subprocesses.
//!
//! The server is spawned with piped stdin/stdout and inherited stderr, and
//! exchanges newline-delimited JSON-RPC 2.0 messages with us.
//!
//! # Example
//!
//! ```no_run
//! use mcpcheck_client::{ProtocolClient, StdioClient};
//! use std::time::Duration;
//!
//! # async fn example() -> mcpcheck_core::Result<()> {
//! let mut client = StdioClient::builder("npx")
//!     .arg("-y")
//!     .arg("@modelcontextprotocol/server-everything")
//!     .env("LOG_LEVEL", "debug")
//!     .request_timeout(Duration::from_secs(10))
//!     .build();
//!
//! client.connect(Duration::from_secs(30)).await?;
//! let tools = client.list_tools().await?;
//! client.disconnect().await;
//! # Ok(())
//! # }
//! ```

use mcpcheck_core::catalog::{PromptInfo, ResourceInfo, ToolInfo};
use mcpcheck_core::error::{CheckError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use crate::protocol::{
    JsonRpcError, Message, Notification, PROTOCOL_VERSION, Request, RequestId, Response,
};
use crate::traits::ProtocolClient;

/// Maximum allowed message size (16 MB).
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default bound on a single request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// How long `disconnect` waits for the server to exit after closing stdin.
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// A client connected to a spawned MCP server over stdio.
///
/// Dropping the client kills the child process if it is still running.
#[derive(Debug)]
pub struct StdioClient {
    config: StdioClientBuilder,
    session: Option<Session>,
    next_id: u64,
    server_info: Option<Value>,
}

#[derive(Debug)]
struct Session {
    child: Child,
    stdin: Option<ChildStdin>,
    stdout: BufReader<ChildStdout>,
}

impl StdioClient {
    /// Create a builder for the given program.
    #[must_use]
    pub fn builder<S: AsRef<OsStr>>(program: S) -> StdioClientBuilder {
        StdioClientBuilder::new(program)
    }

    /// The command line this client launches.
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.config.program.display().to_string();
        for arg in &self.config.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// The `serverInfo` reported during the handshake.
    #[must_use]
    pub const fn server_info(&self) -> Option<&Value> {
        self.server_info.as_ref()
    }

    /// Whether a server process is attached.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    fn spawn(&self) -> Result<Session> {
        let mut command = Command::new(&self.config.program);

        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        for (key, value) in &self.config.envs {
            command.env(key, value);
        }

        if let Some(dir) = &self.config.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            CheckError::connection_with_source(
                format!("failed to spawn '{}'", self.config.program.display()),
                e,
            )
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| CheckError::connection("failed to capture child stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CheckError::connection("failed to capture child stdout"))?;

        debug!(pid = ?child.id(), command = %self.command_line(), "Spawned MCP server");

        Ok(Session {
            child,
            stdin: Some(stdin),
            stdout: BufReader::new(stdout),
        })
    }

    async fn handshake(&mut self) -> Result<()> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "mcpcheck",
                "version": env!("CARGO_PKG_VERSION"),
            },
        });

        let result = self.exchange("initialize", Some(params)).await?;

        debug!(
            server = %result["serverInfo"]["name"],
            protocol_version = %result["protocolVersion"],
            "Received initialize result"
        );
        self.server_info = result.get("serverInfo").cloned();

        let session = self.session.as_mut().ok_or(CheckError::NotConnected)?;
        session
            .send(&Notification::new("notifications/initialized").into())
            .await
    }

    /// Send one request and wait for the matching response, without a bound.
    async fn exchange(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let session = self.session.as_mut().ok_or(CheckError::NotConnected)?;
        let request = Request::new(method.to_string(), id).params(params);

        trace!(id, method, "Sending request");
        session.send(&request.into()).await?;

        loop {
            let Some(message) = session.recv().await? else {
                return Err(CheckError::transport(format!(
                    "server closed the connection while awaiting '{method}'"
                )));
            };

            match message {
                Message::Response(response) if response.id == RequestId::Number(id) => {
                    return response.into_result(method);
                }
                Message::Response(response) => {
                    warn!(id = %response.id, "Received response for unknown request");
                }
                Message::Request(request) => {
                    debug!(method = %request.method, "Declining server request");
                    let reply = Response::error(
                        request.id,
                        JsonRpcError::method_not_found(format!(
                            "mcpcheck does not handle '{}'",
                            request.method
                        )),
                    );
                    session.send(&reply.into()).await?;
                }
                Message::Notification(notification) => {
                    trace!(method = %notification.method, "Ignoring notification");
                }
            }
        }
    }

    /// Send one request bounded by the request timeout.
    async fn request(&mut self, method: &str, params: Option<Value>) -> Result<Value> {
        let limit = self.config.request_timeout;
        match tokio::time::timeout(limit, self.exchange(method, params)).await {
            Ok(result) => result,
            Err(_) => Err(CheckError::timeout(method, limit)),
        }
    }

    /// Collect every page of a list method.
    async fn list_all<T: DeserializeOwned>(&mut self, method: &str, field: &str) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let mut result = self.request(method, params).await?;

            let page = result.get_mut(field).map_or(Value::Array(Vec::new()), Value::take);
            let page: Vec<T> = serde_json::from_value(page)?;
            items.extend(page);

            match result.get("nextCursor").and_then(Value::as_str) {
                Some(next) if !next.is_empty() && cursor.as_deref() != Some(next) => {
                    trace!(method, cursor = next, "Fetching next page");
                    cursor = Some(next.to_string());
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

impl Session {
    async fn send(&mut self, message: &Message) -> Result<()> {
        let json = serde_json::to_string(message)?;

        if json.len() > MAX_MESSAGE_SIZE {
            return Err(CheckError::transport(format!(
                "message of {} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit",
                json.len()
            )));
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| CheckError::transport("stdin already closed"))?;

        let write = async {
            stdin.write_all(json.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
            stdin.flush().await
        };
        write
            .await
            .map_err(|e| CheckError::transport_with_source("failed to write to server", e))
    }

    /// Read the next message; `None` on EOF. Lines that are not JSON-RPC are skipped.
    async fn recv(&mut self) -> Result<Option<Message>> {
        loop {
            let mut line = String::new();
            let bytes_read = self
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| CheckError::transport_with_source("failed to read from server", e))?;

            if bytes_read == 0 {
                return Ok(None);
            }

            if line.len() > MAX_MESSAGE_SIZE {
                return Err(CheckError::protocol(format!(
                    "message of {} bytes exceeds the {MAX_MESSAGE_SIZE} byte limit",
                    line.len()
                )));
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str::<Message>(trimmed) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => {
                    let preview: String = trimmed.chars().take(100).collect();
                    warn!(error = %e, preview = %preview, "Skipping non JSON-RPC output from server");
                }
            }
        }
    }

    async fn shutdown(mut self) {
        // Closing stdin is the shutdown signal for stdio servers.
        drop(self.stdin.take());

        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "MCP server exited"),
            Ok(Err(e)) => debug!(error = %e, "Failed to wait for MCP server"),
            Err(_) => {
                debug!("MCP server did not exit, killing it");
                if let Err(e) = self.child.kill().await {
                    debug!(error = %e, "Failed to kill MCP server");
                }
            }
        }
    }
}

impl ProtocolClient for StdioClient {
    async fn connect(&mut self, timeout: Duration) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        self.session = Some(self.spawn()?);

        let outcome = match tokio::time::timeout(timeout, self.handshake()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_connection() => Err(e),
            Ok(Err(e)) => Err(CheckError::connection_with_source("initialize handshake failed", e)),
            Err(_) => Err(CheckError::timeout("initialize", timeout)),
        };

        if outcome.is_err() {
            if let Some(session) = self.session.take() {
                session.shutdown().await;
            }
        }
        outcome
    }

    async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            session.shutdown().await;
        }
    }

    async fn ping(&mut self) -> Result<bool> {
        match self.request("ping", None).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_implemented() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolInfo>> {
        self.list_all("tools/list", "tools").await
    }

    async fn list_resources(&mut self) -> Result<Vec<ResourceInfo>> {
        self.list_all("resources/list", "resources").await
    }

    async fn list_prompts(&mut self) -> Result<Vec<PromptInfo>> {
        self.list_all("prompts/list", "prompts").await
    }

    async fn call_tool(&mut self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        let params = json!({ "name": name, "arguments": args });
        let result = self.request("tools/call", Some(params)).await?;

        if result.get("isError").and_then(Value::as_bool) == Some(true) {
            return Err(CheckError::tool_error(name, error_text(&result)));
        }
        Ok(result)
    }

    async fn read_resource(&mut self, uri: &str) -> Result<Value> {
        self.request("resources/read", Some(json!({ "uri": uri }))).await
    }

    async fn get_prompt(&mut self, name: &str, args: &Map<String, Value>) -> Result<Value> {
        let arguments: Map<String, Value> = args
            .iter()
            .map(|(key, value)| {
                let text = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), Value::String(text))
            })
            .collect();

        let params = json!({ "name": name, "arguments": arguments });
        self.request("prompts/get", Some(params)).await
    }
}

/// Text content of an error result, joined by newlines.
fn error_text(result: &Value) -> String {
    let text: Vec<&str> = result["content"]
        .as_array()
        .map(|items| items.iter().filter_map(|c| c["text"].as_str()).collect())
        .unwrap_or_default();

    if text.is_empty() {
        "tool reported an error".to_string()
    } else {
        text.join("\n")
    }
}

/// Builder for [`StdioClient`].
#[derive(Debug, Clone)]
pub struct StdioClientBuilder {
    program: PathBuf,
    args: Vec<String>,
    envs: Vec<(String, String)>,
    current_dir: Option<PathBuf>,
    request_timeout: Duration,
}

impl StdioClientBuilder {
    /// Create a new builder for the given program.
    #[must_use]
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: PathBuf::from(program.as_ref()),
            args: Vec::new(),
            envs: Vec::new(),
            current_dir: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Add a single argument.
    #[must_use]
    pub fn arg<S: AsRef<str>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args
            .extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Set an environment variable.
    #[must_use]
    pub fn env<K: AsRef<str>, V: AsRef<str>>(mut self, key: K, value: V) -> Self {
        self.envs
            .push((key.as_ref().to_string(), value.as_ref().to_string()));
        self
    }

    /// Set multiple environment variables.
    #[must_use]
    pub fn envs<I, K, V>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.envs.extend(
            envs.into_iter()
                .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string())),
        );
        self
    }

    /// Set the working directory for the child process.
    #[must_use]
    pub fn working_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Bound every request (default 60 seconds).
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Create the client. No process is started until `connect`.
    #[must_use]
    pub fn build(self) -> StdioClient {
        StdioClient {
            config: self,
            session: None,
            next_id: 1,
            server_info: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_command_line() {
        let client = StdioClient::builder("node")
            .args(["server.js", "--stdio"])
            .env("DEBUG", "1")
            .build();
        assert_eq!(client.command_line(), "node server.js --stdio");
        assert!(!client.is_connected());
    }

    #[test]
    fn test_error_text_joins_content() {
        let result = json!({
            "isError": true,
            "content": [{ "type": "text", "text": "division" }, { "type": "text", "text": "by zero" }]
        });
        assert_eq!(error_text(&result), "division\nby zero");
        assert_eq!(error_text(&json!({ "isError": true })), "tool reported an error");
    }

    #[tokio::test]
    async fn test_requests_before_connect_fail() {
        let mut client = StdioClient::builder("unused").build();
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, CheckError::NotConnected));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_connection_error() {
        let mut client = StdioClient::builder("/nonexistent/mcpcheck-test-server").build();
        let err = client.connect(Duration::from_secs(1)).await.unwrap_err();
        assert!(err.is_connection());
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_noop() {
        let mut client = StdioClient::builder("unused").build();
        client.disconnect().await;
        client.disconnect().await;
    }
}

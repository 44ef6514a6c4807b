//! The unified error type for mcpcheck.
//!
//! Every fallible operation in the workspace returns [`CheckError`]: the
//! protocol client reports connection, RPC and transport failures through it,
//! the snapshot store reports file I/O problems, and configuration loading
//! reports invalid suites. The orchestrator only ever propagates the
//! connection class to its caller; everything else is folded into a failed
//! test result.

use miette::Diagnostic;
use thiserror::Error;

/// Boxed error type used as a `#[source]` for wrapped failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// JSON-RPC "method not found" error code.
pub const METHOD_NOT_FOUND: i32 = -32601;

/// The primary error type for mcpcheck.
#[derive(Error, Diagnostic, Debug)]
pub enum CheckError {
    /// The connection to the server could not be established.
    #[error("Connection failed: {message}")]
    #[diagnostic(
        code(mcpcheck::connection::failed),
        help("Check that the server command is correct and that the server speaks MCP over stdio")
    )]
    ConnectionFailed {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// An operation did not complete in time.
    #[error("Timeout after {duration:?}: {operation}")]
    #[diagnostic(
        code(mcpcheck::timeout),
        help("Consider increasing the timeout")
    )]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// How long we waited.
        duration: std::time::Duration,
    },

    /// The server does not implement the requested method.
    #[error("Method not implemented by server: {method}")]
    #[diagnostic(code(mcpcheck::protocol::not_implemented))]
    MethodNotImplemented {
        /// The method that was requested.
        method: String,
    },

    /// The server answered with a JSON-RPC error object.
    #[error("'{method}' failed with code {code}: {message}")]
    #[diagnostic(code(mcpcheck::protocol::rpc_error))]
    Rpc {
        /// The method that was requested.
        method: String,
        /// JSON-RPC error code.
        code: i32,
        /// Error message reported by the server.
        message: String,
    },

    /// A tool call completed but the tool reported an error result.
    #[error("Tool '{tool}' returned an error: {message}")]
    #[diagnostic(code(mcpcheck::tool::error_result))]
    ToolExecution {
        /// The tool that was called.
        tool: String,
        /// Text extracted from the error result.
        message: String,
    },

    /// The transport to the server failed mid-session.
    #[error("Transport error: {message}")]
    #[diagnostic(code(mcpcheck::transport::error))]
    Transport {
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// The server sent something that is not valid protocol traffic.
    #[error("Protocol error: {message}")]
    #[diagnostic(code(mcpcheck::protocol::invalid))]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// An operation was attempted before `connect` succeeded.
    #[error("Not connected")]
    #[diagnostic(code(mcpcheck::connection::not_connected))]
    NotConnected,

    /// Reading or writing a snapshot file failed.
    #[error("Snapshot '{name}': {message}")]
    #[diagnostic(code(mcpcheck::snapshot::io))]
    Snapshot {
        /// Snapshot name.
        name: String,
        /// Human-readable error message.
        message: String,
        /// The underlying error, if available.
        #[source]
        source: Option<BoxError>,
    },

    /// A suite declaration is invalid.
    #[error("Invalid configuration: {message}")]
    #[diagnostic(
        code(mcpcheck::config::invalid),
        help("See the mcpcheck crate documentation for the suite file format")
    )]
    Config {
        /// Human-readable error message.
        message: String,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    #[diagnostic(code(mcpcheck::json))]
    Json(#[from] serde_json::Error),
}

impl CheckError {
    /// Create a connection failure.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection failure with a source.
    pub fn connection_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::ConnectionFailed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a "method not implemented" error.
    pub fn not_implemented(method: impl Into<String>) -> Self {
        Self::MethodNotImplemented {
            method: method.into(),
        }
    }

    /// Create an RPC error, mapping -32601 onto [`CheckError::MethodNotImplemented`].
    pub fn rpc(method: impl Into<String>, code: i32, message: impl Into<String>) -> Self {
        let method = method.into();
        if code == METHOD_NOT_FOUND {
            return Self::MethodNotImplemented { method };
        }
        Self::Rpc {
            method,
            code,
            message: message.into(),
        }
    }

    /// Create a tool error-result failure.
    pub fn tool_error(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error with a source.
    pub fn transport_with_source<E: std::error::Error + Send + Sync + 'static>(
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a snapshot error.
    pub fn snapshot<E: std::error::Error + Send + Sync + 'static>(
        name: impl Into<String>,
        message: impl Into<String>,
        source: E,
    ) -> Self {
        Self::Snapshot {
            name: name.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether the server signalled that it does not implement the method.
    ///
    /// Discovery treats this as "capability class absent" rather than a
    /// failure.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        match self {
            Self::MethodNotImplemented { .. } => true,
            Self::Rpc { code, .. } => *code == METHOD_NOT_FOUND,
            _ => false,
        }
    }

    /// Whether this error belongs to the fatal connection class.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::NotConnected
        )
    }
}

/// Result alias using [`CheckError`].
pub type Result<T> = std::result::Result<T, CheckError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_method_not_found_maps_to_not_implemented() {
        let err = CheckError::rpc("resources/list", METHOD_NOT_FOUND, "Method not found");
        assert!(matches!(err, CheckError::MethodNotImplemented { .. }));
        assert!(err.is_not_implemented());
    }

    #[test]
    fn test_other_rpc_codes_are_not_capability_absence() {
        let err = CheckError::rpc("tools/call", -32602, "bad params");
        assert!(!err.is_not_implemented());
        assert_eq!(err.to_string(), "'tools/call' failed with code -32602: bad params");
    }

    #[test]
    fn test_connection_class() {
        assert!(CheckError::connection("refused").is_connection());
        assert!(CheckError::timeout("initialize", std::time::Duration::from_secs(1)).is_connection());
        assert!(!CheckError::protocol("garbage").is_connection());
    }
}

//! The server's advertised capabilities.
//!
//! A [`CapabilityCatalog`] is captured once per run, right after the
//! connection is established, and is read-only from then on.

use serde::{Deserialize, Serialize};

use crate::glob::Glob;

/// A tool advertised by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Unique name of the tool.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema of the tool's input.
    #[serde(rename = "inputSchema", default)]
    pub input_schema: serde_json::Value,
}

impl ToolInfo {
    /// Create a tool entry with an empty object schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A resource advertised by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// URI of the resource.
    pub uri: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
    /// MIME type, if declared.
    #[serde(rename = "mimeType", default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceInfo {
    /// Create a resource entry.
    #[must_use]
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            mime_type: None,
        }
    }

    /// Set the MIME type.
    #[must_use]
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// One declared argument of a prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgument {
    /// Argument name.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Whether the argument is required.
    #[serde(default)]
    pub required: bool,
}

/// A prompt advertised by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptInfo {
    /// Unique name of the prompt.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared arguments.
    #[serde(default)]
    pub arguments: Vec<PromptArgument>,
}

impl PromptInfo {
    /// Create a prompt entry without arguments.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            arguments: Vec::new(),
        }
    }
}

/// The three capability classes a server may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityClass {
    /// `tools/list`.
    Tools,
    /// `resources/list`.
    Resources,
    /// `prompts/list`.
    Prompts,
}

impl CapabilityClass {
    /// The listing method for this class.
    #[must_use]
    pub const fn list_method(self) -> &'static str {
        match self {
            Self::Tools => "tools/list",
            Self::Resources => "resources/list",
            Self::Prompts => "prompts/list",
        }
    }
}

impl std::fmt::Display for CapabilityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tools => write!(f, "tools"),
            Self::Resources => write!(f, "resources"),
            Self::Prompts => write!(f, "prompts"),
        }
    }
}

/// Snapshot of everything the server advertised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityCatalog {
    /// Advertised tools.
    pub tools: Vec<ToolInfo>,
    /// Advertised resources.
    pub resources: Vec<ResourceInfo>,
    /// Advertised prompts.
    pub prompts: Vec<PromptInfo>,
    /// Classes the server reported as not implemented.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unsupported: Vec<CapabilityClass>,
}

impl CapabilityCatalog {
    /// Whether a tool with exactly this name is advertised.
    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Whether a prompt with exactly this name is advertised.
    #[must_use]
    pub fn has_prompt(&self, name: &str) -> bool {
        self.prompts.iter().any(|p| p.name == name)
    }

    /// All advertised resources whose URI matches a glob pattern (case-sensitive).
    #[must_use]
    pub fn matching_resources(&self, pattern: &str) -> Vec<&ResourceInfo> {
        let glob = Glob::new(pattern);
        self.resources
            .iter()
            .filter(|r| glob.matches(&r.uri))
            .collect()
    }

    /// Advertised tool names, in catalog order.
    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Advertised resource URIs, in catalog order.
    #[must_use]
    pub fn resource_uris(&self) -> Vec<&str> {
        self.resources.iter().map(|r| r.uri.as_str()).collect()
    }

    /// Advertised prompt names, in catalog order.
    #[must_use]
    pub fn prompt_names(&self) -> Vec<&str> {
        self.prompts.iter().map(|p| p.name.as_str()).collect()
    }

    /// One-line summary, e.g. `3 tools, 1 resource, 0 prompts`.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {}",
            plural(self.tools.len(), "tool"),
            plural(self.resources.len(), "resource"),
            plural(self.prompts.len(), "prompt"),
        )
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{count} {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

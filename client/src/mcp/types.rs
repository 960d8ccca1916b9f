//! MCP type definitions
//!
//! Shared types used by sessions, the registry and the router.

use std::fmt;

use serde_json::Value;

/// Joins worker name and local tool name into a namespaced identifier
pub const NAMESPACE_SEPARATOR: char = '.';

/// Build the externally visible identifier for a worker's tool
pub fn namespaced(worker: &str, tool: &str) -> String {
    format!("{}{}{}", worker, NAMESPACE_SEPARATOR, tool)
}

/// Split a namespaced identifier at the first separator.
///
/// Worker names never contain the separator, so everything after the first
/// one belongs to the local tool name.
pub fn split_namespaced(name: &str) -> Option<(&str, &str)> {
    name.split_once(NAMESPACE_SEPARATOR)
}

/// Capability set negotiated during initialize
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const TOOLS: Self = Self(1);
    pub const PROMPTS: Self = Self(1 << 1);
    pub const RESOURCES: Self = Self(1 << 2);
    pub const LOGGING: Self = Self(1 << 3);
    pub const COMPLETIONS: Self = Self(1 << 4);
    pub const PROGRESS: Self = Self(1 << 5);

    const NAMED: [(Self, &'static str); 6] = [
        (Self::TOOLS, "tools"),
        (Self::PROMPTS, "prompts"),
        (Self::RESOURCES, "resources"),
        (Self::LOGGING, "logging"),
        (Self::COMPLETIONS, "completions"),
        (Self::PROGRESS, "progress"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Read flags from a serialized server capability object.
    ///
    /// Progress reporting is not a standard capability key; servers advertise
    /// it either at top level or under `experimental`.
    pub fn from_json(value: &Value) -> Self {
        let mut caps = Self::empty();
        let Some(obj) = value.as_object() else {
            return caps;
        };

        for (flag, key) in Self::NAMED {
            if obj.get(key).is_some_and(|v| !v.is_null()) {
                caps.insert(flag);
            }
        }

        let experimental_progress = obj
            .get("experimental")
            .and_then(|e| e.get("progress"))
            .is_some_and(|v| !v.is_null());
        if experimental_progress {
            caps.insert(Self::PROGRESS);
        }

        caps
    }

    /// Names of the set flags, in declaration order
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.names().join(", "))
    }
}

/// A tool as reported by a worker's list-tools response
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

/// A tool discovered on a live session
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescriptor {
    /// Worker this tool belongs to
    pub worker: String,
    /// Tool name local to the worker
    pub name: String,
    pub description: Option<String>,
    /// Input schema (JSON Schema object)
    pub input_schema: Value,
    /// Informational: the owning worker reports progress
    pub supports_progress: bool,
}

/// One declared parameter of a tool's input schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    pub name: String,
    pub description: Option<String>,
    pub required: bool,
}

impl ToolDescriptor {
    pub fn from_remote(worker: &str, tool: RemoteTool, capabilities: Capabilities) -> Self {
        Self {
            worker: worker.to_string(),
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
            supports_progress: capabilities.contains(Capabilities::PROGRESS),
        }
    }

    /// Globally unique `worker.tool` identifier
    pub fn namespaced_name(&self) -> String {
        namespaced(&self.worker, &self.name)
    }

    /// Parameters declared under `properties`, with `required` applied
    pub fn params(&self) -> Vec<ToolParam> {
        let required: Vec<&str> = self
            .input_schema
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, info)| ToolParam {
                        name: name.clone(),
                        description: info
                            .get("description")
                            .and_then(Value::as_str)
                            .map(str::to_string),
                        required: required.contains(&name.as_str()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Result of a completed call-tool exchange
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    /// Text rendering of each content item
    pub content: Vec<String>,
    /// The worker reported the call itself as failed
    pub is_error: bool,
}

impl ToolOutput {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: vec![content.into()],
            is_error: false,
        }
    }

    /// All content items joined by newlines
    pub fn joined(&self) -> String {
        self.content.join("\n")
    }
}

//! LLM abstraction layer

mod openai;

pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    ToolResult,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq)]
pub struct ToolUse {
    /// Correlation token echoed back in the matching tool-result turn
    pub id: String,
    /// Namespaced tool identifier
    pub name: String,
    pub arguments: Value,
}

/// One entry in the conversation history
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    /// Set on assistant turns that requested tools
    pub tool_uses: Vec<ToolUse>,
    /// Set on tool-result turns
    pub tool_use_id: Option<String>,
    /// Tool-result turn carries a failure
    pub is_error: bool,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_uses: Vec::new(),
            tool_use_id: None,
            is_error: false,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn assistant_with_tools(content: impl Into<String>, tool_uses: Vec<ToolUse>) -> Self {
        Self {
            tool_uses,
            ..Self::new(Role::Assistant, content)
        }
    }

    pub fn tool_result(tool_use_id: &str, content: impl Into<String>, is_error: bool) -> Self {
        Self {
            tool_use_id: Some(tool_use_id.to_string()),
            is_error,
            ..Self::new(Role::ToolResult, content)
        }
    }
}

/// Tool description in the shape function-calling APIs expect
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object
    pub parameters: Value,
}

/// A model reply: text, tool requests, or both
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub text: String,
    pub tool_uses: Vec<ToolUse>,
}

impl ModelReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_uses: Vec::new(),
        }
    }
}

/// Trait for remote model backends
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the full history plus the available tools and return one reply.
    ///
    /// Failures are reported as [`crate::error::Error::ModelTransport`].
    async fn complete(&self, turns: &[Turn], tools: &[ToolSpec]) -> Result<ModelReply>;

    /// Get the model name
    fn model(&self) -> &str;
}

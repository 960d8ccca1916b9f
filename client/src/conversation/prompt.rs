//! System prompt assembly

use crate::mcp::ToolRegistry;

/// Preamble used when no system prompt is configured
pub const DEFAULT_PREAMBLE: &str = "You are a helpful assistant with access to tools \
provided by several independent servers. Choose the appropriate tool based on the \
user's question. If no tool is needed, reply directly.";

const ANSWER_FORMAT: &str = r#"When you need a tool and cannot call it natively, respond with ONLY this JSON object and nothing else:
{"tool": "<worker>.<tool>", "arguments": {"<argument-name>": "<value>"}}

After receiving a tool result, turn the raw data into a concise, conversational answer focused on what the user asked. Use only the tools listed above."#;

/// Build the system prompt: preamble, then the tool listing and answer
/// format when any tools are available
pub fn system_prompt(preamble: Option<&str>, registry: &ToolRegistry) -> String {
    let preamble = preamble.unwrap_or(DEFAULT_PREAMBLE).trim();
    if registry.is_empty() {
        return preamble.to_string();
    }

    format!(
        "{}\n\nAvailable tools:\n\n{}\n\n{}",
        preamble,
        registry.describe_as_text(),
        ANSWER_FORMAT
    )
}

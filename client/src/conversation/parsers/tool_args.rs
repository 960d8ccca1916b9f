//! Alternative tool call format parser (tool/args)
//!
//! Handles `{"tool": "...", "args": {...}}`, also spelled with `arguments`.

use serde::Deserialize;

use super::{object_or_empty, ParsedCall, ToolCallParser};

pub struct ToolArgsParser;

#[derive(Deserialize)]
struct ToolArgsFormat {
    tool: String,
    #[serde(default, alias = "arguments")]
    args: serde_json::Value,
}

impl ToolCallParser for ToolArgsParser {
    fn parse(&self, content: &str) -> Option<ParsedCall> {
        let parsed: ToolArgsFormat = serde_json::from_str(content).ok()?;

        Some(ParsedCall {
            name: parsed.tool,
            arguments: object_or_empty(parsed.args),
        })
    }

    fn name(&self) -> &'static str {
        "ToolArgsParser"
    }

    fn priority(&self) -> u32 {
        50
    }
}

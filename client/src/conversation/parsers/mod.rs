//! Tool-use detection in free-text replies
//!
//! Models without native tool calling are prompted to answer with a bare
//! JSON object. The registry tries each parser in priority order, first on
//! the whole reply and then on every fenced code block in it.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

mod standard;
mod tool_args;

pub use standard::StandardParser;
pub use tool_args::ToolArgsParser;

/// A tool request recovered from reply text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCall {
    pub name: String,
    pub arguments: Value,
}

/// Trait for parsing tool calls from content
///
/// Each parser handles one format.
pub trait ToolCallParser: Send + Sync {
    /// Attempt to parse content as a tool call
    fn parse(&self, content: &str) -> Option<ParsedCall>;

    /// Parser name for logging
    fn name(&self) -> &'static str;

    /// Priority (higher = try first)
    fn priority(&self) -> u32;
}

/// Registry of tool call parsers, highest priority first
pub struct ToolCallParserRegistry {
    parsers: Vec<Box<dyn ToolCallParser>>,
}

impl Default for ToolCallParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolCallParserRegistry {
    /// Create a new registry with all built-in parsers
    pub fn new() -> Self {
        let mut parsers: Vec<Box<dyn ToolCallParser>> =
            vec![Box::new(StandardParser), Box::new(ToolArgsParser)];
        parsers.sort_by(|a, b| b.priority().cmp(&a.priority()));
        Self { parsers }
    }

    /// Try to parse content as a tool call, returning the call and the
    /// name of the parser that recognised it
    pub fn parse(&self, content: &str) -> Option<(ParsedCall, &'static str)> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }

        std::iter::once(content)
            .chain(fenced_blocks(content))
            .find_map(|candidate| self.parse_candidate(candidate))
    }

    fn parse_candidate(&self, candidate: &str) -> Option<(ParsedCall, &'static str)> {
        self.parsers
            .iter()
            .find_map(|p| p.parse(candidate).map(|call| (call, p.name())))
    }

    pub fn parser_names(&self) -> Vec<&'static str> {
        self.parsers.iter().map(|p| p.name()).collect()
    }
}

fn fenced_blocks(content: &str) -> impl Iterator<Item = &str> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let fence = FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json)?\s*\n?(.*?)```").ok())
        .as_ref();

    fence
        .into_iter()
        .flat_map(move |re| re.captures_iter(content))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

/// Normalise a missing or null arguments value to an empty object
pub(crate) fn object_or_empty(value: Value) -> Value {
    if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    }
}

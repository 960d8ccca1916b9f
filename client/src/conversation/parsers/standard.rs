//! Standard tool call format parser
//!
//! Handles `{"name": "...", "arguments": {...}}`.

use serde::Deserialize;

use super::{object_or_empty, ParsedCall, ToolCallParser};

pub struct StandardParser;

#[derive(Deserialize)]
struct StandardFormat {
    name: String,
    arguments: serde_json::Value,
}

impl ToolCallParser for StandardParser {
    fn parse(&self, content: &str) -> Option<ParsedCall> {
        let parsed: StandardFormat = serde_json::from_str(content).ok()?;

        Some(ParsedCall {
            name: parsed.name,
            arguments: object_or_empty(parsed.arguments),
        })
    }

    fn name(&self) -> &'static str {
        "StandardParser"
    }

    fn priority(&self) -> u32 {
        100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let call = StandardParser
            .parse(r#"{"name": "weather.forecast", "arguments": {"city": "NYC"}}"#)
            .unwrap();
        assert_eq!(call.name, "weather.forecast");
        assert_eq!(call.arguments["city"], "NYC");
    }

    #[test]
    fn test_parse_null_arguments() {
        let call = StandardParser
            .parse(r#"{"name": "sys.uptime", "arguments": null}"#)
            .unwrap();
        assert!(call.arguments.is_object());
    }

    #[test]
    fn test_parse_invalid() {
        // Missing name
        assert!(StandardParser.parse(r#"{"arguments": {}}"#).is_none());
        // Alternative format belongs to another parser
        assert!(StandardParser.parse(r#"{"tool": "test"}"#).is_none());
        assert!(StandardParser.parse("not json").is_none());
    }
}

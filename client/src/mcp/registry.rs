//! Aggregated tool namespace
//!
//! Every tool is keyed by `worker.tool`. Keys are unique by construction
//! because worker names are unique and never contain the separator.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::session::Session;
use super::types::ToolDescriptor;
use crate::llm::ToolSpec;

#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolDescriptor>,
}

impl ToolRegistry {
    /// Rebuild the namespace from the current session set
    pub fn aggregate(sessions: &BTreeMap<String, Session>) -> Self {
        Self::from_descriptors(sessions.values().flat_map(|s| s.tools().iter().cloned()))
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let tools = descriptors
            .into_iter()
            .map(|d| (d.namespaced_name(), d))
            .collect();
        Self { tools }
    }

    pub fn get(&self, namespaced: &str) -> Option<&ToolDescriptor> {
        self.tools.get(namespaced)
    }

    /// Namespaced identifiers in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolDescriptor)> {
        self.tools.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Structured tool list for native function calling
    pub fn describe_for_model(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|(name, tool)| ToolSpec {
                name: name.clone(),
                description: tool.description.clone().unwrap_or_default(),
                parameters: clean_schema(&tool.input_schema),
            })
            .collect()
    }

    /// Plain-text listing for prompt-based tool use
    pub fn describe_as_text(&self) -> String {
        let mut out = String::new();
        for (name, tool) in &self.tools {
            out.push_str(&format!("Tool: {}\n", name));
            out.push_str(&format!(
                "Description: [{}] {}\n",
                tool.worker,
                tool.description.as_deref().unwrap_or("No description")
            ));
            out.push_str("Arguments:\n");
            for param in tool.params() {
                out.push_str(&format!(
                    "- {}: {}{}\n",
                    param.name,
                    param.description.as_deref().unwrap_or("No description"),
                    if param.required { " (required)" } else { "" }
                ));
            }
            out.push('\n');
        }
        out.trim_end().to_string()
    }
}

/// Strip schema keywords that chat models reject or misread
pub fn clean_schema(schema: &Value) -> Value {
    let mut cleaned = strip_keywords(schema);
    if let Value::Object(obj) = &mut cleaned {
        obj.entry("type")
            .or_insert_with(|| Value::String("object".into()));
    }
    cleaned
}

fn strip_keywords(schema: &Value) -> Value {
    match schema {
        Value::Object(obj) => {
            let mut cleaned = Map::new();
            for (key, value) in obj {
                if key == "$schema" || key == "title" || key == "additionalProperties" {
                    continue;
                }
                let value = if key == "properties" {
                    strip_properties(value)
                } else {
                    strip_keywords(value)
                };
                cleaned.insert(key.clone(), value);
            }
            Value::Object(cleaned)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(strip_keywords).collect()),
        other => other.clone(),
    }
}

// Property names are user data: keep them even if they collide with keywords
fn strip_properties(props: &Value) -> Value {
    match props {
        Value::Object(obj) => Value::Object(
            obj.iter()
                .map(|(name, schema)| (name.clone(), strip_keywords(schema)))
                .collect(),
        ),
        other => other.clone(),
    }
}

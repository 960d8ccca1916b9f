//! OpenAI-compatible chat-completions client
//!
//! Talks plain HTTP via reqwest so tool calls round-trip without SDK
//! translation. Namespaced tool names contain '.', which function-calling
//! APIs reject, so each request carries a table mapping sanitized wire names
//! back to namespaced identifiers.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ModelClient, ModelReply, Role, ToolSpec, ToolUse, Turn};
use crate::error::{Error, Result};

/// Longest function name accepted by the API
const MAX_WIRE_NAME_LEN: usize = 64;

pub struct OpenAiClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Create a client for `{base_url}/chat/completions`
    pub fn new(base_url: &str, api_key: Option<String>, model: &str, max_tokens: u32) -> Result<Self> {
        let url = url::Url::parse(base_url).map_err(|e| Error::ConfigLoad {
            path: "api url".into(),
            reason: format!("invalid URL '{}': {}", base_url, e),
        })?;

        Ok(Self {
            http_client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", url.as_str().trim_end_matches('/')),
            api_key,
            model: model.to_string(),
            max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    async fn complete(&self, turns: &[Turn], tools: &[ToolSpec]) -> Result<ModelReply> {
        let names = WireNames::new(tools);
        let request = ChatRequest {
            model: &self.model,
            messages: turns.iter().map(|t| WireMessage::from_turn(t, &names)).collect(),
            tools: tools.iter().map(|t| WireTool::from_spec(t, &names)).collect(),
            max_tokens: self.max_tokens,
            stream: false,
        };

        tracing::debug!(
            "Model request: {} messages, {} tools",
            request.messages.len(),
            request.tools.len()
        );

        let mut builder = self.http_client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::ModelTransport(format!("request to {} failed: {}", self.endpoint, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ModelTransport(format!("API error {}: {}", status, body)));
        }

        let raw_body = response
            .text()
            .await
            .map_err(|e| Error::ModelTransport(format!("failed to read response: {}", e)))?;
        let reply = parse_reply(&raw_body, &names)?;

        tracing::debug!(
            "Model reply: {} chars, {} tool calls",
            reply.text.len(),
            reply.tool_uses.len()
        );
        Ok(reply)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn parse_reply(raw_body: &str, names: &WireNames) -> Result<ModelReply> {
    let body: ChatResponse = serde_json::from_str(raw_body)
        .map_err(|e| Error::ModelTransport(format!("failed to parse response: {}", e)))?;
    let message = body
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| Error::ModelTransport("response contained no choices".into()))?;

    let tool_uses = message
        .tool_calls
        .into_iter()
        .enumerate()
        .map(|(i, call)| ToolUse {
            id: call.id.unwrap_or_else(|| format!("call_{}", i)),
            name: names.to_namespaced(&call.function.name),
            arguments: decode_arguments(&call.function.name, call.function.arguments),
        })
        .collect();

    Ok(ModelReply {
        text: message.content.unwrap_or_default(),
        tool_uses,
    })
}

/// Arguments arrive as a JSON-encoded string; some servers send the object
fn decode_arguments(tool: &str, raw: Value) -> Value {
    match raw {
        Value::String(s) if s.trim().is_empty() => Value::Object(Default::default()),
        Value::String(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
            tracing::warn!("Unparsable arguments for {}: {} ({})", tool, s, e);
            Value::Object(Default::default())
        }),
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}

// ============================================================================
// Wire names
// ============================================================================

/// Bidirectional mapping between namespaced names and API-safe names
#[derive(Debug, Default)]
struct WireNames {
    to_wire: HashMap<String, String>,
    from_wire: HashMap<String, String>,
}

impl WireNames {
    fn new(tools: &[ToolSpec]) -> Self {
        let mut names = Self::default();
        for tool in tools {
            let base = sanitize(&tool.name);
            let mut wire = base.clone();
            let mut n = 2;
            while names.from_wire.contains_key(&wire) {
                let suffix = format!("_{}", n);
                let keep = base.len().min(MAX_WIRE_NAME_LEN - suffix.len());
                wire = format!("{}{}", &base[..keep], suffix);
                n += 1;
            }
            names.to_wire.insert(tool.name.clone(), wire.clone());
            names.from_wire.insert(wire, tool.name.clone());
        }
        names
    }

    fn to_wire(&self, namespaced: &str) -> String {
        self.to_wire
            .get(namespaced)
            .cloned()
            .unwrap_or_else(|| sanitize(namespaced))
    }

    fn to_namespaced(&self, wire: &str) -> String {
        self.from_wire
            .get(wire)
            .cloned()
            .unwrap_or_else(|| wire.to_string())
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .take(MAX_WIRE_NAME_LEN)
        .collect()
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool>,
    max_tokens: u32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn from_turn(turn: &Turn, names: &WireNames) -> Self {
        let role = match turn.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::ToolResult => "tool",
        };
        Self {
            role,
            content: turn.content.clone(),
            tool_calls: turn
                .tool_uses
                .iter()
                .map(|u| WireToolCall {
                    id: Some(u.id.clone()),
                    call_type: "function".into(),
                    function: WireFunctionCall {
                        name: names.to_wire(&u.name),
                        arguments: Value::String(u.arguments.to_string()),
                    },
                })
                .collect(),
            tool_call_id: turn.tool_use_id.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: WireFunction,
}

impl WireTool {
    fn from_spec(spec: &ToolSpec, names: &WireNames) -> Self {
        Self {
            tool_type: "function",
            function: WireFunction {
                name: names.to_wire(&spec.name),
                description: spec.description.clone(),
                parameters: spec.parameters.clone(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: WireFunctionCall,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.into(),
            description: format!("{} tool", name),
            parameters: json!({"type": "object"}),
        }
    }

    #[test]
    fn test_endpoint_from_base_url() {
        let client = OpenAiClient::new("http://localhost:8080/v1/", None, "m", 100).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(client.model(), "m");

        assert!(OpenAiClient::new("not a url", None, "m", 100).is_err());
    }

    #[test]
    fn test_wire_names_round_trip() {
        let tools = [spec("A.echo"), spec("B.echo"), spec("A_echo")];
        let names = WireNames::new(&tools);

        let wires: Vec<String> = tools.iter().map(|t| names.to_wire(&t.name)).collect();
        assert_eq!(wires[0], "A_echo");
        assert_eq!(wires[1], "B_echo");
        // Collides with the sanitized form of "A.echo"
        assert_eq!(wires[2], "A_echo_2");

        for (tool, wire) in tools.iter().zip(&wires) {
            assert_eq!(names.to_namespaced(wire), tool.name);
        }
        assert_eq!(names.to_namespaced("unknown_tool"), "unknown_tool");
    }

    #[test]
    fn test_request_serialization() {
        let names = WireNames::new(&[spec("tasks.get_tasklist")]);
        let turns = vec![
            Turn::system("be brief"),
            Turn::user("what's due?"),
            Turn::assistant_with_tools(
                "",
                vec![ToolUse {
                    id: "call_0".into(),
                    name: "tasks.get_tasklist".into(),
                    arguments: json!({"category": "work"}),
                }],
            ),
            Turn::tool_result("call_0", "Tasks for category 'work':", false),
        ];
        let request = ChatRequest {
            model: "gpt-test",
            messages: turns.iter().map(|t| WireMessage::from_turn(t, &names)).collect(),
            tools: vec![WireTool::from_spec(&spec("tasks.get_tasklist"), &names)],
            max_tokens: 256,
            stream: false,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-test");
        assert_eq!(value["stream"], false);
        assert_eq!(value["tools"][0]["function"]["name"], "tasks_get_tasklist");
        assert_eq!(value["messages"][0]["role"], "system");
        assert!(value["messages"][1].get("tool_calls").is_none());
        assert_eq!(
            value["messages"][2]["tool_calls"][0]["function"]["name"],
            "tasks_get_tasklist"
        );
        assert_eq!(
            value["messages"][2]["tool_calls"][0]["function"]["arguments"],
            r#"{"category":"work"}"#
        );
        assert_eq!(value["messages"][3]["role"], "tool");
        assert_eq!(value["messages"][3]["tool_call_id"], "call_0");
    }

    #[test]
    fn test_empty_tool_list_omitted() {
        let request = ChatRequest {
            model: "m",
            messages: vec![],
            tools: vec![],
            max_tokens: 1,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
    }

    #[test]
    fn test_parse_reply_with_tool_calls() {
        let names = WireNames::new(&[spec("A.echo")]);
        let body = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_abc", "type": "function",
                         "function": {"name": "A_echo", "arguments": "{\"text\":\"hi\"}"}},
                        {"type": "function",
                         "function": {"name": "A_echo", "arguments": {"text": "object form"}}}
                    ]
                }
            }]
        })
        .to_string();

        let reply = parse_reply(&body, &names).unwrap();
        assert_eq!(reply.text, "");
        assert_eq!(reply.tool_uses.len(), 2);
        assert_eq!(reply.tool_uses[0].id, "call_abc");
        assert_eq!(reply.tool_uses[0].name, "A.echo");
        assert_eq!(reply.tool_uses[0].arguments, json!({"text": "hi"}));
        assert_eq!(reply.tool_uses[1].id, "call_1");
        assert_eq!(reply.tool_uses[1].arguments, json!({"text": "object form"}));
    }

    #[test]
    fn test_parse_reply_errors() {
        let names = WireNames::default();
        assert!(matches!(
            parse_reply("{\"choices\": []}", &names),
            Err(Error::ModelTransport(_))
        ));
        assert!(matches!(
            parse_reply("<html>", &names),
            Err(Error::ModelTransport(_))
        ));
    }

    #[test]
    fn test_bad_arguments_become_empty_object() {
        assert_eq!(decode_arguments("t", json!("{oops")), json!({}));
        assert_eq!(decode_arguments("t", json!("")), json!({}));
        assert_eq!(decode_arguments("t", Value::Null), json!({}));
    }

    #[tokio::test]
    async fn test_non_success_status_is_transport_error() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Drain the whole request so closing the socket does not reset it
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if request.len() >= split + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let body = "{\"error\":\"bad key\"}";
            let response = format!(
                "HTTP/1.1 401 Unauthorized\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });

        let client = OpenAiClient::new(&format!("http://{}/v1", addr), Some("k".into()), "m", 10).unwrap();
        let err = client.complete(&[Turn::user("hi")], &[]).await.unwrap_err();
        match err {
            Error::ModelTransport(msg) => {
                assert!(msg.contains("401"), "{msg}");
                assert!(msg.contains("bad key"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

//! Tool-aware conversation loop
//!
//! One user input drives: model call → zero or more tool rounds → final
//! reply. Tool rounds run sequentially and each feeds its results back to the
//! model. Tool failures become error-labelled tool-result turns; model
//! failures are returned to the caller and leave the history usable.

mod parsers;
mod prompt;

pub use parsers::{ParsedCall, ToolCallParser, ToolCallParserRegistry};
pub use prompt::{system_prompt, DEFAULT_PREAMBLE};

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::llm::{ModelClient, ModelReply, ToolSpec, ToolUse, Turn};
use crate::mcp::CallRouter;
use crate::output::{OutputEvent, OutputWriter};

/// Default bound on one model request
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(60);

/// Tool rounds allowed per user input before giving up
pub const MAX_TOOL_ROUNDS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    AwaitingModelReply,
    ToolUseRequested,
}

/// One executed tool call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallRecord {
    pub id: String,
    pub name: String,
    pub arguments: Value,
    /// Content of the tool-result turn
    pub output: String,
    pub is_error: bool,
    pub elapsed: Duration,
}

/// Outcome of one user input
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub reply: String,
    pub tool_calls: Vec<ToolCallRecord>,
    /// Follow-up model calls issued after tool rounds
    pub rounds: usize,
}

pub struct Conversation {
    model: Arc<dyn ModelClient>,
    preamble: Option<String>,
    turns: Vec<Turn>,
    phase: Phase,
    reply_timeout: Duration,
    max_tool_rounds: usize,
    parsers: ToolCallParserRegistry,
    output: Option<Arc<dyn OutputWriter>>,
    next_call_id: u64,
}

impl Conversation {
    pub fn new(model: Arc<dyn ModelClient>) -> Self {
        Self {
            model,
            preamble: None,
            turns: Vec::new(),
            phase: Phase::Idle,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            max_tool_rounds: MAX_TOOL_ROUNDS,
            parsers: ToolCallParserRegistry::new(),
            output: None,
            next_call_id: 0,
        }
    }

    /// Replace the default preamble; the tool listing is still appended
    pub fn with_system_prompt(mut self, preamble: Option<String>) -> Self {
        self.preamble = preamble;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    pub fn with_output(mut self, output: Arc<dyn OutputWriter>) -> Self {
        self.output = Some(output);
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// History without the system prompt
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn model_name(&self) -> &str {
        self.model.model()
    }

    /// Forget the history. The system prompt is rebuilt on every request, so
    /// it survives.
    pub fn clear(&mut self) {
        self.turns.clear();
        self.phase = Phase::Idle;
    }

    /// Process one user input to a final reply
    pub async fn send(&mut self, router: &CallRouter, input: &str) -> Result<Exchange> {
        let result = self.run(router, input).await;
        self.phase = Phase::Idle;
        result
    }

    async fn run(&mut self, router: &CallRouter, input: &str) -> Result<Exchange> {
        let registry = router.registry();
        let tools = registry.describe_for_model();
        let system = Turn::system(system_prompt(self.preamble.as_deref(), registry));
        let user = Turn::user(input);

        self.phase = Phase::AwaitingModelReply;
        let mut reply = self.request(&system, Some(&user), &tools).await?;
        self.turns.push(user);

        let mut tool_calls = Vec::new();
        let mut rounds = 0;

        loop {
            let uses = self.tool_uses(&mut reply, router);
            if uses.is_empty() {
                self.turns.push(Turn::assistant(reply.text.clone()));
                return Ok(Exchange {
                    reply: reply.text,
                    tool_calls,
                    rounds,
                });
            }

            if rounds == self.max_tool_rounds {
                tracing::warn!(
                    "Reached max tool rounds ({}), stopping",
                    self.max_tool_rounds
                );
                let message = format!(
                    "Stopped after {} tool rounds without a final answer",
                    self.max_tool_rounds
                );
                self.emit(OutputEvent::Warning(message.clone()));
                self.turns.push(Turn::assistant(reply.text));
                return Ok(Exchange {
                    reply: message,
                    tool_calls,
                    rounds,
                });
            }

            self.phase = Phase::ToolUseRequested;
            tracing::info!("Model requested {} tool call(s)", uses.len());
            self.turns
                .push(Turn::assistant_with_tools(reply.text.clone(), uses.clone()));

            for tool_use in uses {
                let record = self.invoke(router, tool_use).await;
                self.turns
                    .push(Turn::tool_result(&record.id, &record.output, record.is_error));
                tool_calls.push(record);
            }

            rounds += 1;
            self.phase = Phase::AwaitingModelReply;
            reply = self.request(&system, None, &tools).await?;
        }
    }

    /// Structured tool uses, or failing that one parsed from the reply text
    fn tool_uses(&mut self, reply: &mut ModelReply, router: &CallRouter) -> Vec<ToolUse> {
        if !reply.tool_uses.is_empty() {
            return std::mem::take(&mut reply.tool_uses);
        }

        match self.parsers.parse(&reply.text) {
            // Only known tools: a plain answer that happens to be JSON stays an answer
            Some((call, parser)) if router.registry().get(&call.name).is_some() => {
                tracing::info!("Parsed tool call from content using {}: {}", parser, call.name);
                let id = format!("call_{}", self.next_call_id);
                self.next_call_id += 1;
                vec![ToolUse {
                    id,
                    name: call.name,
                    arguments: call.arguments,
                }]
            }
            Some((call, _)) => {
                tracing::debug!("Ignoring parsed call to unknown tool '{}'", call.name);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    async fn invoke(&self, router: &CallRouter, tool_use: ToolUse) -> ToolCallRecord {
        self.emit(OutputEvent::ToolStart {
            name: tool_use.name.clone(),
            arguments: tool_use.arguments.clone(),
        });

        let started = Instant::now();
        let (output, is_error) = match router.route(&tool_use.name, tool_use.arguments.clone()).await {
            Ok(out) if out.is_error => (format!("Error: {}", out.joined()), true),
            Ok(out) => (out.joined(), false),
            Err(e) => {
                tracing::warn!("Tool call {} failed: {}", tool_use.name, e);
                (format!("Error: {}", e), true)
            }
        };
        let elapsed = started.elapsed();

        self.emit(OutputEvent::ToolComplete {
            name: tool_use.name.clone(),
            result: output.clone(),
            duration: elapsed,
            is_error,
        });

        ToolCallRecord {
            id: tool_use.id,
            name: tool_use.name,
            arguments: tool_use.arguments,
            output,
            is_error,
            elapsed,
        }
    }

    async fn request(
        &self,
        system: &Turn,
        pending: Option<&Turn>,
        tools: &[ToolSpec],
    ) -> Result<ModelReply> {
        let mut messages = Vec::with_capacity(self.turns.len() + 2);
        messages.push(system.clone());
        messages.extend(self.turns.iter().cloned());
        messages.extend(pending.cloned());

        tracing::debug!(
            "Requesting reply from {} ({} messages, {} tools)",
            self.model.model(),
            messages.len(),
            tools.len()
        );

        match tokio::time::timeout(self.reply_timeout, self.model.complete(&messages, tools)).await {
            Ok(result) => result,
            Err(_) => Err(Error::ModelTimeout(self.reply_timeout)),
        }
    }

    fn emit(&self, event: OutputEvent) {
        if let Some(output) = &self.output {
            output.write(event);
        }
    }
}

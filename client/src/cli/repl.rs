//! Interactive read-eval-print loop
//!
//! A reader thread owns stdin and hands complete lines over a single-slot
//! channel, so the next query can be typed while a reply is pending.
//! The loop itself processes one query at a time. Quit and Ctrl-C return at
//! once, leaving the reader thread behind; cleanup is the caller's job.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio::sync::{mpsc, Notify};

use crate::conversation::Conversation;
use crate::mcp::ToolHub;
use crate::output::{OutputEvent, OutputWriter};

/// One line of user input, classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Quit,
    Empty,
    /// List available tools
    Tools,
    /// Re-query every worker's tool list
    Refresh,
    /// Forget the conversation history
    Clear,
    Chat(String),
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let input = line.trim();
        match input.to_ascii_lowercase().as_str() {
            "" => Self::Empty,
            "quit" | "exit" => Self::Quit,
            "tools" => Self::Tools,
            "refresh" => Self::Refresh,
            "clear" => Self::Clear,
            _ => Self::Chat(input.to_string()),
        }
    }
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Quit,
    Interrupted,
    EndOfInput,
}

pub struct Repl<'a> {
    hub: &'a mut ToolHub,
    conversation: &'a mut Conversation,
    output: &'a dyn OutputWriter,
    show_prompt: bool,
}

impl<'a> Repl<'a> {
    pub fn new(
        hub: &'a mut ToolHub,
        conversation: &'a mut Conversation,
        output: &'a dyn OutputWriter,
    ) -> Self {
        Self {
            hub,
            conversation,
            output,
            show_prompt: atty::is(atty::Stream::Stdin),
        }
    }

    /// Run against the process's stdin until quit, Ctrl-C or end of input
    pub async fn run(&mut self) -> ExitReason {
        let (tx, rx) = mpsc::channel(1);
        spawn_stdin_reader(tx);

        let interrupt = Arc::new(Notify::new());
        let signal_task = tokio::spawn({
            let interrupt = interrupt.clone();
            async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    interrupt.notify_one();
                }
            }
        });

        let reason = self.run_with(rx, interrupt).await;

        signal_task.abort();
        reason
    }

    /// Drive the loop from an arbitrary line source
    pub async fn run_with(
        &mut self,
        mut lines: mpsc::Receiver<String>,
        interrupt: Arc<Notify>,
    ) -> ExitReason {
        self.banner();

        loop {
            self.prompt();

            let line = tokio::select! {
                line = lines.recv() => line,
                _ = interrupt.notified() => {
                    self.output.write(OutputEvent::NewLine);
                    tracing::info!("Interrupted, exiting");
                    return ExitReason::Interrupted;
                }
            };

            let Some(line) = line else {
                tracing::debug!("End of input");
                return ExitReason::EndOfInput;
            };

            match ReplCommand::parse(&line) {
                ReplCommand::Empty => continue,
                ReplCommand::Quit => return ExitReason::Quit,
                ReplCommand::Tools => self.list_tools(),
                ReplCommand::Refresh => {
                    self.hub.router_mut().refresh().await;
                    self.output.write(OutputEvent::Status(format!(
                        "{} tools available",
                        self.hub.registry().len()
                    )));
                }
                ReplCommand::Clear => {
                    self.conversation.clear();
                    self.output
                        .write(OutputEvent::Status("Conversation cleared".into()));
                }
                ReplCommand::Chat(input) => self.chat(&input).await,
            }
        }
    }

    fn banner(&self) {
        let workers = self.hub.worker_count();
        let tools = self.hub.registry().len();
        if tools == 0 {
            self.output.write(OutputEvent::Warning(
                "No tools available; chatting without tools".into(),
            ));
        } else {
            self.output.write(OutputEvent::System(format!(
                "Connected to {} worker(s) with {} tool(s). Model: {}",
                workers,
                tools,
                self.conversation.model_name()
            )));
        }
        self.output.write(OutputEvent::System(
            "Commands: tools, refresh, clear, quit".into(),
        ));
        self.output.write(OutputEvent::NewLine);
    }

    fn prompt(&self) {
        if self.show_prompt {
            print!("> ");
            let _ = io::stdout().flush();
        }
    }

    fn list_tools(&self) {
        let registry = self.hub.registry();
        if registry.is_empty() {
            self.output
                .write(OutputEvent::Status("No tools available".into()));
            return;
        }
        for (name, tool) in registry.iter() {
            self.output.write(OutputEvent::System(format!(
                "  {} [{}] {}",
                name,
                tool.worker,
                tool.description.as_deref().unwrap_or("")
            )));
        }
    }

    async fn chat(&mut self, input: &str) {
        match self.conversation.send(self.hub.router(), input).await {
            Ok(exchange) => {
                self.output.write(OutputEvent::NewLine);
                self.output.write(OutputEvent::Reply(exchange.reply));
                self.output.write(OutputEvent::NewLine);
            }
            Err(e) => {
                tracing::error!("{}", e);
                self.output.write(OutputEvent::Error(e.to_string()));
            }
        }
        self.output.flush();
    }
}

/// Blocking stdin reads on a detached thread; a pending read never holds up
/// process exit.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    let spawned = std::thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            let stdin = io::stdin();
            loop {
                let mut line = String::new();
                match stdin.lock().read_line(&mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = line.trim_end_matches(['\n', '\r']).to_string();
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Failed to read input: {}", e);
                        break;
                    }
                }
            }
        });

    // Dropping the sender on failure reads as end of input
    if let Err(e) = spawned {
        tracing::error!("Failed to start input reader: {}", e);
    }
}

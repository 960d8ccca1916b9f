//! Output abstraction for the interactive client
//!
//! Conversation and lifecycle events are emitted as [`OutputEvent`]s; a
//! writer decides how they are displayed. Reply text goes to stdout, all
//! status lines to stderr.

use std::time::Duration;

mod plain;
mod terminal;

pub use plain::PlainOutput;
pub use terminal::TerminalOutput;

/// Longest argument rendering shown next to a tool name
const ARGS_PREVIEW_CHARS: usize = 80;

/// Longest result preview shown after a tool completes
const RESULT_PREVIEW_CHARS: usize = 100;

/// Events that can be displayed to the user
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Final model reply
    Reply(String),

    /// Tool call dispatched
    ToolStart {
        name: String,
        arguments: serde_json::Value,
    },

    /// Tool call finished
    ToolComplete {
        name: String,
        result: String,
        duration: Duration,
        is_error: bool,
    },

    Status(String),

    Error(String),

    Warning(String),

    /// Dimmed informational line (banners, listings)
    System(String),

    NewLine,
}

/// Trait for writing output events
pub trait OutputWriter: Send + Sync {
    fn write(&self, event: OutputEvent);

    /// Flush any buffered output
    fn flush(&self);

    /// Whether this writer supports colors/formatting
    fn supports_colors(&self) -> bool {
        false
    }
}

/// Pick a writer for the current stdout: colors on a terminal unless
/// `NO_COLOR` is set, plain text for pipes
pub fn default_output(verbose: bool) -> Box<dyn OutputWriter> {
    let no_color = std::env::var_os("NO_COLOR").is_some_and(|v| !v.is_empty());
    let output = select_output(atty::is(atty::Stream::Stdout), no_color, verbose);
    tracing::debug!(colors = output.supports_colors(), "Output writer selected");
    output
}

fn select_output(terminal: bool, no_color: bool, verbose: bool) -> Box<dyn OutputWriter> {
    match (terminal, no_color) {
        (true, false) => Box::new(TerminalOutput::new().with_verbose(verbose)),
        (true, true) => Box::new(TerminalOutput::without_colors().with_verbose(verbose)),
        (false, _) => Box::new(PlainOutput::new().with_verbose(verbose)),
    }
}

/// Compact one-line rendering of tool arguments; empty for `{}` and null
pub(crate) fn format_args(args: &serde_json::Value) -> String {
    match args {
        serde_json::Value::Object(map) if map.is_empty() => String::new(),
        serde_json::Value::Null => String::new(),
        _ => truncate(&args.to_string(), ARGS_PREVIEW_CHARS),
    }
}

pub(crate) fn preview(result: &str) -> String {
    truncate(&result.replace('\n', " "), RESULT_PREVIEW_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

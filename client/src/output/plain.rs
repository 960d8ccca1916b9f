//! Plain text output for pipes and CI environments

use std::io::{self, Write};

use super::{format_args, preview, OutputEvent, OutputWriter};

/// Plain text output writer (no colors)
#[derive(Default)]
pub struct PlainOutput {
    /// Show result previews for successful tool calls too
    verbose: bool,
}

impl PlainOutput {
    pub fn new() -> Self {
        Self { verbose: false }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn render(&self, event: OutputEvent) -> Option<String> {
        let line = match event {
            OutputEvent::Reply(_) | OutputEvent::NewLine => return None,

            OutputEvent::ToolStart { name, arguments } => {
                let args = format_args(&arguments);
                if args.is_empty() {
                    format!("  -> {}", name)
                } else {
                    format!("  -> {} {}", name, args)
                }
            }

            OutputEvent::ToolComplete {
                name,
                result,
                duration,
                is_error,
            } => {
                let status = if is_error { "FAIL" } else { "OK" };
                let time = format!("({}ms)", duration.as_millis());
                if self.verbose || is_error {
                    format!("  {} {} {} {}", status, name, time, preview(&result))
                } else {
                    format!("  {} {} {}", status, name, time)
                }
            }

            OutputEvent::Status(msg) => format!("  {}", msg),
            OutputEvent::Error(msg) => format!("Error: {}", msg),
            OutputEvent::Warning(msg) => format!("Warning: {}", msg),
            OutputEvent::System(msg) => msg,
        };
        Some(line)
    }
}

impl OutputWriter for PlainOutput {
    fn write(&self, event: OutputEvent) {
        match event {
            OutputEvent::Reply(text) => println!("{}", text),
            OutputEvent::NewLine => println!(),
            other => {
                if let Some(line) = self.render(other) {
                    eprintln!("{}", line);
                }
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();
    }
}

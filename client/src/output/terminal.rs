//! Terminal output with colors and formatting
//!
//! Uses ANSI escape codes for colors and styling.

use std::io::{self, Write};

use super::{format_args, preview, OutputEvent, OutputWriter};

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";

/// Terminal output writer with colors and formatting
pub struct TerminalOutput {
    use_colors: bool,
    verbose: bool,
}

impl Default for TerminalOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOutput {
    pub fn new() -> Self {
        Self {
            use_colors: true,
            verbose: false,
        }
    }

    pub fn without_colors() -> Self {
        Self {
            use_colors: false,
            verbose: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn color(&self, code: &str, text: &str) -> String {
        if self.use_colors {
            format!("{}{}{}", code, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn styled(&self, codes: &[&str], text: &str) -> String {
        if self.use_colors {
            let prefix: String = codes.concat();
            format!("{}{}{}", prefix, text, RESET)
        } else {
            text.to_string()
        }
    }

    fn render(&self, event: OutputEvent) -> Option<String> {
        let line = match event {
            OutputEvent::Reply(_) | OutputEvent::NewLine => return None,

            OutputEvent::ToolStart { name, arguments } => {
                let tool_name = self.styled(&[BOLD, CYAN], &name);
                let args = format_args(&arguments);
                if args.is_empty() {
                    format!("  {} {}", self.color(GRAY, "→"), tool_name)
                } else {
                    format!(
                        "  {} {} {}",
                        self.color(GRAY, "→"),
                        tool_name,
                        self.color(GRAY, &args)
                    )
                }
            }

            OutputEvent::ToolComplete {
                name,
                result,
                duration,
                is_error,
            } => {
                let status = if is_error {
                    self.color(RED, "✗")
                } else {
                    self.color(GREEN, "✓")
                };
                let time = self.color(GRAY, &format!("({}ms)", duration.as_millis()));

                if self.verbose || is_error {
                    let code = if is_error { RED } else { GRAY };
                    format!(
                        "  {} {} {} {}",
                        status,
                        name,
                        time,
                        self.color(code, &preview(&result))
                    )
                } else {
                    format!("  {} {} {}", status, name, time)
                }
            }

            OutputEvent::Status(msg) => self.color(GRAY, &format!("  {}", msg)),

            OutputEvent::Error(msg) => format!(
                "{} {}",
                self.styled(&[BOLD, RED], "Error:"),
                self.color(RED, &msg)
            ),

            OutputEvent::Warning(msg) => format!(
                "{} {}",
                self.styled(&[BOLD, YELLOW], "Warning:"),
                self.color(YELLOW, &msg)
            ),

            OutputEvent::System(msg) => self.color(GRAY, &msg),
        };
        Some(line)
    }
}

impl OutputWriter for TerminalOutput {
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

    fn supports_colors(&self) -> bool {
        self.use_colors
    }
}

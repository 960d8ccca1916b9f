//! Task List MCP Library
//!
//! Serves a JSON task file through a single `get_tasklist` tool.
//!
//! # Usage as Binary
//!
//! Run directly: `TASKLIST_FILE=tasks.json tasklist-mcp`
//!
//! Or configure in `.mcp.json`:
//! ```json
//! { "mcpServers": { "tasks": { "command": "./tasklist-mcp", "env": { "TASKLIST_FILE": "tasks.json" } } } }
//! ```

pub mod server;
pub mod tasks;

pub use server::{GetTasklistParams, TasklistMcpServer};

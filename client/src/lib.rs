//! Multi-server MCP client with a tool-aware chat loop

pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod logging;
pub mod mcp;
pub mod output;

pub use error::{Error, PeerError, Result};

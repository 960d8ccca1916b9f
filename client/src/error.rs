//! Error taxonomy for the orchestrator
//!
//! Only [`Error::ConfigLoad`] is fatal. Every other variant is scoped to one
//! worker, one tool call or one model turn and is reported without stopping
//! the process.

use std::time::Duration;

/// JSON-RPC code for an unknown method or tool
pub(crate) const METHOD_NOT_FOUND: i32 = -32601;

/// JSON-RPC code for rejected arguments
pub(crate) const INVALID_PARAMS: i32 = -32602;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Worker configuration missing or malformed
    #[error("failed to load configuration from {path}: {reason}")]
    ConfigLoad { path: String, reason: String },

    /// Worker process could not be started or exited immediately
    #[error("worker '{worker}' failed to launch: {reason}")]
    WorkerLaunch { worker: String, reason: String },

    /// Transport could not be opened or initialize went unanswered
    #[error("handshake with worker '{worker}' failed: {reason}")]
    Handshake { worker: String, reason: String },

    /// Tool call failed after all attempts
    #[error("tool '{tool}' on worker '{worker}' failed after {attempts} attempt(s): {source}")]
    ToolExecution {
        worker: String,
        tool: String,
        attempts: u32,
        #[source]
        source: PeerError,
    },

    /// Namespaced tool name could not be resolved to a session
    #[error("cannot route '{name}': {reason}")]
    Routing { name: String, reason: String },

    /// Model service did not answer within the reply timeout
    #[error("model request timed out after {0:?}")]
    ModelTimeout(Duration),

    /// Model service request failed below the conversation layer
    #[error("model request failed: {0}")]
    ModelTransport(String),
}

/// Failure talking to one worker over its protocol session
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PeerError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("worker rejected request ({code}): {message}")]
    Rejected { code: i32, message: String },

    #[error("session is closed")]
    Closed,
}

impl PeerError {
    /// Transient failures are worth another attempt; a rejection for an
    /// unknown tool or bad arguments will fail the same way again.
    pub fn is_transient(&self) -> bool {
        match self {
            PeerError::Transport(_) | PeerError::Timeout(_) => true,
            PeerError::Rejected { code, .. } => {
                *code != METHOD_NOT_FOUND && *code != INVALID_PARAMS
            }
            PeerError::Closed => false,
        }
    }
}

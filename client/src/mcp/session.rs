//! Per-worker protocol session
//!
//! A session owns the peer connection for one worker, the tools it advertised
//! at connect time, and the retry policy applied to tool calls. Calls on one
//! session are serialized.

use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use super::peer::{RmcpPeer, ToolPeer};
use super::supervisor::WorkerHandle;
use super::types::{Capabilities, ToolDescriptor, ToolOutput};
use crate::error::{Error, PeerError, Result, INVALID_PARAMS};

/// Default per-call timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// How failed tool calls are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_secs(1),
        }
    }
}

pub struct Session {
    worker: String,
    capabilities: Capabilities,
    tools: Vec<ToolDescriptor>,
    peer: Mutex<Option<Box<dyn ToolPeer>>>,
    call_timeout: Duration,
    retry: RetryPolicy,
}

impl Session {
    /// Handshake with a running worker and discover its tools.
    ///
    /// The whole exchange (initialize plus tool listing) is bounded by
    /// `timeout`.
    pub async fn initialize(handle: &WorkerHandle, timeout: Duration) -> Result<Self> {
        let worker = handle.name().to_string();
        let handshake_err = |reason: String| Error::Handshake {
            worker: worker.clone(),
            reason,
        };

        if !handle.check_alive().await {
            return Err(handshake_err("worker process is not running".into()));
        }
        let stdio = handle
            .take_stdio()
            .await
            .ok_or_else(|| handshake_err("worker streams already in use".into()))?;

        let connect = async {
            let (peer, capabilities) = RmcpPeer::connect(stdio).await?;
            let mut session = Session::new(&worker, capabilities, Box::new(peer));
            session.refresh_tools().await?;
            Ok::<_, PeerError>(session)
        };

        match tokio::time::timeout(timeout, connect).await {
            Ok(Ok(session)) => {
                tracing::info!(
                    "Connected to {} with capabilities {} ({} tools)",
                    worker,
                    session.capabilities,
                    session.tools.len()
                );
                Ok(session)
            }
            Ok(Err(e)) => {
                let tail = handle.stderr_tail().await;
                if !tail.is_empty() {
                    tracing::debug!(worker = %worker, "stderr before failure:\n{}", tail.join("\n"));
                }
                Err(handshake_err(e.to_string()))
            }
            Err(_) => Err(handshake_err(format!("no response within {:?}", timeout))),
        }
    }

    /// Wrap an already connected peer. Tools are empty until
    /// [`Session::refresh_tools`] runs.
    pub fn new(worker: &str, capabilities: Capabilities, peer: Box<dyn ToolPeer>) -> Self {
        Self {
            worker: worker.to_string(),
            capabilities,
            tools: Vec::new(),
            peer: Mutex::new(Some(peer)),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn worker(&self) -> &str {
        &self.worker
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Tools discovered at the last refresh
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name == name)
    }

    /// Ask the worker for its current tool list without caching it
    pub async fn list_tools(&self) -> std::result::Result<Vec<ToolDescriptor>, PeerError> {
        let guard = self.peer.lock().await;
        let peer = guard.as_ref().ok_or(PeerError::Closed)?;
        let remote = peer.list_tools().await?;
        Ok(remote
            .into_iter()
            .map(|t| ToolDescriptor::from_remote(&self.worker, t, self.capabilities))
            .collect())
    }

    /// Re-query the worker and replace the cached tool list
    pub async fn refresh_tools(&mut self) -> std::result::Result<(), PeerError> {
        self.tools = self.list_tools().await?;
        Ok(())
    }

    /// Invoke a tool by its local name, retrying transient failures.
    ///
    /// A result the worker itself flags as an error is returned as-is; only
    /// failures of the exchange are retried.
    pub async fn execute_tool(&self, name: &str, arguments: Value) -> Result<ToolOutput> {
        let arguments = match arguments {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => {
                return Err(self.execution_error(
                    name,
                    0,
                    PeerError::Rejected {
                        code: INVALID_PARAMS,
                        message: format!("arguments must be an object, got {}", other),
                    },
                ))
            }
        };

        let attempts = self.retry.attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                "Calling {}.{} (attempt {}/{})",
                self.worker,
                name,
                attempt,
                attempts
            );

            match self.call_once(name, arguments.clone()).await {
                Ok(output) => return Ok(output),
                Err(e) if e.is_transient() && attempt < attempts => {
                    tracing::warn!(
                        "Tool {}.{} failed (attempt {}/{}): {}; retrying in {:?}",
                        self.worker,
                        name,
                        attempt,
                        attempts,
                        e,
                        self.retry.delay
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(e) => return Err(self.execution_error(name, attempt, e)),
            }
        }
    }

    async fn call_once(
        &self,
        name: &str,
        arguments: Option<serde_json::Map<String, Value>>,
    ) -> std::result::Result<ToolOutput, PeerError> {
        let guard = self.peer.lock().await;
        let peer = guard.as_ref().ok_or(PeerError::Closed)?;
        match tokio::time::timeout(self.call_timeout, peer.call_tool(name, arguments)).await {
            Ok(result) => result,
            Err(_) => Err(PeerError::Timeout(self.call_timeout)),
        }
    }

    fn execution_error(&self, tool: &str, attempts: u32, source: PeerError) -> Error {
        Error::ToolExecution {
            worker: self.worker.clone(),
            tool: tool.to_string(),
            attempts,
            source,
        }
    }

    /// Close the protocol connection. Idempotent; errors are logged.
    pub async fn cleanup(&self) {
        let peer = self.peer.lock().await.take();
        if let Some(mut peer) = peer {
            match peer.close().await {
                Ok(()) => tracing::debug!("Session {} closed", self.worker),
                Err(e) => tracing::warn!("Error closing session {}: {}", self.worker, e),
            }
        }
    }

    /// Whether [`Session::cleanup`] has run
    pub async fn is_closed(&self) -> bool {
        self.peer.lock().await.is_none()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("worker", &self.worker)
            .field("capabilities", &self.capabilities)
            .field("tools", &self.tools.len())
            .finish()
    }
}

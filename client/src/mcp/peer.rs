//! Protocol peer abstraction
//!
//! [`ToolPeer`] is the seam between a session and the wire. [`RmcpPeer`]
//! speaks MCP over a worker's stdin/stdout; tests substitute in-memory peers.

use async_trait::async_trait;
use rmcp::{
    model::{CallToolRequestParam, RawContent},
    service::{RunningService, ServiceError},
    RoleClient, ServiceExt,
};
use serde_json::{Map, Value};

use super::supervisor::WorkerStdio;
use super::types::{Capabilities, RemoteTool, ToolOutput};
use crate::error::PeerError;

/// One live protocol connection to a worker
#[async_trait]
pub trait ToolPeer: Send + Sync {
    /// Fetch the worker's full tool list
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, PeerError>;

    /// Invoke a tool by its local name
    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolOutput, PeerError>;

    /// Close the connection. Further calls fail with [`PeerError::Closed`].
    async fn close(&mut self) -> Result<(), PeerError>;
}

/// MCP client over a worker's standard streams
pub struct RmcpPeer {
    service: Option<RunningService<RoleClient, ()>>,
}

impl RmcpPeer {
    /// Run the initialize handshake and read back negotiated capabilities
    pub async fn connect(stdio: WorkerStdio) -> Result<(Self, Capabilities), PeerError> {
        let service = ()
            .serve((stdio.stdout, stdio.stdin))
            .await
            .map_err(|e| PeerError::Transport(e.to_string()))?;

        let capabilities = service
            .peer_info()
            .and_then(|info| serde_json::to_value(&info.capabilities).ok())
            .map(|value| Capabilities::from_json(&value))
            .unwrap_or_default();

        Ok((
            Self {
                service: Some(service),
            },
            capabilities,
        ))
    }

    fn service(&self) -> Result<&RunningService<RoleClient, ()>, PeerError> {
        self.service.as_ref().ok_or(PeerError::Closed)
    }
}

#[async_trait]
impl ToolPeer for RmcpPeer {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, PeerError> {
        let tools = self
            .service()?
            .list_all_tools()
            .await
            .map_err(classify)?;

        Ok(tools
            .into_iter()
            .map(|t| RemoteTool {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()),
                input_schema: Value::Object((*t.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolOutput, PeerError> {
        let result = self
            .service()?
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments,
                task: None,
            })
            .await
            .map_err(classify)?;

        let content = result
            .content
            .into_iter()
            .map(|c| match c.raw {
                RawContent::Text(t) => t.text,
                other => serde_json::to_string(&other).unwrap_or_default(),
            })
            .collect();

        Ok(ToolOutput {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(&mut self) -> Result<(), PeerError> {
        match self.service.take() {
            Some(service) => service
                .cancel()
                .await
                .map(|_| ())
                .map_err(|e| PeerError::Transport(e.to_string())),
            None => Ok(()),
        }
    }
}

fn classify(err: ServiceError) -> PeerError {
    match err {
        ServiceError::McpError(data) => PeerError::Rejected {
            code: data.code.0,
            message: data.message.to_string(),
        },
        ServiceError::TransportClosed => PeerError::Closed,
        other => PeerError::Transport(other.to_string()),
    }
}

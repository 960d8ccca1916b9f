//! MCP Server implementation for the task list

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::tasks;

/// Environment variable naming the task file
pub const TASKLIST_FILE_ENV: &str = "TASKLIST_FILE";

/// Task file used when the environment does not name one
pub const DEFAULT_TASKLIST_FILE: &str = "tasks.json";

#[derive(Clone)]
pub struct TasklistMcpServer {
    file: PathBuf,
    tool_router: ToolRouter<Self>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetTasklistParams {
    #[schemars(description = "Task category (Work, Personal, Fitness, Learning, ...) or 'all'")]
    pub category: String,
}

#[tool_router]
impl TasklistMcpServer {
    /// Serve the file named by `TASKLIST_FILE`, else `tasks.json`
    pub fn new() -> Self {
        let file = std::env::var_os(TASKLIST_FILE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TASKLIST_FILE));
        Self::with_file(file)
    }

    pub fn with_file(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            tool_router: Self::tool_router(),
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    #[tool(description = "Get the task list for a category. Use 'all' to list every task.")]
    async fn get_tasklist(
        &self,
        Parameters(params): Parameters<GetTasklistParams>,
    ) -> Result<CallToolResult, McpError> {
        tracing::debug!(category = %params.category, file = %self.file.display(), "get_tasklist");

        match tasks::load(&self.file).await {
            Ok(all) => Ok(CallToolResult::success(vec![Content::text(
                tasks::render(&all, &params.category),
            )])),
            Err(e) => {
                tracing::warn!("{}", e);
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

#[tool_handler]
impl rmcp::ServerHandler for TasklistMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Task list MCP Server - look up tasks by category with get_tasklist.".into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

impl Default for TasklistMcpServer {
    fn default() -> Self {
        Self::new()
    }
}

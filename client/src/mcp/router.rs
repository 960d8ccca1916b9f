//! Namespaced tool dispatch

use std::collections::BTreeMap;

use serde_json::Value;

use super::registry::ToolRegistry;
use super::session::Session;
use super::types::{split_namespaced, ToolOutput, NAMESPACE_SEPARATOR};
use crate::error::{Error, Result};

/// Owns the live sessions and the registry built from them
#[derive(Debug, Default)]
pub struct CallRouter {
    sessions: BTreeMap<String, Session>,
    registry: ToolRegistry,
}

impl CallRouter {
    pub fn new(sessions: BTreeMap<String, Session>) -> Self {
        let registry = ToolRegistry::aggregate(&sessions);
        Self { sessions, registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &BTreeMap<String, Session> {
        &self.sessions
    }

    /// Resolve a namespaced name to its session and local tool name
    pub fn resolve<'a>(&self, namespaced: &'a str) -> Result<(&Session, &'a str)> {
        let routing_err = |reason: String| Error::Routing {
            name: namespaced.to_string(),
            reason,
        };

        let (worker, local) = split_namespaced(namespaced).ok_or_else(|| {
            routing_err(format!(
                "expected '<worker>{}<tool>'",
                NAMESPACE_SEPARATOR
            ))
        })?;

        let session = self
            .sessions
            .get(worker)
            .ok_or_else(|| routing_err(format!("unknown worker '{}'", worker)))?;

        if !session.has_tool(local) {
            return Err(routing_err(format!(
                "worker '{}' has no tool '{}'",
                worker, local
            )));
        }

        Ok((session, local))
    }

    /// Dispatch a call to the owning session
    pub async fn route(&self, namespaced: &str, arguments: Value) -> Result<ToolOutput> {
        let (session, local) = self.resolve(namespaced)?;
        tracing::debug!("Routing {} to worker {}", namespaced, session.worker());
        session.execute_tool(local, arguments).await
    }

    /// Re-query every session's tool list and rebuild the registry.
    /// A session that fails to answer keeps its previous list.
    pub async fn refresh(&mut self) {
        for session in self.sessions.values_mut() {
            if let Err(e) = session.refresh_tools().await {
                tracing::warn!("Failed to refresh tools for {}: {}", session.worker(), e);
            }
        }
        self.registry = ToolRegistry::aggregate(&self.sessions);
    }
}

//! Top-level owner of workers and sessions
//!
//! [`ToolHub::start`] runs supervisor → connect → aggregate.
//! [`ToolHub::shutdown`] must be awaited on every exit path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::cleanup;
use super::connect::{connect_all, SessionOptions, DEFAULT_CONNECT_TIMEOUT};
use super::registry::ToolRegistry;
use super::router::CallRouter;
use super::supervisor::{ProcessSupervisor, WorkerHandle};
use crate::config::McpConfig;

#[derive(Debug, Clone, Copy)]
pub struct HubOptions {
    pub connect_timeout: Duration,
    pub session: SessionOptions,
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            session: SessionOptions::default(),
        }
    }
}

pub struct ToolHub {
    supervisor: ProcessSupervisor,
    handles: BTreeMap<String, WorkerHandle>,
    router: CallRouter,
    shut_down: AtomicBool,
}

impl ToolHub {
    /// Launch and connect every configured worker. Never fails: workers
    /// that cannot start or connect are left out.
    pub async fn start(config: &McpConfig, options: HubOptions) -> Self {
        Self::start_with(ProcessSupervisor::new(), config, options).await
    }

    pub async fn start_with(
        supervisor: ProcessSupervisor,
        config: &McpConfig,
        options: HubOptions,
    ) -> Self {
        let report = supervisor.start(&config.mcp_servers).await;
        let sessions = connect_all(&report.handles, options.connect_timeout, options.session).await;

        // A worker without a session is of no use; stop it now
        let (handles, orphans): (BTreeMap<_, _>, BTreeMap<_, _>) = report
            .handles
            .into_iter()
            .partition(|(name, _)| sessions.contains_key(name));
        if !orphans.is_empty() {
            tracing::debug!("Stopping {} workers without a session", orphans.len());
            supervisor.stop(&orphans).await;
        }

        Self::from_parts(supervisor, handles, CallRouter::new(sessions))
    }

    /// Assemble a hub from already prepared parts
    pub fn from_parts(
        supervisor: ProcessSupervisor,
        handles: BTreeMap<String, WorkerHandle>,
        router: CallRouter,
    ) -> Self {
        Self {
            supervisor,
            handles,
            router,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn router(&self) -> &CallRouter {
        &self.router
    }

    pub fn router_mut(&mut self) -> &mut CallRouter {
        &mut self.router
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.router.registry()
    }

    pub fn worker_count(&self) -> usize {
        self.router.sessions().len()
    }

    /// Release all sessions and workers. Only the first call does any work.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already performed");
            return;
        }
        cleanup::shutdown(self.router.sessions(), &self.handles, &self.supervisor).await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl Drop for ToolHub {
    fn drop(&mut self) {
        if !self.is_shut_down() && !self.handles.is_empty() {
            // kill_on_drop still reaps the children
            tracing::warn!("Tool hub dropped without shutdown; killing workers");
        }
    }
}

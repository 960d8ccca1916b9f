//! Ordered teardown: sessions first, then worker processes

use std::collections::BTreeMap;

use futures_util::future::join_all;

use super::session::Session;
use super::supervisor::{ProcessSupervisor, WorkerHandle};

/// Release every session, then stop every worker. Never fails; each resource
/// is released independently of the others.
pub async fn shutdown(
    sessions: &BTreeMap<String, Session>,
    handles: &BTreeMap<String, WorkerHandle>,
    supervisor: &ProcessSupervisor,
) {
    tracing::debug!(
        "Shutting down {} sessions and {} workers",
        sessions.len(),
        handles.len()
    );

    join_all(sessions.values().map(Session::cleanup)).await;
    supervisor.stop(handles).await;

    tracing::info!("Shutdown complete");
}

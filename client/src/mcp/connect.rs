//! Concurrent session establishment
//!
//! One bounded connection attempt per worker, all running at once. Each
//! attempt returns its own result; the session map is assembled only after
//! every attempt has finished.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use futures_util::future::join_all;

use super::session::{RetryPolicy, Session, DEFAULT_CALL_TIMEOUT};
use super::supervisor::WorkerHandle;
use crate::error::{Error, Result};

/// Default per-worker connect timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings applied to every session created by [`connect_all`]
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// Connect to every running worker, keeping the sessions that succeed
pub async fn connect_all(
    handles: &BTreeMap<String, WorkerHandle>,
    per_worker_timeout: Duration,
    options: SessionOptions,
) -> BTreeMap<String, Session> {
    connect_all_with(handles.keys().cloned(), per_worker_timeout, |name| {
        let handle = handles.get(&name);
        async move {
            let handle = handle.ok_or_else(|| Error::Handshake {
                worker: name.clone(),
                reason: "no running process".into(),
            })?;
            let session = Session::initialize(handle, per_worker_timeout).await?;
            Ok(session
                .with_call_timeout(options.call_timeout)
                .with_retry(options.retry))
        }
    })
    .await
}

/// Run `connect` for every name concurrently, each bounded by `timeout`.
///
/// Returns within roughly `timeout` regardless of how many names are given.
/// Failures and timeouts are logged and left out of the result.
pub async fn connect_all_with<I, F, Fut>(
    names: I,
    timeout: Duration,
    connect: F,
) -> BTreeMap<String, Session>
where
    I: IntoIterator<Item = String>,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<Session>>,
{
    let attempts = names.into_iter().map(|name| {
        let attempt = connect(name.clone());
        async move {
            let outcome = match tokio::time::timeout(timeout, attempt).await {
                Ok(result) => result,
                Err(_) => Err(Error::Handshake {
                    worker: name.clone(),
                    reason: format!("no response within {:?}", timeout),
                }),
            };
            (name, outcome)
        }
    });

    let outcomes = join_all(attempts).await;
    let total = outcomes.len();

    let mut sessions = BTreeMap::new();
    for (name, outcome) in outcomes {
        match outcome {
            Ok(session) => {
                sessions.insert(name, session);
            }
            Err(e) => tracing::warn!("{}", e),
        }
    }

    tracing::info!("Connected to {}/{} workers", sessions.len(), total);
    if sessions.is_empty() && total > 0 {
        tracing::warn!("No worker sessions established; no tools available");
    }

    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::session::testing::ScriptedPeer;
    use crate::mcp::types::Capabilities;

    async fn fake_session(name: &str) -> Result<Session> {
        let peer = ScriptedPeer::with_tools(name, &["echo"]);
        let mut session = Session::new(name, Capabilities::TOOLS, Box::new(peer));
        session
            .refresh_tools()
            .await
            .map_err(|e| Error::Handshake {
                worker: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(session)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_wedged_worker_does_not_block_siblings() {
        let started = tokio::time::Instant::now();
        let sessions = connect_all_with(
            names(&["fast", "wedged", "slow"]),
            Duration::from_secs(5),
            |name| async move {
                match name.as_str() {
                    "wedged" => std::future::pending().await,
                    "slow" => {
                        tokio::time::sleep(Duration::from_secs(3)).await;
                        fake_session(&name).await
                    }
                    _ => fake_session(&name).await,
                }
            },
        )
        .await;

        assert_eq!(sessions.keys().collect::<Vec<_>>(), vec!["fast", "slow"]);
        // Bounded by the timeout, not by the sum of waits
        assert!(started.elapsed() <= Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_run_in_parallel() {
        let started = tokio::time::Instant::now();
        let sessions = connect_all_with(
            names(&["a", "b", "c", "d", "e", "f"]),
            Duration::from_secs(10),
            |name| async move {
                tokio::time::sleep(Duration::from_secs(4)).await;
                fake_session(&name).await
            },
        )
        .await;

        assert_eq!(sessions.len(), 6);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_failures_are_dropped() {
        let sessions = connect_all_with(
            names(&["ok", "broken"]),
            Duration::from_secs(1),
            |name| async move {
                if name == "broken" {
                    Err(Error::Handshake {
                        worker: name,
                        reason: "initialize rejected".into(),
                    })
                } else {
                    fake_session(&name).await
                }
            },
        )
        .await;

        assert_eq!(sessions.len(), 1);
        assert!(sessions.contains_key("ok"));
    }

    #[tokio::test]
    async fn test_no_workers_is_empty_not_error() {
        let sessions = connect_all(&BTreeMap::new(), Duration::from_secs(1), SessionOptions::default()).await;
        assert!(sessions.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_workers_time_out_in_parallel() {
        use crate::config::WorkerConfig;
        use crate::mcp::supervisor::ProcessSupervisor;

        // `sleep` never answers initialize
        let workers: BTreeMap<String, WorkerConfig> = ["one", "two", "three"]
            .iter()
            .map(|n| {
                (
                    n.to_string(),
                    WorkerConfig {
                        command: "sleep".into(),
                        args: vec!["30".into()],
                        env: Default::default(),
                    },
                )
            })
            .collect();

        let supervisor = ProcessSupervisor::new()
            .with_launch_grace(Duration::from_millis(50))
            .with_stop_grace(Duration::from_millis(500));
        let report = supervisor.start(&workers).await;
        assert_eq!(report.handles.len(), 3);

        let started = std::time::Instant::now();
        let sessions = connect_all(
            &report.handles,
            Duration::from_millis(500),
            SessionOptions::default(),
        )
        .await;
        let elapsed = started.elapsed();

        assert!(sessions.is_empty());
        assert!(elapsed < Duration::from_millis(1400), "took {elapsed:?}");

        supervisor.stop(&report.handles).await;
    }
}

//! Worker process supervision
//!
//! Launches configured workers with piped standard streams, rejects workers
//! that exit during a short grace interval, and stops them on shutdown
//! (SIGTERM, then SIGKILL after a grace period).

use std::collections::{BTreeMap, VecDeque};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::WorkerConfig;
use crate::error::{Error, Result};

/// Wait after spawn before probing whether the worker already died
pub const DEFAULT_LAUNCH_GRACE: Duration = Duration::from_millis(200);

/// Wait after SIGTERM before force-killing
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(5);

/// Stderr lines kept per worker for diagnostics
const STDERR_TAIL_LINES: usize = 20;

/// The protocol end of a worker's standard streams
pub struct WorkerStdio {
    pub stdout: ChildStdout,
    pub stdin: ChildStdin,
}

/// Last lines a worker wrote to stderr
#[derive(Clone, Default)]
struct StderrTail(Arc<Mutex<VecDeque<String>>>);

impl StderrTail {
    async fn push(&self, line: String) {
        let mut lines = self.0.lock().await;
        if lines.len() == STDERR_TAIL_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    async fn snapshot(&self) -> Vec<String> {
        self.0.lock().await.iter().cloned().collect()
    }
}

/// One running worker process
pub struct WorkerHandle {
    name: String,
    pid: Option<u32>,
    child: Mutex<Option<Child>>,
    stdio: Mutex<Option<WorkerStdio>>,
    stderr_tail: StderrTail,
    stderr_task: Option<JoinHandle<()>>,
    alive: AtomicBool,
}

impl WorkerHandle {
    fn new(name: &str, mut child: Child) -> Self {
        let stdio = match (child.stdout.take(), child.stdin.take()) {
            (Some(stdout), Some(stdin)) => Some(WorkerStdio { stdout, stdin }),
            _ => None,
        };
        let stderr_tail = StderrTail::default();
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| spawn_stderr_drain(name.to_string(), stderr, stderr_tail.clone()));

        Self {
            name: name.to_string(),
            pid: child.id(),
            child: Mutex::new(Some(child)),
            stdio: Mutex::new(stdio),
            stderr_tail,
            stderr_task,
            alive: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Last known liveness, without probing the process
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Probe the process and update the liveness flag
    pub async fn check_alive(&self) -> bool {
        let mut guard = self.child.lock().await;
        let alive = match guard.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        };
        self.alive.store(alive, Ordering::SeqCst);
        alive
    }

    /// Hand the stdin/stdout pair to a session. Only the first caller gets it.
    pub async fn take_stdio(&self) -> Option<WorkerStdio> {
        self.stdio.lock().await.take()
    }

    /// Recent stderr output, oldest first
    pub async fn stderr_tail(&self) -> Vec<String> {
        self.stderr_tail.snapshot().await
    }

    /// Terminate the process: SIGTERM, wait up to `grace`, then kill.
    ///
    /// Safe to call repeatedly; only the first call touches the process.
    pub async fn stop(&self, grace: Duration) -> std::io::Result<()> {
        let mut guard = self.child.lock().await;
        let Some(mut child) = guard.take() else {
            return Ok(());
        };
        self.alive.store(false, Ordering::SeqCst);

        // Closing stdin lets well-behaved workers exit on their own
        self.stdio.lock().await.take();

        if let Ok(Some(status)) = child.try_wait() {
            tracing::debug!("Worker '{}' already exited ({})", self.name, status);
            self.abort_stderr_drain();
            return Ok(());
        }

        request_terminate(&mut child);

        let result = match tokio::time::timeout(grace, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::info!("Worker '{}' stopped ({})", self.name, status);
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::warn!(
                    "Worker '{}' did not exit within {:?}, killing",
                    self.name,
                    grace
                );
                child.kill().await
            }
        };

        self.abort_stderr_drain();
        result
    }

    fn abort_stderr_drain(&self) {
        if let Some(task) = &self.stderr_task {
            task.abort();
        }
    }
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("name", &self.name)
            .field("pid", &self.pid)
            .field("alive", &self.is_alive())
            .finish()
    }
}

fn spawn_stderr_drain(worker: String, stderr: ChildStderr, tail: StderrTail) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(worker = %worker, "{}", line);
            tail.push(line).await;
        }
    })
}

/// Stderr of a worker that already exited.
///
/// A grandchild can hold the pipe open after the worker is gone, so the read
/// stops at `limit` and keeps whatever arrived by then.
async fn early_exit_stderr(child: &mut Child, limit: Duration) -> String {
    let Some(mut stderr) = child.stderr.take() else {
        return String::new();
    };
    let mut buf = Vec::new();
    let read = async {
        let mut chunk = [0u8; 4096];
        loop {
            match stderr.read(&mut chunk).await {
                Ok(0) => return Ok(()),
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) => return Err(e),
            }
        }
    };
    match tokio::time::timeout(limit, read).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!("Failed to read stderr of exited worker: {}", e),
        Err(_) => tracing::debug!("Stderr of exited worker still open after {:?}", limit),
    }
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(unix)]
fn request_terminate(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: pid belongs to a child we have not yet reaped
        let _ = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
    }
}

#[cfg(not(unix))]
fn request_terminate(child: &mut Child) {
    let _ = child.start_kill();
}

/// Outcome of launching a worker set
#[derive(Debug, Default)]
pub struct LaunchReport {
    pub handles: BTreeMap<String, WorkerHandle>,
    pub failures: Vec<Error>,
}

/// Starts and stops worker processes
#[derive(Debug, Clone)]
pub struct ProcessSupervisor {
    launch_grace: Duration,
    stop_grace: Duration,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self {
            launch_grace: DEFAULT_LAUNCH_GRACE,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    pub fn with_launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }

    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// Launch every configured worker. Failures are collected, not raised;
    /// an empty handle map means no tools are available.
    pub async fn start(&self, workers: &BTreeMap<String, WorkerConfig>) -> LaunchReport {
        let mut report = LaunchReport::default();

        for (name, config) in workers {
            match self.launch(name, config).await {
                Ok(handle) => {
                    report.handles.insert(name.clone(), handle);
                }
                Err(e) => {
                    tracing::warn!("{}", e);
                    report.failures.push(e);
                }
            }
        }

        tracing::info!(
            "Worker launch summary: {} started, {} failed",
            report.handles.len(),
            report.failures.len()
        );
        if report.handles.is_empty() && !workers.is_empty() {
            tracing::warn!("No worker started; continuing without tools");
        }

        report
    }

    /// Launch one worker
    pub async fn launch(&self, name: &str, config: &WorkerConfig) -> Result<WorkerHandle> {
        let launch_err = |reason: String| Error::WorkerLaunch {
            worker: name.to_string(),
            reason,
        };

        let program = which::which(&config.command).map_err(|e| {
            launch_err(format!(
                "command '{}' not found on PATH ({})",
                config.command, e
            ))
        })?;

        tracing::info!("Starting worker {}: {}", name, config.display_command());

        let mut cmd = Command::new(program);
        cmd.args(&config.args)
            .envs(config.expanded_env())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| launch_err(format!("spawn failed: {}", e)))?;

        tokio::time::sleep(self.launch_grace).await;

        match child.try_wait() {
            Ok(None) => {}
            Ok(Some(status)) => {
                let stderr = early_exit_stderr(&mut child, self.stop_grace).await;
                tracing::debug!(worker = %name, stderr = %stderr.trim(), "early exit output");
                return Err(launch_err(format!(
                    "exited immediately ({}): {}",
                    status,
                    stderr.trim()
                )));
            }
            Err(e) => return Err(launch_err(format!("liveness check failed: {}", e))),
        }

        let handle = WorkerHandle::new(name, child);
        tracing::info!("Worker {} started, pid {:?}", name, handle.pid());
        Ok(handle)
    }

    /// Stop every handle independently; failures are logged, never raised
    pub async fn stop(&self, handles: &BTreeMap<String, WorkerHandle>) {
        if handles.is_empty() {
            tracing::debug!("No workers to stop");
            return;
        }

        let stops = handles.values().map(|handle| async move {
            tracing::debug!("Stopping worker {}", handle.name());
            if let Err(e) = handle.stop(self.stop_grace).await {
                tracing::warn!("Failed to stop worker '{}': {}", handle.name(), e);
            }
        });
        join_all(stops).await;
    }
}

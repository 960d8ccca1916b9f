//! E2E test: launch, connect, call and shut down a real worker

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use multi_mcp::config::{McpConfig, WorkerConfig};
use multi_mcp::mcp::{HubOptions, ToolHub};
use multi_mcp::{Error, PeerError};
use serde_json::json;

use super::prerequisites::{sample_tasks, tasklist_binary};

fn worker_config(name: &str, tasks_file: &str) -> McpConfig {
    let binary = tasklist_binary().expect("tasklist-mcp not built (run: cargo build --workspace)");
    McpConfig {
        mcp_servers: BTreeMap::from([(
            name.to_string(),
            WorkerConfig {
                command: binary.display().to_string(),
                args: Vec::new(),
                env: HashMap::from([("TASKLIST_FILE".to_string(), tasks_file.to_string())]),
            },
        )]),
    }
}

#[tokio::test]
#[ignore = "requires built tasklist-mcp"]
async fn test_tasklist_round_trip() {
    let tasks = sample_tasks().display().to_string();
    let hub = ToolHub::start(&worker_config("tasks", &tasks), HubOptions::default()).await;

    assert_eq!(hub.worker_count(), 1);
    assert!(hub.registry().get("tasks.get_tasklist").is_some());

    let output = hub
        .router()
        .route("tasks.get_tasklist", json!({"category": "work"}))
        .await
        .expect("call failed");
    let text = output.joined();
    println!("{}", text);
    assert!(!output.is_error);
    assert!(text.starts_with("Tasks for category 'work':"));
    assert!(text.contains("Quarterly report"));

    hub.shutdown().await;
    hub.shutdown().await;
    assert!(hub.is_shut_down());
}

#[tokio::test]
#[ignore = "requires built tasklist-mcp"]
async fn test_missing_task_file_is_reported_by_worker() {
    let hub = ToolHub::start(
        &worker_config("tasks", "/nonexistent/tasks.json"),
        HubOptions::default(),
    )
    .await;

    let output = hub
        .router()
        .route("tasks.get_tasklist", json!({"category": "all"}))
        .await
        .expect("call failed");
    assert!(output.is_error);
    assert!(output.joined().contains("Task file not found"));

    hub.shutdown().await;
}

#[tokio::test]
#[ignore = "requires built tasklist-mcp"]
async fn test_unknown_tool_is_not_retried() {
    let hub = ToolHub::start(
        &worker_config("tasks", &sample_tasks().display().to_string()),
        HubOptions::default(),
    )
    .await;

    let session = &hub.router().sessions()["tasks"];
    let started = std::time::Instant::now();
    let err = session
        .execute_tool("no_such_tool", json!({}))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        Error::ToolExecution {
            attempts: 1,
            source: PeerError::Rejected { .. },
            ..
        }
    ));
    assert!(started.elapsed() < Duration::from_secs(1));

    hub.shutdown().await;
}

//! Orchestration tests through the public API
//!
//! Workers and the model are in-memory fakes; no processes or network.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use multi_mcp::conversation::Conversation;
use multi_mcp::llm::{ModelClient, ModelReply, Role, ToolSpec, ToolUse, Turn};
use multi_mcp::mcp::{
    CallRouter, Capabilities, ProcessSupervisor, RemoteTool, RetryPolicy, Session, ToolHub,
    ToolOutput, ToolPeer,
};
use multi_mcp::{Error, PeerError};

/// Echoes `<worker>:<text>` unless a failure is queued
#[derive(Clone)]
struct FakeWorker {
    label: String,
    tools: Vec<String>,
    failures: Arc<Mutex<VecDeque<PeerError>>>,
    calls: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
}

impl FakeWorker {
    fn new(label: &str, tools: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            tools: tools.iter().map(|t| t.to_string()).collect(),
            failures: Arc::default(),
            calls: Arc::default(),
            closes: Arc::default(),
        }
    }

    fn fail_next(&self, error: PeerError) {
        self.failures.lock().unwrap().push_back(error);
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }

    async fn session(&self) -> Session {
        let mut session = Session::new(&self.label, Capabilities::TOOLS, Box::new(self.clone()))
            .with_retry(RetryPolicy {
                attempts: 2,
                delay: Duration::from_millis(5),
            });
        session.refresh_tools().await.unwrap();
        session
    }
}

#[async_trait]
impl ToolPeer for FakeWorker {
    async fn list_tools(&self) -> Result<Vec<RemoteTool>, PeerError> {
        Ok(self
            .tools
            .iter()
            .map(|name| RemoteTool {
                name: name.clone(),
                description: Some(format!("{} from {}", name, self.label)),
                input_schema: json!({
                    "type": "object",
                    "properties": {"text": {"type": "string"}},
                    "required": ["text"]
                }),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        _name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<ToolOutput, PeerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        let text = arguments
            .as_ref()
            .and_then(|a| a.get("text"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(ToolOutput::text(format!("{}:{}", self.label, text)))
    }

    async fn close(&mut self) -> Result<(), PeerError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Replays canned replies and records every history it was sent
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<ModelReply>>,
    seen: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedModel {
    fn new(replies: impl IntoIterator<Item = ModelReply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            seen: Mutex::default(),
        })
    }

    fn requests(&self) -> Vec<Vec<Turn>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, turns: &[Turn], _tools: &[ToolSpec]) -> multi_mcp::Result<ModelReply> {
        self.seen.lock().unwrap().push(turns.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::ModelTransport("script exhausted".into()))
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

fn tool_use(id: &str, name: &str, arguments: Value) -> ModelReply {
    ModelReply {
        text: String::new(),
        tool_uses: vec![ToolUse {
            id: id.into(),
            name: name.into(),
            arguments,
        }],
    }
}

async fn two_workers() -> (FakeWorker, FakeWorker, CallRouter) {
    let a = FakeWorker::new("A", &["echo"]);
    let b = FakeWorker::new("B", &["echo"]);
    let router = CallRouter::new(BTreeMap::from([
        ("A".to_string(), a.session().await),
        ("B".to_string(), b.session().await),
    ]));
    (a, b, router)
}

#[tokio::test]
async fn test_same_tool_name_on_two_workers_routes_by_namespace() {
    let (a, b, router) = two_workers().await;

    let names: Vec<&str> = router.registry().names().collect();
    assert_eq!(names, vec!["A.echo", "B.echo"]);

    let model = ScriptedModel::new([
        tool_use("t1", "B.echo", json!({"text": "hi"})),
        ModelReply::text("B said hi"),
    ]);
    let mut conversation = Conversation::new(model.clone());

    let exchange = conversation.send(&router, "ask B").await.unwrap();
    assert_eq!(exchange.reply, "B said hi");
    assert_eq!(exchange.rounds, 1);
    assert_eq!(exchange.tool_calls[0].output, "B:hi");
    assert_eq!(a.calls(), 0);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn test_follow_up_request_carries_exactly_one_tool_result() {
    let (_a, _b, router) = two_workers().await;
    let model = ScriptedModel::new([
        tool_use("t1", "A.echo", json!({"text": "ping"})),
        ModelReply::text("pong"),
    ]);
    let mut conversation = Conversation::new(model.clone());

    conversation.send(&router, "ping A").await.unwrap();

    let requests = model.requests();
    assert_eq!(requests.len(), 2);

    let follow_up = &requests[1];
    let results: Vec<&Turn> = follow_up
        .iter()
        .filter(|t| t.role == Role::ToolResult)
        .collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_use_id.as_deref(), Some("t1"));
    assert_eq!(results[0].content, "A:ping");
    assert_eq!(follow_up.last().map(|t| t.role), Some(Role::ToolResult));

    let roles: Vec<Role> = conversation.turns().iter().map(|t| t.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::ToolResult, Role::Assistant]
    );
}

#[tokio::test]
async fn test_transient_failure_succeeds_on_second_attempt() {
    let (_a, b, router) = two_workers().await;
    b.fail_next(PeerError::Transport("broken pipe".into()));

    let output = router.route("B.echo", json!({"text": "again"})).await.unwrap();
    assert_eq!(output.joined(), "B:again");
    assert_eq!(b.calls(), 2);
}

#[tokio::test]
async fn test_failures_never_exceed_attempt_budget() {
    let (_a, b, router) = two_workers().await;
    for _ in 0..5 {
        b.fail_next(PeerError::Timeout(Duration::from_millis(1)));
    }

    let err = router.route("B.echo", json!({"text": "x"})).await.unwrap_err();
    assert!(matches!(err, Error::ToolExecution { attempts: 2, .. }));
    assert_eq!(b.calls(), 2);
}

#[tokio::test]
async fn test_unknown_worker_is_a_routing_error_fed_back_to_model() {
    let (a, b, router) = two_workers().await;
    let model = ScriptedModel::new([
        tool_use("t1", "Z.echo", json!({"text": "?"})),
        ModelReply::text("no such worker"),
    ]);
    let mut conversation = Conversation::new(model.clone());

    let exchange = conversation.send(&router, "ask Z").await.unwrap();
    assert!(exchange.tool_calls[0].is_error);
    assert!(exchange.tool_calls[0].output.contains("unknown worker 'Z'"));
    assert_eq!(a.calls() + b.calls(), 0);
    assert_eq!(exchange.reply, "no such worker");
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (a, b, router) = two_workers().await;
    let hub = ToolHub::from_parts(ProcessSupervisor::new(), BTreeMap::new(), router);

    hub.shutdown().await;
    hub.shutdown().await;

    assert!(hub.is_shut_down());
    assert_eq!(a.closes(), 1);
    assert_eq!(b.closes(), 1);

    let err = hub
        .router()
        .route("A.echo", json!({"text": "late"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ToolExecution {
            source: PeerError::Closed,
            ..
        }
    ));
}

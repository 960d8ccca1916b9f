//! Multi-worker MCP client
//!
//! Launches worker processes, connects a protocol session to each, and
//! exposes their tools under one `worker.tool` namespace.

pub mod cleanup;
pub mod connect;
pub mod hub;
pub mod peer;
pub mod registry;
pub mod router;
pub mod session;
pub mod supervisor;
pub mod types;

pub use connect::{connect_all, connect_all_with, SessionOptions, DEFAULT_CONNECT_TIMEOUT};
pub use hub::{HubOptions, ToolHub};
pub use peer::{RmcpPeer, ToolPeer};
pub use registry::ToolRegistry;
pub use router::CallRouter;
pub use session::{RetryPolicy, Session, DEFAULT_CALL_TIMEOUT};
pub use supervisor::{LaunchReport, ProcessSupervisor, WorkerHandle, WorkerStdio};
pub use types::{
    namespaced, split_namespaced, Capabilities, RemoteTool, ToolDescriptor, ToolOutput,
    ToolParam, NAMESPACE_SEPARATOR,
};

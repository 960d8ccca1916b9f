//! End-to-end tests against the real `tasklist-mcp` worker
//!
//! These tests require the workspace to be built first:
//!
//! ```text
//! cargo build --workspace
//! cargo test --test e2e -- --include-ignored
//! ```

#[path = "e2e/prerequisites.rs"]
mod prerequisites;

#[path = "e2e/tasklist.rs"]
mod tasklist;

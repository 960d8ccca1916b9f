//! Locate the built worker binary and its sample data

use std::path::{Path, PathBuf};

/// Workspace root: the parent of this crate's manifest directory
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(".."))
}

/// Path of the built `tasklist-mcp` binary, debug preferred
pub fn tasklist_binary() -> Option<PathBuf> {
    let root = workspace_root();
    ["debug", "release"]
        .iter()
        .map(|profile| root.join("target").join(profile).join("tasklist-mcp"))
        .find(|p| p.exists())
}

/// Sample task file shipped with the worker
pub fn sample_tasks() -> PathBuf {
    workspace_root().join("mcps/tasklist-mcp/tasks.json")
}

#[test]
#[ignore = "prerequisites check - run first"]
fn test_prerequisites() {
    println!("\n=== E2E Prerequisites Check ===\n");

    let binary = tasklist_binary();
    println!(
        "tasklist-mcp: {}",
        binary
            .as_ref()
            .map(|p| format!("✓ {}", p.display()))
            .unwrap_or_else(|| "✗ Not built (run: cargo build --workspace)".into())
    );
    println!(
        "sample tasks: {}",
        if sample_tasks().exists() { "✓ Found" } else { "✗ Missing" }
    );

    assert!(binary.is_some(), "tasklist-mcp binary not built");
    assert!(sample_tasks().exists(), "sample tasks.json missing");
}

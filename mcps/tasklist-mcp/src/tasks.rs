//! Task file loading and rendering

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Category that selects every task
pub const ALL_CATEGORIES: &str = "all";

#[derive(Debug, Error)]
pub enum TaskFileError {
    #[error("Task file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read task file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse task file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub category: String,
    pub description: String,
    pub due_date: String,
    pub priority: String,
    pub status: String,
}

impl Task {
    fn line(&self) -> String {
        format!(
            "{} - {} (Due: {}, Priority: {}, Status: {})",
            self.name, self.description, self.due_date, self.priority, self.status
        )
    }
}

/// Read the whole task file
pub async fn load(path: &Path) -> Result<Vec<Task>, TaskFileError> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TaskFileError::NotFound(path.to_path_buf()))
        }
        Err(source) => {
            return Err(TaskFileError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&raw).map_err(|source| TaskFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the tasks of one category, matched case-insensitively.
///
/// `all` lists everything and always yields the header, even when empty.
pub fn render(tasks: &[Task], category: &str) -> String {
    let all = category.eq_ignore_ascii_case(ALL_CATEGORIES);
    let lines: Vec<String> = tasks
        .iter()
        .filter(|t| all || t.category.to_lowercase() == category.to_lowercase())
        .map(Task::line)
        .collect();

    if lines.is_empty() && !all {
        return format!("No tasks found for category: {}", category);
    }

    format!("Tasks for category '{}':\n{}", category, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn task(name: &str, category: &str) -> Task {
        Task {
            name: name.into(),
            category: category.into(),
            description: format!("{} details", name),
            due_date: "2025-10-24".into(),
            priority: "High".into(),
            status: "Not Started".into(),
        }
    }

    #[test]
    fn test_render_filters_case_insensitively() {
        let tasks = vec![task("Report", "Work"), task("Run", "Fitness")];
        let out = render(&tasks, "WORK");
        assert_eq!(
            out,
            "Tasks for category 'WORK':\nReport - Report details (Due: 2025-10-24, Priority: High, Status: Not Started)"
        );
    }

    #[test]
    fn test_render_all() {
        let tasks = vec![task("Report", "Work"), task("Run", "Fitness")];
        let out = render(&tasks, "All");
        assert!(out.starts_with("Tasks for category 'All':\n"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_render_empty_category() {
        let tasks = vec![task("Report", "Work")];
        assert_eq!(
            render(&tasks, "Garden"),
            "No tasks found for category: Garden"
        );
        assert_eq!(render(&[], "all"), "Tasks for category 'all':\n");
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.json")).await.unwrap_err();
        assert!(matches!(err, TaskFileError::NotFound(_)));
        assert!(err.to_string().starts_with("Task file not found:"));
    }

    #[tokio::test]
    async fn test_load_parses_entries() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            serde_json::to_string(&vec![task("Report", "Work")]).unwrap()
        )
        .unwrap();

        let tasks = load(file.path()).await.unwrap();
        assert_eq!(tasks, vec![task("Report", "Work")]);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            load(file.path()).await,
            Err(TaskFileError::Parse { .. })
        ));
    }
}

//! Applying agent actions to the workspace.
//!
//! All paths are confined to the workspace root: absolute paths and any
//! parent-directory traversal are rejected before touching the filesystem.
//! Actions are applied strictly in the order the agent emitted them; the
//! controller stops at the first failure.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use crate::agent::Action;
use crate::error::{CyclrError, Result};

/// Applies one action to the workspace
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Returns a short human-readable result for the cycle log
    async fn apply(&self, action: &Action, workspace: &Path) -> Result<String>;
}

/// Filesystem-and-shell executor
#[derive(Debug, Default)]
pub struct FsToolExecutor;

impl FsToolExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a workspace-relative path, rejecting escapes
    fn resolve(workspace: &Path, relative: &str) -> Result<PathBuf> {
        let path = Path::new(relative);
        if path.is_absolute() {
            return Err(CyclrError::Tool(format!(
                "absolute path not allowed: {}",
                relative
            )));
        }
        for component in path.components() {
            if matches!(component, Component::ParentDir) {
                return Err(CyclrError::Tool(format!(
                    "parent traversal not allowed: {}",
                    relative
                )));
            }
        }
        Ok(workspace.join(path))
    }
}

#[async_trait]
impl ToolExecutor for FsToolExecutor {
    async fn apply(&self, action: &Action, workspace: &Path) -> Result<String> {
        match action {
            Action::ReadFile { path } => {
                let full = Self::resolve(workspace, path)?;
                let content = tokio::fs::read_to_string(&full)
                    .await
                    .map_err(|e| CyclrError::Tool(format!("read {}: {}", path, e)))?;
                Ok(content)
            }
            Action::WriteFile { path, content } => {
                let full = Self::resolve(workspace, path)?;
                if let Some(parent) = full.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| CyclrError::Tool(format!("mkdir for {}: {}", path, e)))?;
                }
                tokio::fs::write(&full, content)
                    .await
                    .map_err(|e| CyclrError::Tool(format!("write {}: {}", path, e)))?;
                log::debug!("wrote {} bytes to {}", content.len(), path);
                Ok(format!("wrote {} bytes to {}", content.len(), path))
            }
            Action::Execute { command } => {
                let output = Command::new("sh")
                    .arg("-c")
                    .arg(command)
                    .current_dir(workspace)
                    .output()
                    .await
                    .map_err(|e| CyclrError::Tool(format!("execute `{}`: {}", command, e)))?;

                let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                combined.push_str(&String::from_utf8_lossy(&output.stderr));

                if output.status.success() {
                    Ok(combined)
                } else {
                    Err(CyclrError::Tool(format!(
                        "`{}` exited with {}: {}",
                        command,
                        output.status.code().unwrap_or(-1),
                        combined.trim()
                    )))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let executor = FsToolExecutor::new();

        let write = Action::WriteFile {
            path: "src/lib.rs".to_string(),
            content: "pub fn f() {}".to_string(),
        };
        let result = executor.apply(&write, temp.path()).await.unwrap();
        assert!(result.contains("src/lib.rs"));

        let read = Action::ReadFile {
            path: "src/lib.rs".to_string(),
        };
        let content = executor.apply(&read, temp.path()).await.unwrap();
        assert_eq!(content, "pub fn f() {}");
    }

    #[tokio::test]
    async fn test_write_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let executor = FsToolExecutor::new();

        let write = Action::WriteFile {
            path: "deep/nested/dir/file.txt".to_string(),
            content: "x".to_string(),
        };
        executor.apply(&write, temp.path()).await.unwrap();
        assert!(temp.path().join("deep/nested/dir/file.txt").exists());
    }

    #[tokio::test]
    async fn test_read_missing_file_errors() {
        let temp = TempDir::new().unwrap();
        let executor = FsToolExecutor::new();

        let read = Action::ReadFile {
            path: "nope.txt".to_string(),
        };
        let err = executor.apply(&read, temp.path()).await.unwrap_err();
        assert!(matches!(err, CyclrError::Tool(_)));
    }

    #[tokio::test]
    async fn test_absolute_path_rejected() {
        let temp = TempDir::new().unwrap();
        let executor = FsToolExecutor::new();

        let write = Action::WriteFile {
            path: "/etc/passwd".to_string(),
            content: "x".to_string(),
        };
        let err = executor.apply(&write, temp.path()).await.unwrap_err();
        assert!(err.to_string().contains("absolute path"));
    }

    #[tokio::test]
    async fn test_parent_traversal_rejected() {
        let temp = TempDir::new().unwrap();
        let executor = FsToolExecutor::new();

        let read = Action::ReadFile {
            path: "../outside.txt".to_string(),
        };
        let err = executor.apply(&read, temp.path()).await.unwrap_err();
        assert!(err.to_string().contains("parent traversal"));

        let sneaky = Action::ReadFile {
            path: "ok/../../outside.txt".to_string(),
        };
        assert!(executor.apply(&sneaky, temp.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_execute_captures_output() {
        let temp = TempDir::new().unwrap();
        let executor = FsToolExecutor::new();

        let action = Action::Execute {
            command: "echo hello".to_string(),
        };
        let output = executor.apply(&action, temp.path()).await.unwrap();
        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_execute_runs_in_workspace() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("marker"), "").unwrap();
        let executor = FsToolExecutor::new();

        let action = Action::Execute {
            command: "test -f marker".to_string(),
        };
        assert!(executor.apply(&action, temp.path()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_failure_is_error() {
        let temp = TempDir::new().unwrap();
        let executor = FsToolExecutor::new();

        let action = Action::Execute {
            command: "echo boom >&2; exit 7".to_string(),
        };
        let err = executor.apply(&action, temp.path()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exited with 7"));
        assert!(message.contains("boom"));
    }
}

//! Workspace checkpointing through git.
//!
//! The checkpoint after each cycle is what makes loops resumable: a crashed
//! or preempted run restarts from the last committed tree, and the persisted
//! record's ordering guarantee (checkpoint before persist) means the durable
//! cycle count never runs ahead of the workspace.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{CyclrError, Result};

/// Version-control operations the controller needs
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Stage everything and commit. Returns the new commit id, or None when
    /// the workspace had no changes to record.
    async fn commit(&self, workspace: &Path, message: &str) -> Result<Option<String>>;

    /// Whether the workspace has uncommitted changes
    async fn has_changes(&self, workspace: &Path) -> Result<bool>;

    /// Whether the workspace directory still exists on disk
    fn workspace_exists(&self, workspace: &Path) -> bool;
}

/// Git implementation shelling out to the `git` binary
#[derive(Debug, Default)]
pub struct GitVcs;

impl GitVcs {
    pub fn new() -> Self {
        Self
    }

    async fn git(&self, workspace: &Path, args: &[&str]) -> Result<std::process::Output> {
        let output = Command::new("git")
            .args(args)
            .current_dir(workspace)
            .output()
            .await
            .map_err(|e| CyclrError::Vcs(format!("failed to run git: {}", e)))?;
        Ok(output)
    }
}

#[async_trait]
impl Vcs for GitVcs {
    async fn commit(&self, workspace: &Path, message: &str) -> Result<Option<String>> {
        let add = self.git(workspace, &["add", "-A"]).await?;
        if !add.status.success() {
            return Err(CyclrError::Vcs(format!(
                "git add failed: {}",
                String::from_utf8_lossy(&add.stderr).trim()
            )));
        }

        let commit = self.git(workspace, &["commit", "-m", message]).await?;
        if !commit.status.success() {
            let stdout = String::from_utf8_lossy(&commit.stdout);
            let stderr = String::from_utf8_lossy(&commit.stderr);
            // Empty tree is a no-op, not an error
            if stdout.contains("nothing to commit") || stderr.contains("nothing to commit") {
                return Ok(None);
            }
            return Err(CyclrError::Vcs(format!(
                "git commit failed: {}",
                stderr.trim()
            )));
        }

        let head = self.git(workspace, &["rev-parse", "HEAD"]).await?;
        if !head.status.success() {
            return Err(CyclrError::Vcs("git rev-parse HEAD failed".to_string()));
        }
        let id = String::from_utf8_lossy(&head.stdout).trim().to_string();
        log::debug!("checkpoint {} in {}", id, workspace.display());
        Ok(Some(id))
    }

    async fn has_changes(&self, workspace: &Path) -> Result<bool> {
        let status = self.git(workspace, &["status", "--porcelain"]).await?;
        if !status.status.success() {
            return Err(CyclrError::Vcs(format!(
                "git status failed: {}",
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }
        Ok(!status.stdout.is_empty())
    }

    fn workspace_exists(&self, workspace: &Path) -> bool {
        workspace.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn init_repo() -> TempDir {
        let temp = TempDir::new().unwrap();
        let run = |args: &[&str]| {
            let path = temp.path().to_path_buf();
            let args: Vec<String> = args.iter().map(|s| s.to_string()).collect();
            async move {
                let out = Command::new("git")
                    .args(&args)
                    .current_dir(&path)
                    .output()
                    .await
                    .unwrap();
                assert!(out.status.success(), "git {:?} failed", args);
            }
        };
        run(&["init"]).await;
        run(&["config", "user.email", "test@example.com"]).await;
        run(&["config", "user.name", "Test"]).await;
        temp
    }

    #[tokio::test]
    async fn test_commit_returns_id() {
        let repo = init_repo().await;
        std::fs::write(repo.path().join("file.txt"), "hello").unwrap();

        let vcs = GitVcs::new();
        let id = vcs.commit(repo.path(), "checkpoint 1").await.unwrap();
        assert!(id.is_some());
        assert_eq!(id.unwrap().len(), 40);
    }

    #[tokio::test]
    async fn test_commit_without_changes_is_noop() {
        let repo = init_repo().await;
        std::fs::write(repo.path().join("file.txt"), "hello").unwrap();

        let vcs = GitVcs::new();
        vcs.commit(repo.path(), "first").await.unwrap();
        let second = vcs.commit(repo.path(), "second").await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn test_has_changes() {
        let repo = init_repo().await;
        let vcs = GitVcs::new();

        std::fs::write(repo.path().join("file.txt"), "hello").unwrap();
        assert!(vcs.has_changes(repo.path()).await.unwrap());

        vcs.commit(repo.path(), "checkpoint").await.unwrap();
        assert!(!vcs.has_changes(repo.path()).await.unwrap());
    }

    #[tokio::test]
    async fn test_workspace_exists() {
        let repo = init_repo().await;
        let vcs = GitVcs::new();

        assert!(vcs.workspace_exists(repo.path()));
        assert!(!vcs.workspace_exists(Path::new("/nonexistent/workspace")));
    }
}

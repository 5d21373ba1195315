//! git backend driven through the `git` command-line tool

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hosthoover_exec::{CommandResult, LocalExecutor};
use tracing::{debug, info, instrument};

use crate::error::VcsError;
use crate::traits::{CommitResult, Committer};

/// Commits backups to an existing git work tree
#[derive(Debug, Clone)]
pub struct GitCommitter {
    /// Work tree root (or any directory inside it)
    repo_dir: PathBuf,
    executor: LocalExecutor,
}

impl GitCommitter {
    /// Create a committer for the work tree containing `repo_dir`
    pub fn new(repo_dir: impl Into<PathBuf>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            executor: LocalExecutor::new(),
        }
    }

    /// Directory git runs against
    #[must_use]
    pub fn repo_dir(&self) -> &Path {
        &self.repo_dir
    }

    /// Verify git is installed and `repo_dir` is inside a work tree
    ///
    /// # Errors
    /// Returns `VcsError::GitNotFound` or `VcsError::NotARepository`
    pub async fn ensure_repository(&self) -> Result<(), VcsError> {
        if LocalExecutor::find_program("git").is_none() {
            return Err(VcsError::GitNotFound);
        }
        let result = self.git(&["rev-parse", "--is-inside-work-tree"]).await?;
        if !result.success() || result.stdout.trim() != "true" {
            return Err(VcsError::NotARepository(self.repo_dir.display().to_string()));
        }
        Ok(())
    }

    async fn git(&self, args: &[&str]) -> Result<CommandResult, VcsError> {
        let repo = self.repo_dir.to_string_lossy();
        let mut full_args = vec!["-C", repo.as_ref()];
        full_args.extend_from_slice(args);
        self.executor
            .run("git", &full_args)
            .await
            .map_err(|e| VcsError::ExecutionError(e.to_string()))
    }

    fn relative_to_repo(&self, path: &Path) -> Result<String, VcsError> {
        let repo = std::path::absolute(&self.repo_dir)
            .map_err(|e| VcsError::ExecutionError(e.to_string()))?;
        let full = std::path::absolute(path).map_err(|e| VcsError::ExecutionError(e.to_string()))?;
        full.strip_prefix(&repo)
            .map(|rel| rel.to_string_lossy().to_string())
            .map_err(|_| VcsError::PathOutsideRepository(path.display().to_string()))
    }
}

#[async_trait]
impl Committer for GitCommitter {
    #[instrument(skip(self, paths), fields(repo = %self.repo_dir.display(), files = paths.len()))]
    async fn stage(&self, paths: &[PathBuf]) -> Result<(), VcsError> {
        if paths.is_empty() {
            return Ok(());
        }

        let relative = paths
            .iter()
            .map(|p| self.relative_to_repo(p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut args = vec!["add", "--"];
        args.extend(relative.iter().map(String::as_str));

        let result = self.git(&args).await?;
        if !result.success() {
            return Err(VcsError::CommandFailed {
                command: "add".to_string(),
                status: result.status,
                message: result.combined_output(),
            });
        }

        debug!(files = paths.len(), "staged files");
        Ok(())
    }

    #[instrument(skip(self, message), fields(repo = %self.repo_dir.display()))]
    async fn commit(&self, message: &str) -> Result<CommitResult, VcsError> {
        let staged = self.git(&["diff", "--cached", "--quiet"]).await?;
        if staged.success() {
            info!("nothing to commit");
            return Ok(CommitResult::NothingToCommit);
        }

        let result = self.git(&["commit", "--quiet", "-m", message]).await?;
        if !result.success() {
            return Err(VcsError::CommandFailed {
                command: "commit".to_string(),
                status: result.status,
                message: result.combined_output(),
            });
        }

        let id = self
            .git(&["rev-parse", "--short", "HEAD"])
            .await
            .ok()
            .filter(CommandResult::success)
            .map(|r| r.stdout.trim().to_string());

        info!(commit = ?id, "committed backups");
        Ok(CommitResult::Committed { id })
    }

    fn backend(&self) -> &'static str {
        "git"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn init_repo(dir: &Path) -> bool {
        let executor = LocalExecutor::new().with_current_dir(dir);
        let steps: [&[&str]; 3] = [
            &["init", "--quiet"],
            &["config", "user.email", "backup@example.invalid"],
            &["config", "user.name", "HostHoover"],
        ];
        for args in steps {
            match executor.run("git", args).await {
                Ok(r) if r.success() => {}
                _ => return false,
            }
        }
        true
    }

    #[tokio::test]
    async fn test_not_a_repository() {
        if LocalExecutor::find_program("git").is_none() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let committer = GitCommitter::new(dir.path());
        assert!(matches!(
            committer.ensure_repository().await,
            Err(VcsError::NotARepository(_))
        ));
    }

    #[tokio::test]
    async fn test_stage_and_commit_once() {
        if LocalExecutor::find_program("git").is_none() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        if !init_repo(dir.path()).await {
            return;
        }

        let file = dir.path().join("10.0.0.1_20240101-120000.cfg");
        std::fs::write(&file, "hostname edge-1\n").unwrap();

        let committer = GitCommitter::new(dir.path());
        committer.ensure_repository().await.unwrap();
        committer.stage(std::slice::from_ref(&file)).await.unwrap();
        let first = committer.commit("backup 1").await.unwrap();
        assert!(matches!(first, CommitResult::Committed { .. }));

        committer.stage(std::slice::from_ref(&file)).await.unwrap();
        let second = committer.commit("backup 2").await.unwrap();
        assert_eq!(second, CommitResult::NothingToCommit);
    }

    #[tokio::test]
    async fn test_rejects_path_outside_repo() {
        let repo = tempfile::tempdir().unwrap();
        let other = tempfile::tempdir().unwrap();
        let committer = GitCommitter::new(repo.path());

        let result = committer.stage(&[other.path().join("x.cfg")]).await;
        assert!(matches!(result, Err(VcsError::PathOutsideRepository(_))));
    }
}

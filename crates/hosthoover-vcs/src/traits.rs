//! Version control traits

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::VcsError;

/// Result of a commit request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitResult {
    /// A new commit was recorded
    Committed {
        /// Abbreviated commit id, when the backend reports one
        id: Option<String>,
    },
    /// Staged content matched the last commit
    NothingToCommit,
}

/// Records files in a version control system
#[async_trait]
pub trait Committer: Send + Sync {
    /// Stage `paths` for the next commit
    async fn stage(&self, paths: &[PathBuf]) -> Result<(), VcsError>;

    /// Commit everything staged
    async fn commit(&self, message: &str) -> Result<CommitResult, VcsError>;

    /// Short backend name, for logs
    fn backend(&self) -> &'static str;
}

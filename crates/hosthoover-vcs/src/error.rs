//! Error types for hosthoover-vcs

use thiserror::Error;

/// Errors that can occur while recording backups in version control
#[derive(Error, Debug, Clone)]
pub enum VcsError {
    /// git binary not found
    #[error("git not found")]
    GitNotFound,

    /// Directory is not inside a work tree
    #[error("not a git repository: {0}")]
    NotARepository(String),

    /// Path to stage lies outside the repository
    #[error("path outside repository: {0}")]
    PathOutsideRepository(String),

    /// git exited unsuccessfully
    #[error("git {command} failed: {status} - {message}")]
    CommandFailed {
        /// git subcommand
        command: String,
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Execution error from the local executor
    #[error("execution error: {0}")]
    ExecutionError(String),
}

//! Error types for hosthoover-archive

use thiserror::Error;

/// Errors that can occur while building an archive
#[derive(Error, Debug, Clone)]
pub enum ArchiveError {
    /// Format is unknown or its tooling is not installed
    #[error("unsupported archive format: {0}")]
    UnsupportedFormat(String),

    /// Source file to add does not exist
    #[error("source file not found: {0}")]
    SourceNotFound(String),

    /// Two sources would land on the same entry name
    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),

    /// External archiver exited unsuccessfully
    #[error("archiver failed: {status} - {message}")]
    ToolFailed {
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Execution error from the local executor
    #[error("execution error: {0}")]
    ExecutionError(String),

    /// Error from the zip encoder
    #[error("zip error: {0}")]
    Zip(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Io(err.to_string())
    }
}

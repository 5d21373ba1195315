//! Error types for hosthoover-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a device or running a local tool
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Failed to connect to remote host
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Command execution failed
    #[error("command execution failed: {status} - {stderr}")]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Device accepted the command but sent nothing back
    #[error("device returned no output")]
    EmptyOutput,

    /// SSH key error
    #[error("SSH key error: {0}")]
    SshKeyError(String),

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// Connection not established
    #[error("not connected")]
    NotConnected,

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    ConfigError(String),
}

impl ExecError {
    /// Check if error is retryable
    ///
    /// Network-level and timing failures may succeed on a later attempt.
    /// Credential problems and command rejections never will.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed(_)
                | ExecError::Timeout { .. }
                | ExecError::IoError(_)
                | ExecError::NotConnected
                | ExecError::EmptyOutput
        )
    }

    /// Check if error was caused by the credentials themselves
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            ExecError::AuthenticationFailed(_) | ExecError::SshKeyError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ExecError::ConnectionFailed("reset".into()).is_retryable());
        assert!(
            ExecError::Timeout {
                timeout: Duration::from_secs(1)
            }
            .is_retryable()
        );
        assert!(ExecError::EmptyOutput.is_retryable());
        assert!(!ExecError::AuthenticationFailed("denied".into()).is_retryable());
        assert!(
            !ExecError::CommandFailed {
                status: 1,
                stderr: "% Invalid input".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_auth_classification() {
        assert!(ExecError::AuthenticationFailed("denied".into()).is_auth_failure());
        assert!(ExecError::SshKeyError("bad key".into()).is_auth_failure());
        assert!(!ExecError::NotConnected.is_auth_failure());
    }
}

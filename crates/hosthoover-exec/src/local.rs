//! Local program execution using `tokio::process`

use std::ffi::OsStr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::CommandResult;

/// Local program executor
///
/// Runs external tools (git, 7z, rar) without a shell, so paths never need
/// quoting.
#[derive(Debug, Clone, Default)]
pub struct LocalExecutor {
    /// Working directory for spawned programs
    current_dir: Option<PathBuf>,
    /// Upper bound on a single invocation
    timeout: Option<Duration>,
}

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run programs from `dir`
    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Bound every invocation by `timeout`
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run `program` with `args` and capture its output
    ///
    /// A non-zero exit status is reported in the result, not as an error.
    ///
    /// # Errors
    /// Returns `ExecError::SpawnError` if the program cannot be started and
    /// `ExecError::Timeout` if it outlives the configured timeout
    #[instrument(skip(self, args), level = "debug")]
    pub async fn run<I, S>(&self, program: &str, args: I) -> Result<CommandResult, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let start = Instant::now();

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        debug!(program = %program, "spawning local program");

        let child = command
            .spawn()
            .map_err(|e| ExecError::SpawnError(format!("{program}: {e}")))?;

        let output = match self.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    error!(program = %program, timeout = ?limit, "local program timed out");
                    return Err(ExecError::Timeout { timeout: limit });
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();

        let status = output.status.code().unwrap_or(-1);
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        debug!(
            program = %program,
            status = status,
            duration = ?duration,
            "local program completed"
        );

        Ok(CommandResult {
            status,
            stdout,
            stderr,
            duration,
        })
    }

    /// Locate an executable `program`, searching `PATH` for bare names
    ///
    /// A path with a directory component is checked as given. Files without
    /// execute permission do not count.
    #[must_use]
    pub fn find_program(program: impl AsRef<OsStr>) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let executor = LocalExecutor::new();
        let result = executor.run("echo", ["hello"]).await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_failure() {
        let executor = LocalExecutor::new();
        let result = executor.run("sh", ["-c", "exit 42"]).await.unwrap();

        assert!(!result.success());
        assert_eq!(result.status, 42);
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let executor = LocalExecutor::new().with_timeout(Duration::from_millis(100));
        let result = executor.run("sleep", ["5"]).await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_missing_program() {
        let executor = LocalExecutor::new();
        let result = executor
            .run("hosthoover-definitely-not-installed", std::iter::empty::<&str>())
            .await;

        assert!(matches!(result, Err(ExecError::SpawnError(_))));
    }

    #[tokio::test]
    async fn test_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let executor = LocalExecutor::new().with_current_dir(dir.path());
        let result = executor.run("pwd", std::iter::empty::<&str>()).await.unwrap();

        let reported = PathBuf::from(result.stdout.trim()).canonicalize().unwrap();
        assert_eq!(reported, dir.path().canonicalize().unwrap());
    }

    #[test]
    fn test_find_program() {
        assert!(LocalExecutor::find_program("sh").is_some());
        assert!(LocalExecutor::find_program("hosthoover-definitely-not-installed").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_find_program_requires_execute_permission() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("7z");
        std::fs::write(&tool, "#!/bin/sh\nexit 0\n").unwrap();

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert!(LocalExecutor::find_program(&tool).is_none());

        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(LocalExecutor::find_program(&tool), Some(tool));
    }
}

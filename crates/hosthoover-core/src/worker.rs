//! `SessionWorker`: one device, one outcome
//!
//! Runs connect, authenticate, execute and read for a single target under a
//! per-attempt timeout, retrying transient failures per the retry policy.

use std::sync::Arc;
use std::time::Duration;

use hosthoover_exec::{DeviceConnector, ExecError};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, instrument, warn};

use crate::config::RetryPolicy;
use crate::outcome::SessionOutcome;
use crate::target::Target;

/// Attempt loop states for one target
#[derive(Debug)]
enum AttemptState {
    /// Attempt number `n` (1-based) is running
    Attempting(u32),
    /// Waiting before attempt `next`
    Backoff { next: u32, delay: Duration },
    Succeeded { content: String, attempts: u32 },
    /// Retry budget spent on retryable errors
    Exhausted { last: ExecError, attempts: u32 },
    /// Non-retryable error
    Rejected { error: ExecError, attempts: u32 },
}

/// Captures one target's configuration
pub struct SessionWorker {
    connector: Arc<dyn DeviceConnector>,
    retry: RetryPolicy,
    command_timeout: Duration,
}

impl SessionWorker {
    pub fn new(
        connector: Arc<dyn DeviceConnector>,
        retry: RetryPolicy,
        command_timeout: Duration,
    ) -> Self {
        Self {
            connector,
            retry,
            command_timeout,
        }
    }

    /// Capture the running configuration of `target`. Never fails; every
    /// error ends up in the returned outcome.
    #[instrument(skip(self, target), fields(host = %target.addr(), device = %target.device_type()))]
    pub async fn capture(&self, target: &Target) -> SessionOutcome {
        let started = Instant::now();
        let max_attempts = self.retry.max_attempts();
        let mut state = AttemptState::Attempting(1);

        loop {
            state = match state {
                AttemptState::Attempting(attempt) => {
                    debug!(attempt, max_attempts, "opening session");
                    match self.attempt(target).await {
                        Ok(content) => AttemptState::Succeeded {
                            content,
                            attempts: attempt,
                        },
                        Err(error) if error.is_auth_failure() || !error.is_retryable() => {
                            AttemptState::Rejected {
                                error,
                                attempts: attempt,
                            }
                        }
                        Err(last) if attempt >= max_attempts => AttemptState::Exhausted {
                            last,
                            attempts: attempt,
                        },
                        Err(error) => {
                            let delay = self.retry.backoff.delay_for(attempt);
                            warn!(attempt, error = %error, ?delay, "attempt failed, retrying");
                            AttemptState::Backoff {
                                next: attempt + 1,
                                delay,
                            }
                        }
                    }
                }
                AttemptState::Backoff { next, delay } => {
                    sleep(delay).await;
                    AttemptState::Attempting(next)
                }
                AttemptState::Succeeded { content, attempts } => {
                    let elapsed = started.elapsed();
                    info!(attempts, ?elapsed, bytes = content.len(), "configuration captured");
                    return SessionOutcome::Success {
                        content,
                        elapsed,
                        attempts,
                    };
                }
                AttemptState::Exhausted { last, attempts } => {
                    warn!(attempts, error = %last, "retries exhausted");
                    return match last {
                        ExecError::Timeout { .. } => SessionOutcome::Timeout { attempts },
                        other => SessionOutcome::TransientError {
                            reason: other.to_string(),
                            attempts,
                        },
                    };
                }
                AttemptState::Rejected { error, attempts } => {
                    warn!(attempts, error = %error, "session rejected");
                    return if error.is_auth_failure() {
                        SessionOutcome::AuthFailure {
                            reason: error.to_string(),
                            attempts,
                        }
                    } else {
                        SessionOutcome::PermanentError {
                            reason: error.to_string(),
                            attempts,
                        }
                    };
                }
            };
        }
    }

    /// One bounded attempt
    async fn attempt(&self, target: &Target) -> Result<String, ExecError> {
        match timeout(self.command_timeout, self.session(target)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout {
                timeout: self.command_timeout,
            }),
        }
    }

    async fn session(&self, target: &Target) -> Result<String, ExecError> {
        let session = self.connector.connect(&target.connection_info()).await?;
        let result = session
            .run_with_timeout(target.command(), self.command_timeout)
            .await;
        if let Err(e) = session.close().await {
            debug!(error = %e, "session close failed");
        }

        let result = result?;
        if !result.success() {
            return Err(ExecError::CommandFailed {
                status: result.status,
                stderr: result.combined_output(),
            });
        }
        if result.stdout.trim().is_empty() {
            return Err(ExecError::EmptyOutput);
        }
        Ok(result.stdout)
    }
}

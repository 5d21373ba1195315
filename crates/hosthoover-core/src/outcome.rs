//! Terminal result of one device session

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Terminal result for one target. Exactly one is recorded per target.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Configuration captured
    Success {
        #[serde(skip)]
        content: String,
        elapsed: Duration,
        attempts: u32,
    },
    /// Credentials or key rejected. Never retried.
    AuthFailure { reason: String, attempts: u32 },
    /// Every attempt ran into the command timeout
    Timeout { attempts: u32 },
    /// Retryable failures exhausted the retry budget
    TransientError { reason: String, attempts: u32 },
    /// Failure that retrying cannot fix
    PermanentError { reason: String, attempts: u32 },
    /// Did not answer the reachability probe
    Unreachable,
    /// Never dispatched because the run was interrupted
    NotDispatched,
}

/// Outcome variant without payload, for counting and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Success,
    AuthFailure,
    Timeout,
    TransientError,
    PermanentError,
    Unreachable,
    NotDispatched,
}

impl SessionOutcome {
    #[must_use]
    pub fn kind(&self) -> OutcomeKind {
        match self {
            SessionOutcome::Success { .. } => OutcomeKind::Success,
            SessionOutcome::AuthFailure { .. } => OutcomeKind::AuthFailure,
            SessionOutcome::Timeout { .. } => OutcomeKind::Timeout,
            SessionOutcome::TransientError { .. } => OutcomeKind::TransientError,
            SessionOutcome::PermanentError { .. } => OutcomeKind::PermanentError,
            SessionOutcome::Unreachable => OutcomeKind::Unreachable,
            SessionOutcome::NotDispatched => OutcomeKind::NotDispatched,
        }
    }

    /// Connection attempts spent on this target
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            SessionOutcome::Success { attempts, .. }
            | SessionOutcome::AuthFailure { attempts, .. }
            | SessionOutcome::Timeout { attempts }
            | SessionOutcome::TransientError { attempts, .. }
            | SessionOutcome::PermanentError { attempts, .. } => *attempts,
            SessionOutcome::Unreachable | SessionOutcome::NotDispatched => 0,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, SessionOutcome::Success { .. })
    }

    /// A session was opened and did not produce a backup
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionOutcome::AuthFailure { .. }
                | SessionOutcome::Timeout { .. }
                | SessionOutcome::TransientError { .. }
                | SessionOutcome::PermanentError { .. }
        )
    }

    /// Whether a worker ever took this target
    #[must_use]
    pub fn was_dispatched(&self) -> bool {
        !matches!(
            self,
            SessionOutcome::Unreachable | SessionOutcome::NotDispatched
        )
    }

    /// Human readable failure reason
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        match self {
            SessionOutcome::AuthFailure { reason, .. }
            | SessionOutcome::TransientError { reason, .. }
            | SessionOutcome::PermanentError { reason, .. } => Some(reason.clone()),
            SessionOutcome::Timeout { attempts } => {
                Some(format!("timed out after {attempts} attempt(s)"))
            }
            SessionOutcome::Unreachable => Some("did not answer reachability probe".into()),
            SessionOutcome::NotDispatched => Some("run interrupted before dispatch".into()),
            SessionOutcome::Success { .. } => None,
        }
    }

    /// Captured configuration, if any
    #[must_use]
    pub fn content(&self) -> Option<&str> {
        match self {
            SessionOutcome::Success { content, .. } => Some(content),
            _ => None,
        }
    }
}

// Configurations are large and may hold secrets; keep them out of logs.
impl fmt::Debug for SessionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionOutcome::Success {
                content,
                elapsed,
                attempts,
            } => f
                .debug_struct("Success")
                .field("content", &format_args!("<{} bytes>", content.len()))
                .field("elapsed", elapsed)
                .field("attempts", attempts)
                .finish(),
            SessionOutcome::AuthFailure { reason, attempts } => f
                .debug_struct("AuthFailure")
                .field("reason", reason)
                .field("attempts", attempts)
                .finish(),
            SessionOutcome::Timeout { attempts } => {
                f.debug_struct("Timeout").field("attempts", attempts).finish()
            }
            SessionOutcome::TransientError { reason, attempts } => f
                .debug_struct("TransientError")
                .field("reason", reason)
                .field("attempts", attempts)
                .finish(),
            SessionOutcome::PermanentError { reason, attempts } => f
                .debug_struct("PermanentError")
                .field("reason", reason)
                .field("attempts", attempts)
                .finish(),
            SessionOutcome::Unreachable => f.write_str("Unreachable"),
            SessionOutcome::NotDispatched => f.write_str("NotDispatched"),
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutcomeKind::Success => "success",
            OutcomeKind::AuthFailure => "auth_failure",
            OutcomeKind::Timeout => "timeout",
            OutcomeKind::TransientError => "transient_error",
            OutcomeKind::PermanentError => "permanent_error",
            OutcomeKind::Unreachable => "unreachable",
            OutcomeKind::NotDispatched => "not_dispatched",
        };
        f.pad(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_counts() {
        let auth = SessionOutcome::AuthFailure {
            reason: "denied".into(),
            attempts: 1,
        };
        assert_eq!(auth.attempts(), 1);
        assert!(auth.is_failure());
        assert_eq!(SessionOutcome::Unreachable.attempts(), 0);
        assert!(!SessionOutcome::Unreachable.is_failure());
        assert!(!SessionOutcome::NotDispatched.was_dispatched());
    }

    #[test]
    fn test_debug_hides_content() {
        let outcome = SessionOutcome::Success {
            content: "enable secret 5 $1$abcd".into(),
            elapsed: Duration::from_millis(20),
            attempts: 1,
        };
        let rendered = format!("{outcome:?}");
        assert!(!rendered.contains("enable secret"));
        assert!(rendered.contains("bytes"));
    }

    #[test]
    fn test_serialize_tags_status() {
        let outcome = SessionOutcome::TransientError {
            reason: "connection reset".into(),
            attempts: 3,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "transient_error");
        assert_eq!(json["attempts"], 3);

        let success = SessionOutcome::Success {
            content: "hostname r1".into(),
            elapsed: Duration::from_secs(1),
            attempts: 1,
        };
        let json = serde_json::to_value(&success).unwrap();
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(OutcomeKind::AuthFailure.to_string(), "auth_failure");
        assert_eq!(SessionOutcome::Timeout { attempts: 3 }.kind(), OutcomeKind::Timeout);
    }
}

//! Run settings: timeouts, retry and probe policy

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Delay between attempts of one target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay before every retry
    Fixed(Duration),
    /// `base * 2^(retry-1)`, capped at `max`
    Exponential {
        /// Delay before the first retry
        base: Duration,
        /// Upper bound for any single delay
        max: Duration,
    },
}

impl Backoff {
    /// Delay before retry number `retry` (1-based)
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential { base, max } => {
                let shift = retry.saturating_sub(1).min(16);
                base.saturating_mul(1u32 << shift).min(max)
            }
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::Fixed(Duration::from_secs(2))
    }
}

/// Retry budget for transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay policy between attempts
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Total attempts allowed for one target
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::default(),
        }
    }
}

/// What to do when reachability probes cannot be sent at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeUnavailablePolicy {
    /// Dispatch every target as if it answered
    #[default]
    AssumeReachable,
    /// Abort the run before dispatch
    Abort,
}

impl FromStr for ProbeUnavailablePolicy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "assume_reachable" => Ok(ProbeUnavailablePolicy::AssumeReachable),
            "abort" => Ok(ProbeUnavailablePolicy::Abort),
            other => Err(CoreError::ConfigError(format!(
                "unknown probe-unavailable policy: {other}"
            ))),
        }
    }
}

/// Settings for one run
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Bound on one attempt (connect, authenticate, execute, read)
    pub command_timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
    /// Bound on one reachability probe
    pub probe_timeout: Duration,
    /// Probes in flight at once
    pub probe_concurrency: usize,
    /// Policy when probing is impossible
    pub on_probe_unavailable: ProbeUnavailablePolicy,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            probe_timeout: Duration::from_secs(1),
            probe_concurrency: 64,
            on_probe_unavailable: ProbeUnavailablePolicy::default(),
        }
    }
}

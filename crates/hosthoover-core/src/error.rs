//! Core error types for hosthoover-core

use thiserror::Error;

/// Errors that abort a run or reject a report mutation
///
/// Per-device failures are never errors at this level; they are recorded as
/// `SessionOutcome`s.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Subnet could not be parsed or holds no usable hosts
    #[error("invalid address range {range}: {reason}")]
    InvalidRange {
        /// Input as given
        range: String,
        /// Why it was rejected
        reason: String,
    },

    /// Reachability probing cannot run and the policy says abort
    #[error("reachability probe unavailable: {0}")]
    ProbeUnavailable(String),

    /// Worker pool size out of range
    #[error("invalid worker pool size: {0}")]
    InvalidPoolSize(usize),

    /// Output directory could not be created
    #[error("output directory {path}: {reason}")]
    OutputDirectory {
        /// Directory path
        path: String,
        /// Underlying error
        reason: String,
    },

    /// A target's outcome is terminal and was already recorded
    #[error("outcome already recorded for {0}")]
    OutcomeAlreadyRecorded(String),

    /// Outcome referenced a target outside the run
    #[error("unknown target index {0}")]
    UnknownTarget(usize),

    /// Report was finalized and accepts no more outcomes
    #[error("run report already finalized")]
    ReportFinalized,

    /// Actor communication error
    #[error("actor communication error: {0}")]
    ActorError(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigError(String),
}

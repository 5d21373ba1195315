//! Message types for actor communication
//!
//! Message handlers are implemented in their respective actor modules.

use std::path::PathBuf;

use kameo_macros::Reply;

use crate::outcome::SessionOutcome;

// ============================================================================
// RunReportActor Messages
// ============================================================================

/// Record the terminal outcome of one target
#[derive(Debug)]
pub struct RecordOutcome {
    /// Position of the target in the run
    pub index: usize,
    pub outcome: SessionOutcome,
    pub hostname: Option<String>,
    /// Written backup file
    pub path: Option<PathBuf>,
}

/// Query how many targets have an outcome
#[derive(Debug)]
pub struct GetProgress;

/// Recording progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Reply)]
pub struct RunProgress {
    pub recorded: usize,
    pub total: usize,
}

/// Close the report and build the `RunReport`
///
/// Targets without an outcome are filled in: dispatched ones as
/// `PermanentError`, the rest as `NotDispatched`.
#[derive(Debug)]
pub struct Finalize {
    /// Per target, whether a worker took it
    pub dispatched: Vec<bool>,
    /// Run was interrupted by shutdown
    pub partial: bool,
}

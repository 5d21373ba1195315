//! hosthoover-vcs: Version control for captured configurations
//!
//! Provides the stage/commit contract and a git implementation.

pub mod error;
pub mod git;
pub mod traits;

pub use error::VcsError;
pub use git::GitCommitter;
pub use traits::{CommitResult, Committer};

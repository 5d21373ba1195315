//! Actor implementations

pub mod report;

pub use report::{RunReportActor, RunReportActorArgs};

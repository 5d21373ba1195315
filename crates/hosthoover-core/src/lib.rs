//! hosthoover-core: Backup orchestration engine
//!
//! Expands a subnet into targets, probes reachability, captures device
//! configurations through a bounded worker pool with per-device retry, and
//! aggregates every outcome into a single run report that drives archiving,
//! version control and notification exactly once per run.

pub mod actor;
pub mod config;
pub mod error;
pub mod hosts;
pub mod message;
pub mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod pool;
pub mod probe;
pub mod report;
pub mod target;
pub mod worker;
pub mod writer;

pub use actor::report::{RunReportActor, RunReportActorArgs};
pub use config::{Backoff, ProbeUnavailablePolicy, RetryPolicy, RunSettings};
pub use error::CoreError;
pub use hosts::enumerate;
pub use message::{Finalize, GetProgress, RecordOutcome, RunProgress};
pub use orchestrator::{Orchestrator, OrchestratorArgs, RunOutcome};
pub use outcome::{OutcomeKind, SessionOutcome};
pub use pipeline::{
    ArchiveStage, CommitStage, NotifyStage, PostProcessReport, PostProcessor, StageStatus,
};
pub use pool::{Slot, WorkerPool, WorkerPoolState};
pub use probe::{IcmpProber, ProbeError, Prober, TcpProber};
pub use report::{ReportEntry, RunCounts, RunReport};
pub use target::{Credentials, DeviceType, Target, TargetTemplate};
pub use worker::SessionWorker;
pub use writer::{ResultWriter, RunStamp, WriteError};

//! `RunReportActor`: Single owner of a run's outcomes
//!
//! Session tasks send their terminal outcome here; the actor rejects a second
//! outcome for the same target and builds the `RunReport` on `Finalize`.

use chrono::{DateTime, Local};
use kameo::actor::{ActorRef, WeakActorRef};
use kameo::error::ActorStopReason;
use kameo::message::{Context, Message};
use kameo::prelude::*;
use tracing::{debug, info, warn};

use crate::error::CoreError;
use crate::message::{Finalize, GetProgress, RecordOutcome, RunProgress};
use crate::outcome::SessionOutcome;
use crate::report::{ReportEntry, RunReport};
use crate::target::Target;

/// Arguments for spawning a `RunReportActor`
pub struct RunReportActorArgs {
    /// Run identifier
    pub run_id: String,
    /// Run start time
    pub started_at: DateTime<Local>,
    /// Every target of the run, in order
    pub targets: Vec<Target>,
}

struct Recorded {
    outcome: SessionOutcome,
    hostname: Option<String>,
    path: Option<std::path::PathBuf>,
}

/// Aggregates outcomes for one run
pub struct RunReportActor {
    run_id: String,
    started_at: DateTime<Local>,
    targets: Vec<Target>,
    slots: Vec<Option<Recorded>>,
    finalized: bool,
}

impl RunReportActor {
    fn recorded(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }
}

impl Actor for RunReportActor {
    type Args = RunReportActorArgs;
    type Error = CoreError;

    async fn on_start(args: Self::Args, actor_ref: ActorRef<Self>) -> Result<Self, Self::Error> {
        debug!(run = %args.run_id, id = %actor_ref.id(), targets = args.targets.len(), "RunReportActor starting");

        let slots = args.targets.iter().map(|_| None).collect();
        Ok(Self {
            run_id: args.run_id,
            started_at: args.started_at,
            targets: args.targets,
            slots,
            finalized: false,
        })
    }

    async fn on_stop(
        &mut self,
        _actor_ref: WeakActorRef<Self>,
        reason: ActorStopReason,
    ) -> Result<(), Self::Error> {
        debug!(run = %self.run_id, reason = ?reason, "RunReportActor stopping");
        Ok(())
    }
}

// ============================================================================
// Message Handlers
// ============================================================================

impl Message<RecordOutcome> for RunReportActor {
    type Reply = Result<(), CoreError>;

    async fn handle(
        &mut self,
        msg: RecordOutcome,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        if self.finalized {
            return Err(CoreError::ReportFinalized);
        }
        let target = self
            .targets
            .get(msg.index)
            .ok_or(CoreError::UnknownTarget(msg.index))?;
        let slot = &mut self.slots[msg.index];
        if slot.is_some() {
            warn!(host = %target.addr(), "duplicate outcome rejected");
            return Err(CoreError::OutcomeAlreadyRecorded(target.addr().to_string()));
        }

        debug!(host = %target.addr(), status = %msg.outcome.kind(), "outcome recorded");
        *slot = Some(Recorded {
            outcome: msg.outcome,
            hostname: msg.hostname,
            path: msg.path,
        });
        Ok(())
    }
}

impl Message<GetProgress> for RunReportActor {
    type Reply = RunProgress;

    async fn handle(
        &mut self,
        _msg: GetProgress,
        _ctx: &mut Context<Self, Self::Reply>,
    ) -> Self::Reply {
        RunProgress {
            recorded: self.recorded(),
            total: self.targets.len(),
        }
    }
}

impl Message<Finalize> for RunReportActor {
    type Reply = Result<RunReport, CoreError>;

    async fn handle(&mut self, msg: Finalize, _ctx: &mut Context<Self, Self::Reply>) -> Self::Reply {
        if self.finalized {
            return Err(CoreError::ReportFinalized);
        }
        self.finalized = true;

        let slots = std::mem::take(&mut self.slots);
        let entries: Vec<ReportEntry> = self
            .targets
            .iter()
            .zip(slots)
            .enumerate()
            .map(|(index, (target, slot))| match slot {
                Some(recorded) => ReportEntry {
                    target: target.clone(),
                    outcome: recorded.outcome,
                    hostname: recorded.hostname,
                    path: recorded.path,
                },
                None => {
                    let dispatched = msg.dispatched.get(index).copied().unwrap_or(false);
                    let outcome = if dispatched {
                        warn!(host = %target.addr(), "session ended without an outcome");
                        SessionOutcome::PermanentError {
                            reason: "session ended without recording an outcome".into(),
                            attempts: 0,
                        }
                    } else {
                        SessionOutcome::NotDispatched
                    };
                    ReportEntry {
                        target: target.clone(),
                        outcome,
                        hostname: None,
                        path: None,
                    }
                }
            })
            .collect();

        let report = RunReport::new(self.run_id.clone(), self.started_at, entries, msg.partial);
        let counts = report.counts();
        info!(
            run = %self.run_id,
            total = counts.total,
            attempted = counts.attempted,
            succeeded = counts.succeeded,
            failed = counts.failed,
            unreachable = counts.unreachable,
            partial = msg.partial,
            "run report finalized"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hosthoover_exec::Auth;
    use kameo::actor::Spawn;

    use super::*;
    use crate::target::{Credentials, DeviceType};

    fn targets(n: u8) -> Vec<Target> {
        let credentials = Arc::new(Credentials::new("u", Auth::Password("p".into())));
        (1..=n)
            .map(|i| {
                Target::new(
                    format!("10.0.0.{i}").parse().unwrap(),
                    DeviceType::CiscoIos,
                    Arc::clone(&credentials),
                )
            })
            .collect()
    }

    fn spawn(n: u8) -> ActorRef<RunReportActor> {
        RunReportActor::spawn(RunReportActorArgs {
            run_id: "test-run".into(),
            started_at: Local::now(),
            targets: targets(n),
        })
    }

    fn success() -> SessionOutcome {
        SessionOutcome::Success {
            content: "hostname r1".into(),
            elapsed: Duration::from_millis(1),
            attempts: 1,
        }
    }

    fn record(index: usize, outcome: SessionOutcome) -> RecordOutcome {
        RecordOutcome {
            index,
            outcome,
            hostname: None,
            path: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_outcome_rejected() {
        let actor = spawn(2);
        actor.ask(record(0, success())).await.unwrap();

        let second = actor.ask(record(0, SessionOutcome::Unreachable)).await;
        assert!(second.is_err());

        let progress = actor.ask(GetProgress).await.unwrap();
        assert_eq!(progress, RunProgress { recorded: 1, total: 2 });
    }

    #[tokio::test]
    async fn test_unknown_index_rejected() {
        let actor = spawn(1);
        assert!(actor.ask(record(5, success())).await.is_err());
    }

    #[tokio::test]
    async fn test_finalize_fills_missing_targets() {
        let actor = spawn(3);
        actor.ask(record(0, success())).await.unwrap();

        let report = actor
            .ask(Finalize {
                dispatched: vec![true, true, false],
                partial: true,
            })
            .await
            .unwrap();

        let kinds: Vec<_> = report.entries().iter().map(|e| e.outcome.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                crate::outcome::OutcomeKind::Success,
                crate::outcome::OutcomeKind::PermanentError,
                crate::outcome::OutcomeKind::NotDispatched,
            ]
        );
        assert!(report.is_partial());
        assert_eq!(report.counts().attempted, 2);
    }

    #[tokio::test]
    async fn test_no_records_after_finalize() {
        let actor = spawn(1);
        actor
            .ask(Finalize {
                dispatched: vec![false],
                partial: false,
            })
            .await
            .unwrap();
        assert!(actor.ask(record(0, success())).await.is_err());
    }
}

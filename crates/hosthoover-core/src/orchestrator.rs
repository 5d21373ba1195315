//! `Orchestrator`: drives one backup run
//!
//! Probes targets, dispatches reachable ones through the worker pool, feeds
//! every outcome to the report actor and hands the final report to the
//! post-run stages.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use hosthoover_exec::DeviceConnector;
use kameo::actor::ActorRef;
use kameo::prelude::*;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::actor::report::{RunReportActor, RunReportActorArgs};
use crate::config::{ProbeUnavailablePolicy, RunSettings};
use crate::error::CoreError;
use crate::message::{Finalize, GetProgress, RecordOutcome};
use crate::outcome::SessionOutcome;
use crate::pipeline::{PostProcessReport, PostProcessor};
use crate::pool::WorkerPool;
use crate::probe::{ProbeError, Prober};
use crate::report::RunReport;
use crate::target::Target;
use crate::worker::SessionWorker;
use crate::writer::{ResultWriter, RunStamp};

/// Arguments for building an `Orchestrator`
pub struct OrchestratorArgs {
    /// Opens device sessions
    pub connector: Arc<dyn DeviceConnector>,
    /// Reachability prober; `None` dispatches every target
    pub prober: Option<Arc<dyn Prober>>,
    /// Output for captured configurations
    pub writer: ResultWriter,
    pub settings: RunSettings,
}

/// Run report plus what the post-run stages did with it
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub report: RunReport,
    pub post: PostProcessReport,
}

/// Runs backups over a list of targets
pub struct Orchestrator {
    worker: Arc<SessionWorker>,
    prober: Option<Arc<dyn Prober>>,
    writer: Arc<ResultWriter>,
    settings: RunSettings,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(args: OrchestratorArgs) -> Self {
        let worker = SessionWorker::new(
            args.connector,
            args.settings.retry,
            args.settings.command_timeout,
        );
        Self {
            worker: Arc::new(worker),
            prober: args.prober,
            writer: Arc::new(args.writer),
            settings: args.settings,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops probing and dispatch; in-flight sessions
    /// finish and the run returns a partial report.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Back up every target with at most `pool_size` concurrent sessions.
    ///
    /// Fails only before dispatch (bad pool size, output directory, probe
    /// policy). Once dispatch starts, every target ends up in the report.
    #[instrument(skip(self, targets), fields(targets = targets.len()))]
    pub async fn run(&self, targets: Vec<Target>, pool_size: usize) -> Result<RunReport, CoreError> {
        let pool = WorkerPool::new(pool_size)?;
        self.writer.prepare().await?;
        let probed = self.probe_all(&targets).await?;

        let stamp = RunStamp::now();
        let report = RunReportActor::spawn(RunReportActorArgs {
            run_id: stamp.to_string(),
            started_at: stamp.time(),
            targets: targets.clone(),
        });

        info!(
            run = %stamp,
            reachable = probed.iter().filter(|p| **p == Some(true)).count(),
            output = %self.writer.output_dir().display(),
            "starting backup run"
        );

        let mut dispatched = vec![false; targets.len()];
        // targets the probe never reached stay undispatched
        let mut partial = probed.iter().any(Option::is_none);
        let mut tasks = JoinSet::new();

        for (index, target) in targets.iter().enumerate() {
            if probed[index] == Some(false) {
                info!(host = %target.addr(), "unreachable, skipping");
                record(&report, index, SessionOutcome::Unreachable, None, None).await;
            }
        }

        for (index, target) in targets.iter().enumerate() {
            if probed[index] != Some(true) {
                continue;
            }

            let slot = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => None,
                slot = pool.acquire(target.addr()) => Some(slot?),
            };
            let Some(slot) = slot else {
                partial = true;
                break;
            };

            dispatched[index] = true;
            let worker = Arc::clone(&self.worker);
            let writer = Arc::clone(&self.writer);
            let report = report.clone();
            let target = target.clone();
            tasks.spawn(async move {
                let _slot = slot;
                capture_and_record(&worker, &writer, &report, index, &target, &stamp).await;
            });
        }

        if partial {
            let undispatched = probed
                .iter()
                .zip(&dispatched)
                .filter(|(probe, taken)| **probe != Some(false) && !**taken)
                .count();
            let recorded = report
                .ask(GetProgress)
                .await
                .map(|progress| progress.recorded)
                .unwrap_or_default();
            warn!(
                in_flight = ?pool.in_flight(),
                recorded,
                total = targets.len(),
                undispatched,
                "shutdown requested, draining in-flight sessions"
            );
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "session task failed");
            }
        }

        let finalized = report
            .ask(Finalize {
                dispatched,
                partial,
            })
            .await
            .map_err(|e| CoreError::ActorError(e.to_string()));
        report.stop_gracefully().await.ok();
        finalized
    }

    /// `run`, then the post-run stages exactly once against the final report
    pub async fn run_and_process(
        &self,
        targets: Vec<Target>,
        pool_size: usize,
        post: &PostProcessor,
    ) -> Result<RunOutcome, CoreError> {
        let report = self.run(targets, pool_size).await?;
        let post = post.process(&report).await;
        Ok(RunOutcome { report, post })
    }

    /// Reachability per target, in target order
    ///
    /// Probing stops as soon as shutdown is requested; targets without an
    /// answer are `None`.
    async fn probe_all(&self, targets: &[Target]) -> Result<Vec<Option<bool>>, CoreError> {
        let Some(prober) = &self.prober else {
            return Ok(vec![Some(true); targets.len()]);
        };

        let probe_timeout = self.settings.probe_timeout;
        let results: Vec<(usize, Result<bool, ProbeError>)> = stream::iter(targets.iter().enumerate())
            .map(|(index, target)| {
                let prober = Arc::clone(prober);
                let addr = target.addr();
                async move { (index, prober.probe(addr, probe_timeout).await) }
            })
            .buffer_unordered(self.settings.probe_concurrency.max(1))
            .take_until(self.shutdown.cancelled())
            .collect()
            .await;

        let mut reachable = vec![None; targets.len()];
        let mut unavailable = None;
        for (index, result) in results {
            match result {
                Ok(up) => reachable[index] = Some(up),
                Err(ProbeError::Unavailable(reason)) => {
                    reachable[index] = Some(true);
                    unavailable.get_or_insert(reason);
                }
            }
        }

        let unprobed = reachable.iter().filter(|r| r.is_none()).count();
        if unprobed > 0 {
            warn!(unprobed, total = targets.len(), "shutdown requested during reachability probe");
        }

        if let Some(reason) = unavailable {
            return match self.settings.on_probe_unavailable {
                ProbeUnavailablePolicy::AssumeReachable => {
                    warn!(method = prober.method(), %reason, "probe unavailable, treating every target as reachable");
                    Ok(reachable.iter().map(|r| r.map(|_| true)).collect())
                }
                ProbeUnavailablePolicy::Abort => {
                    error!(method = prober.method(), %reason, "probe unavailable, aborting run");
                    Err(CoreError::ProbeUnavailable(reason))
                }
            };
        }

        info!(
            method = prober.method(),
            reachable = reachable.iter().filter(|r| **r == Some(true)).count(),
            total = targets.len(),
            "reachability probe finished"
        );
        Ok(reachable)
    }
}

/// Capture, persist and record one target
async fn capture_and_record(
    worker: &SessionWorker,
    writer: &ResultWriter,
    report: &ActorRef<RunReportActor>,
    index: usize,
    target: &Target,
    stamp: &RunStamp,
) {
    let outcome = worker.capture(target).await;

    let (outcome, hostname, path) = match outcome {
        SessionOutcome::Success {
            content,
            elapsed,
            attempts,
        } => {
            let hostname = target.device_type().extract_hostname(&content);
            match writer.write(target, &content, stamp).await {
                Ok(path) => {
                    info!(
                        host = %target.addr(),
                        hostname = hostname.as_deref().unwrap_or("-"),
                        path = %path.display(),
                        "backup saved"
                    );
                    let outcome = SessionOutcome::Success {
                        content,
                        elapsed,
                        attempts,
                    };
                    (outcome, hostname, Some(path))
                }
                Err(e) => {
                    error!(host = %target.addr(), error = %e, "backup could not be written");
                    let outcome = SessionOutcome::PermanentError {
                        reason: e.to_string(),
                        attempts,
                    };
                    (outcome, hostname, None)
                }
            }
        }
        other => {
            warn!(
                host = %target.addr(),
                status = %other.kind(),
                attempts = other.attempts(),
                reason = other.reason().unwrap_or_default(),
                "backup failed"
            );
            (other, None, None)
        }
    };

    record(report, index, outcome, hostname, path).await;
}

async fn record(
    report: &ActorRef<RunReportActor>,
    index: usize,
    outcome: SessionOutcome,
    hostname: Option<String>,
    path: Option<std::path::PathBuf>,
) {
    let msg = RecordOutcome {
        index,
        outcome,
        hostname,
        path,
    };
    if let Err(e) = report.ask(msg).await {
        error!(index, error = %e, "failed to record outcome");
    }
}

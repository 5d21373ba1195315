//! Post-run stages: archive, commit, notify
//!
//! Each stage runs at most once per run, after the report is final. A stage
//! failure is logged and recorded; it never changes the run's outcome.

use std::path::PathBuf;
use std::sync::Arc;

use hosthoover_archive::{ArchiveCodec, create_archive};
use hosthoover_notify::Notifier;
use hosthoover_vcs::{CommitResult, Committer};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::report::RunReport;

/// What a stage did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StageStatus {
    Completed(String),
    Skipped(String),
    Failed(String),
    /// Stage not configured for this run
    Disabled,
}

impl StageStatus {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }
}

/// Bundles the run's backup files into one archive
pub struct ArchiveStage {
    codec: Arc<dyn ArchiveCodec>,
    destination_dir: PathBuf,
}

impl ArchiveStage {
    pub fn new(codec: Arc<dyn ArchiveCodec>, destination_dir: impl Into<PathBuf>) -> Self {
        Self {
            codec,
            destination_dir: destination_dir.into(),
        }
    }

    /// `<dir>/hosthoover_<run-id>.<ext>`
    #[must_use]
    pub fn destination(&self, report: &RunReport) -> PathBuf {
        self.destination_dir.join(format!(
            "hosthoover_{}.{}",
            report.run_id(),
            self.codec.format().extension()
        ))
    }
}

/// Stages and commits the run's backup files
pub struct CommitStage {
    committer: Arc<dyn Committer>,
}

impl CommitStage {
    pub fn new(committer: Arc<dyn Committer>) -> Self {
        Self { committer }
    }
}

/// Mails the failure summary
pub struct NotifyStage {
    notifier: Arc<dyn Notifier>,
    recipients: Vec<String>,
}

impl NotifyStage {
    pub fn new(notifier: Arc<dyn Notifier>, recipients: Vec<String>) -> Self {
        Self {
            notifier,
            recipients,
        }
    }
}

/// Result of every post-run stage
#[derive(Debug, Clone, Serialize)]
pub struct PostProcessReport {
    pub archive: StageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_path: Option<PathBuf>,
    pub commit: StageStatus,
    pub notify: StageStatus,
}

/// Configured post-run stages
#[derive(Default)]
pub struct PostProcessor {
    archive: Option<ArchiveStage>,
    commit: Option<CommitStage>,
    notify: Option<NotifyStage>,
}

impl PostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_archive(mut self, stage: ArchiveStage) -> Self {
        self.archive = Some(stage);
        self
    }

    #[must_use]
    pub fn with_commit(mut self, stage: CommitStage) -> Self {
        self.commit = Some(stage);
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, stage: NotifyStage) -> Self {
        self.notify = Some(stage);
        self
    }

    /// Run archive, then commit, then notify against the final report
    #[instrument(skip(self, report), fields(run = %report.run_id()))]
    pub async fn process(&self, report: &RunReport) -> PostProcessReport {
        let files = report.written_paths();

        let (archive, archive_path) = self.archive(report, &files).await;
        let commit = self.commit(report, &files).await;
        let notify = self.notify(report).await;

        PostProcessReport {
            archive,
            archive_path,
            commit,
            notify,
        }
    }

    async fn archive(
        &self,
        report: &RunReport,
        files: &[PathBuf],
    ) -> (StageStatus, Option<PathBuf>) {
        let Some(stage) = &self.archive else {
            return (StageStatus::Disabled, None);
        };
        if files.is_empty() {
            info!("no backups written, skipping archive");
            return (StageStatus::Skipped("no backups written".into()), None);
        }

        let destination = stage.destination(report);
        if let Err(e) = tokio::fs::create_dir_all(&stage.destination_dir).await {
            error!(error = %e, "cannot create archive directory");
            return (StageStatus::Failed(e.to_string()), None);
        }

        match create_archive(stage.codec.as_ref(), files, &destination).await {
            Ok(path) => {
                info!(path = %path.display(), files = files.len(), "backups archived");
                (
                    StageStatus::Completed(format!("{} file(s)", files.len())),
                    Some(path),
                )
            }
            Err(e) => {
                error!(error = %e, "archive stage failed");
                (StageStatus::Failed(e.to_string()), None)
            }
        }
    }

    async fn commit(&self, report: &RunReport, files: &[PathBuf]) -> StageStatus {
        let Some(CommitStage { committer }) = &self.commit else {
            return StageStatus::Disabled;
        };
        if files.is_empty() {
            info!("no backups written, skipping commit");
            return StageStatus::Skipped("no backups written".into());
        }

        if let Err(e) = committer.stage(files).await {
            error!(backend = committer.backend(), error = %e, "staging failed");
            return StageStatus::Failed(e.to_string());
        }

        let message = format!(
            "HostHoover backup {}: {} device(s) captured",
            report.run_id(),
            report.counts().succeeded
        );
        match committer.commit(&message).await {
            Ok(CommitResult::Committed { id }) => {
                let id = id.unwrap_or_default();
                info!(backend = committer.backend(), commit = %id, "backups committed");
                StageStatus::Completed(id)
            }
            Ok(CommitResult::NothingToCommit) => {
                info!(backend = committer.backend(), "configurations unchanged, nothing to commit");
                StageStatus::Skipped("nothing to commit".into())
            }
            Err(e) => {
                error!(backend = committer.backend(), error = %e, "commit failed");
                StageStatus::Failed(e.to_string())
            }
        }
    }

    async fn notify(&self, report: &RunReport) -> StageStatus {
        let Some(stage) = &self.notify else {
            return StageStatus::Disabled;
        };
        if !report.has_failures() {
            return StageStatus::Skipped("no failures".into());
        }

        let failed = report.counts().failed;
        let subject = format!("HostHoover backup {}: {failed} failure(s)", report.run_id());
        let body = report.failure_summary();

        match stage
            .notifier
            .send(&subject, &body, &stage.recipients)
            .await
        {
            Ok(()) => {
                info!(
                    transport = stage.notifier.transport(),
                    recipients = stage.recipients.len(),
                    failed,
                    "failure notification sent"
                );
                StageStatus::Completed(format!("{} recipient(s)", stage.recipients.len()))
            }
            Err(e) => {
                warn!(transport = stage.notifier.transport(), error = %e, "notification failed");
                StageStatus::Failed(e.to_string())
            }
        }
    }
}

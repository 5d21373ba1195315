//! Run report: one entry per target, in target order

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::outcome::{OutcomeKind, SessionOutcome};
use crate::target::Target;

/// Terminal record for one target
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub target: Target,
    pub outcome: SessionOutcome,
    /// Hostname found in the captured configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Backup file, present only for successful targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Derived counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub total: usize,
    /// Targets handed to a worker
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub unreachable: usize,
    pub not_dispatched: usize,
}

/// Aggregate of every outcome in a run. Built once by the report actor.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    run_id: String,
    started_at: DateTime<Local>,
    finished_at: DateTime<Local>,
    partial: bool,
    counts: RunCounts,
    entries: Vec<ReportEntry>,
}

impl RunReport {
    pub fn new(
        run_id: impl Into<String>,
        started_at: DateTime<Local>,
        entries: Vec<ReportEntry>,
        partial: bool,
    ) -> Self {
        let mut counts = RunCounts {
            total: entries.len(),
            ..RunCounts::default()
        };
        for entry in &entries {
            let outcome = &entry.outcome;
            if outcome.was_dispatched() {
                counts.attempted += 1;
            }
            match outcome.kind() {
                OutcomeKind::Success => counts.succeeded += 1,
                OutcomeKind::Unreachable => counts.unreachable += 1,
                OutcomeKind::NotDispatched => counts.not_dispatched += 1,
                _ => counts.failed += 1,
            }
        }

        Self {
            run_id: run_id.into(),
            started_at,
            finished_at: Local::now(),
            partial,
            counts,
            entries,
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    #[must_use]
    pub fn finished_at(&self) -> DateTime<Local> {
        self.finished_at
    }

    /// The run was interrupted and some targets never ran
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.partial
    }

    #[must_use]
    pub fn counts(&self) -> RunCounts {
        self.counts
    }

    #[must_use]
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Files written this run, in target order
    #[must_use]
    pub fn written_paths(&self) -> Vec<PathBuf> {
        self.entries.iter().filter_map(|e| e.path.clone()).collect()
    }

    /// Entries whose session ran and failed
    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.entries.iter().filter(|e| e.outcome.is_failure())
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.counts.failed > 0
    }

    /// Number of entries per outcome kind
    #[must_use]
    pub fn by_kind(&self) -> HashMap<OutcomeKind, usize> {
        let mut kinds = HashMap::new();
        for entry in &self.entries {
            *kinds.entry(entry.outcome.kind()).or_insert(0) += 1;
        }
        kinds
    }

    /// One line of counters
    #[must_use]
    pub fn summary_line(&self) -> String {
        let c = &self.counts;
        let mut line = format!(
            "{} targets: {} attempted, {} succeeded, {} failed, {} unreachable",
            c.total, c.attempted, c.succeeded, c.failed, c.unreachable
        );
        if c.not_dispatched > 0 {
            let _ = write!(line, ", {} not dispatched", c.not_dispatched);
        }
        if self.partial {
            line.push_str(" (partial run)");
        }
        line
    }

    /// Multi-line failure listing for notifications and the console
    #[must_use]
    pub fn failure_summary(&self) -> String {
        let mut text = format!("Failed targets in run {}:\n", self.run_id);
        for entry in self.failures() {
            let _ = writeln!(
                text,
                "  {} [{}] {} after {} attempt(s): {}",
                entry.target.addr(),
                entry.target.device_type(),
                entry.outcome.kind(),
                entry.outcome.attempts(),
                entry.outcome.reason().unwrap_or_default()
            );
        }
        let _ = writeln!(text, "\n{}", self.summary_line());
        text
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hosthoover_exec::Auth;

    use super::*;
    use crate::target::{Credentials, DeviceType};

    fn entry(addr: &str, outcome: SessionOutcome, path: Option<&str>) -> ReportEntry {
        ReportEntry {
            target: Target::new(
                addr.parse().unwrap(),
                DeviceType::CiscoIos,
                Arc::new(Credentials::new("u", Auth::Password("p".into()))),
            ),
            outcome,
            hostname: None,
            path: path.map(PathBuf::from),
        }
    }

    fn sample() -> RunReport {
        RunReport::new(
            "20240101-000000",
            Local::now(),
            vec![
                entry(
                    "10.0.0.1",
                    SessionOutcome::Success {
                        content: "hostname a".into(),
                        elapsed: Duration::from_millis(5),
                        attempts: 1,
                    },
                    Some("/b/10.0.0.1.cfg"),
                ),
                entry(
                    "10.0.0.2",
                    SessionOutcome::AuthFailure {
                        reason: "denied".into(),
                        attempts: 1,
                    },
                    None,
                ),
                entry("10.0.0.3", SessionOutcome::Unreachable, None),
                entry("10.0.0.4", SessionOutcome::NotDispatched, None),
            ],
            true,
        )
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(
            report.counts(),
            RunCounts {
                total: 4,
                attempted: 2,
                succeeded: 1,
                failed: 1,
                unreachable: 1,
                not_dispatched: 1,
            }
        );
        assert!(report.has_failures());
        assert!(report.is_partial());
        assert_eq!(report.written_paths(), vec![PathBuf::from("/b/10.0.0.1.cfg")]);
        assert_eq!(report.by_kind()[&OutcomeKind::Unreachable], 1);
    }

    #[test]
    fn test_failure_summary_lists_failures_only() {
        let text = sample().failure_summary();
        assert!(text.contains("10.0.0.2 [cisco_ios] auth_failure after 1 attempt(s): denied"));
        assert!(!text.contains("10.0.0.1 ["));
        assert!(!text.contains("10.0.0.3 ["));
        assert!(text.contains("(partial run)"));
    }

    #[test]
    fn test_serializes_without_content() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["counts"]["succeeded"], 1);
        assert_eq!(json["entries"][0]["outcome"]["status"], "success");
        assert_eq!(json["entries"][0]["target"]["addr"], "10.0.0.1");
        assert!(!json.to_string().contains("hostname a"));
    }
}

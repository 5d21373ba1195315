//! `ResultWriter`: persists captured configurations

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::CoreError;
use crate::target::Target;

/// Failure to persist one configuration
#[derive(Error, Debug, Clone)]
#[error("failed to write {path}: {reason}")]
pub struct WriteError {
    pub path: PathBuf,
    pub reason: String,
}

/// Wall-clock time a run started, shared by every file it writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStamp(DateTime<Local>);

impl RunStamp {
    #[must_use]
    pub fn now() -> Self {
        Self(Local::now())
    }

    #[must_use]
    pub fn at(time: DateTime<Local>) -> Self {
        Self(time)
    }

    #[must_use]
    pub fn time(&self) -> DateTime<Local> {
        self.0
    }
}

impl fmt::Display for RunStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y%m%d-%H%M%S"))
    }
}

/// Writes one file per successful target into the output directory
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
}

impl ResultWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the output directory. Called once before dispatch.
    pub async fn prepare(&self) -> Result<(), CoreError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| CoreError::OutputDirectory {
                path: self.output_dir.display().to_string(),
                reason: e.to_string(),
            })
    }

    /// `<addr>_<YYYYMMDD-HHMMSS>.cfg`; IPv6 colons become dashes
    #[must_use]
    pub fn file_name(target: &Target, stamp: &RunStamp) -> String {
        let addr = target.addr().to_string().replace(':', "-");
        format!("{addr}_{stamp}.cfg")
    }

    /// Persist `content` for `target`. The file appears complete or not at all.
    #[instrument(skip(self, target, content), fields(host = %target.addr()))]
    pub async fn write(
        &self,
        target: &Target,
        content: &str,
        stamp: &RunStamp,
    ) -> Result<PathBuf, WriteError> {
        let path = self.output_dir.join(Self::file_name(target, stamp));
        let partial = path.with_extension("cfg.partial");

        let fail = |e: std::io::Error| WriteError {
            path: path.clone(),
            reason: e.to_string(),
        };

        if let Err(e) = tokio::fs::write(&partial, content.as_bytes()).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(fail(e));
        }
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(fail(e));
        }

        debug!(path = %path.display(), bytes = content.len(), "configuration written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::TimeZone;
    use hosthoover_exec::Auth;
    use tempfile::TempDir;

    use super::*;
    use crate::target::{Credentials, DeviceType};

    fn target(addr: &str) -> Target {
        Target::new(
            addr.parse().unwrap(),
            DeviceType::CiscoIos,
            Arc::new(Credentials::new("backup", Auth::Password("pw".into()))),
        )
    }

    fn stamp() -> RunStamp {
        RunStamp::at(Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap())
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            ResultWriter::file_name(&target("10.0.0.1"), &stamp()),
            "10.0.0.1_20240309-070501.cfg"
        );
        assert_eq!(
            ResultWriter::file_name(&target("2001:db8::1"), &stamp()),
            "2001-db8--1_20240309-070501.cfg"
        );
    }

    #[tokio::test]
    async fn test_write_creates_file() {
        let tmp = TempDir::new().unwrap();
        let writer = ResultWriter::new(tmp.path().join("backups"));
        writer.prepare().await.unwrap();
        writer.prepare().await.unwrap();

        let path = writer
            .write(&target("10.0.0.1"), "hostname r1\n", &stamp())
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hostname r1\n");
        let names: Vec<_> = std::fs::read_dir(writer.output_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let tmp = TempDir::new().unwrap();
        let writer = ResultWriter::new(tmp.path().join("never-created"));

        let err = writer
            .write(&target("10.0.0.1"), "hostname r1\n", &stamp())
            .await
            .unwrap_err();
        assert!(err.path.ends_with("10.0.0.1_20240309-070501.cfg"));
    }

    #[tokio::test]
    async fn test_prepare_fails_on_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("occupied");
        std::fs::write(&blocker, "x").unwrap();

        let writer = ResultWriter::new(&blocker);
        assert!(matches!(
            writer.prepare().await,
            Err(CoreError::OutputDirectory { .. })
        ));
    }
}

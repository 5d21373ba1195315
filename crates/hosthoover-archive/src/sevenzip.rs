//! 7z archives via the external `7z` tool

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hosthoover_exec::LocalExecutor;
use tracing::{debug, error, instrument};

use crate::error::ArchiveError;
use crate::tool;
use crate::traits::{ArchiveCodec, ArchiveWriter};
use crate::types::{ArchiveFormat, EntryList};

/// Binary names shipped by the various 7-Zip distributions
const SEVEN_ZIP_PROGRAMS: &[&str] = &["7z", "7za", "7zz"];

/// 7z codec
#[derive(Debug, Clone, Default)]
pub struct SevenZipCodec {
    /// Explicit program path, bypassing `PATH` lookup
    program: Option<PathBuf>,
}

impl SevenZipCodec {
    /// Create a codec that looks for 7-Zip on `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific 7-Zip binary
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    fn resolve_program(&self) -> Option<PathBuf> {
        match &self.program {
            Some(path) => LocalExecutor::find_program(path),
            None => SEVEN_ZIP_PROGRAMS
                .iter()
                .find_map(|name| LocalExecutor::find_program(name)),
        }
    }
}

#[async_trait]
impl ArchiveCodec for SevenZipCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::SevenZip
    }

    async fn is_available(&self) -> bool {
        self.resolve_program().is_some()
    }

    async fn open(&self, destination: &Path) -> Result<Box<dyn ArchiveWriter>, ArchiveError> {
        let program = self
            .resolve_program()
            .ok_or_else(|| ArchiveError::UnsupportedFormat("7z (7-Zip not installed)".into()))?;
        Ok(Box::new(SevenZipWriter {
            program,
            destination: std::path::absolute(destination)?,
            entries: EntryList::new(),
        }))
    }
}

/// 7z archive under construction
#[derive(Debug)]
pub struct SevenZipWriter {
    program: PathBuf,
    destination: PathBuf,
    entries: EntryList,
}

#[async_trait]
impl ArchiveWriter for SevenZipWriter {
    fn add(&mut self, path: &Path) -> Result<(), ArchiveError> {
        self.entries.push(path)
    }

    #[instrument(skip(self), fields(destination = %self.destination.display()))]
    async fn finalize(self: Box<Self>) -> Result<PathBuf, ArchiveError> {
        let partial = tool::partial_path(&self.destination);
        tool::remove_existing(&partial).await?;

        match self.build(&partial).await {
            Ok(()) => {
                tool::publish(&partial, &self.destination).await?;
                Ok(self.destination)
            }
            Err(e) => {
                tool::discard(&partial).await;
                Err(e)
            }
        }
    }
}

impl SevenZipWriter {
    async fn build(&self, archive: &Path) -> Result<(), ArchiveError> {
        // 7z keeps relative paths as given, so each source directory is added
        // from inside that directory to store bare file names.
        let mut by_dir: BTreeMap<PathBuf, Vec<&str>> = BTreeMap::new();
        for (name, source) in self.entries.entries() {
            let dir = source
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            by_dir.entry(dir).or_default().push(name.as_str());
        }

        let program = self.program.to_string_lossy().to_string();
        for (dir, names) in by_dir {
            let list = tool::list_file(&names)?;
            let args = [
                "a".to_string(),
                "-t7z".to_string(),
                "-bd".to_string(),
                "-y".to_string(),
                "-scsUTF-8".to_string(),
                archive.to_string_lossy().to_string(),
                tool::list_arg(&list),
            ];

            let result = LocalExecutor::new()
                .with_current_dir(&dir)
                .run(&program, &args)
                .await
                .map_err(|e| ArchiveError::ExecutionError(e.to_string()))?;

            if !result.success() {
                error!(status = result.status, stderr = %result.stderr, "7z failed");
                return Err(ArchiveError::ToolFailed {
                    status: result.status,
                    message: result.combined_output(),
                });
            }
            debug!(dir = %dir.display(), files = names.len(), "added directory group to 7z archive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_tool_is_unsupported() {
        let codec = SevenZipCodec::new().with_program("/nonexistent/bin/7z");
        assert!(!codec.is_available().await);

        let dir = tempfile::tempdir().unwrap();
        let result = crate::create_archive(&codec, &[], &dir.path().join("x.7z")).await;
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat(_))));
    }

    #[cfg(unix)]
    fn configs(dir: &Path, count: u8) -> Vec<PathBuf> {
        (1..=count)
            .map(|i| {
                let path = dir.join(format!("10.0.0.{i}_20240101-120000.cfg"));
                std::fs::write(&path, format!("hostname edge-{i}\n")).unwrap();
                path
            })
            .collect()
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_executable_tool_is_unsupported() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let program = tool::fake_archiver(dir.path(), 0);
        std::fs::set_permissions(&program, std::fs::Permissions::from_mode(0o644)).unwrap();
        let codec = SevenZipCodec::new().with_program(&program);

        assert!(!codec.is_available().await);
        let result = crate::create_archive(&codec, &configs(dir.path(), 1), &dir.path().join("x.7z")).await;
        assert!(matches!(result, Err(ArchiveError::UnsupportedFormat(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_entries_are_passed_in_a_list_file() {
        let dir = tempfile::tempdir().unwrap();
        let codec = SevenZipCodec::new().with_program(tool::fake_archiver(dir.path(), 0));
        let files = configs(dir.path(), 40);
        let dest = dir.path().join("backup.7z");

        let path = crate::create_archive(&codec, &files, &dest).await.unwrap();

        assert_eq!(path, dest);
        let listed = std::fs::read_to_string(&dest).unwrap();
        assert_eq!(listed.lines().count(), 40);
        assert!(listed.lines().all(|name| name.ends_with(".cfg") && !name.contains('/')));
        assert!(!tool::partial_path(&dest).exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_tool_keeps_previous_archive() {
        let dir = tempfile::tempdir().unwrap();
        let codec = SevenZipCodec::new().with_program(tool::fake_archiver(dir.path(), 2));
        let dest = dir.path().join("backup.7z");
        std::fs::write(&dest, "previous run").unwrap();

        let result = crate::create_archive(&codec, &configs(dir.path(), 2), &dest).await;

        assert!(matches!(result, Err(ArchiveError::ToolFailed { status: 2, .. })));
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "previous run");
        assert!(!tool::partial_path(&dest).exists());
    }

    #[tokio::test]
    #[ignore = "requires 7-Zip"]
    async fn test_sevenzip_archive() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("10.0.0.1_20240101-120000.cfg");
        std::fs::write(&a, "hostname edge-1\n").unwrap();
        let dest = dir.path().join("backup.7z");

        for _ in 0..2 {
            let path = crate::create_archive(&SevenZipCodec::new(), std::slice::from_ref(&a), &dest)
                .await
                .unwrap();
            assert!(path.exists());
        }
        assert!(a.exists());
    }
}

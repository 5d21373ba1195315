//! RAR archives via the external `rar` tool

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use hosthoover_exec::LocalExecutor;
use tracing::{error, instrument};

use crate::error::ArchiveError;
use crate::tool;
use crate::traits::{ArchiveCodec, ArchiveWriter};
use crate::types::{ArchiveFormat, EntryList};

/// RAR codec
#[derive(Debug, Clone)]
pub struct RarCodec {
    program: PathBuf,
}

impl RarCodec {
    /// Create a codec that runs `rar` from `PATH`
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("rar"),
        }
    }

    /// Use a specific `rar` binary
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for RarCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArchiveCodec for RarCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Rar
    }

    async fn is_available(&self) -> bool {
        LocalExecutor::find_program(&self.program).is_some()
    }

    async fn open(&self, destination: &Path) -> Result<Box<dyn ArchiveWriter>, ArchiveError> {
        let program = LocalExecutor::find_program(&self.program)
            .ok_or_else(|| ArchiveError::UnsupportedFormat("rar (not installed)".into()))?;
        Ok(Box::new(RarWriter {
            program,
            destination: destination.to_path_buf(),
            entries: EntryList::new(),
        }))
    }
}

/// RAR archive under construction
#[derive(Debug)]
pub struct RarWriter {
    program: PathBuf,
    destination: PathBuf,
    entries: EntryList,
}

#[async_trait]
impl ArchiveWriter for RarWriter {
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

impl RarWriter {
    async fn build(&self, archive: &Path) -> Result<(), ArchiveError> {
        let list = tool::list_file(
            self.entries
                .entries()
                .iter()
                .map(|(_, source)| source.to_string_lossy()),
        )?;

        // -ep drops directory components from entry names, -scfl reads the
        // list as UTF-8
        let args = [
            "a".to_string(),
            "-ep".to_string(),
            "-idq".to_string(),
            "-y".to_string(),
            "-scfl".to_string(),
            archive.to_string_lossy().to_string(),
            tool::list_arg(&list),
        ];

        let result = LocalExecutor::new()
            .run(&self.program.to_string_lossy(), &args)
            .await
            .map_err(|e| ArchiveError::ExecutionError(e.to_string()))?;

        if !result.success() {
            error!(status = result.status, stderr = %result.stderr, "rar failed");
            return Err(ArchiveError::ToolFailed {
                status: result.status,
                message: result.combined_output(),
            });
        }
        Ok(())
    }
}

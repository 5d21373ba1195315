//! Archive codec traits

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ArchiveError;
use crate::types::ArchiveFormat;

/// A format-specific archive producer
#[async_trait]
pub trait ArchiveCodec: Send + Sync {
    /// Format this codec writes
    fn format(&self) -> ArchiveFormat;

    /// Whether the codec can run on this machine
    async fn is_available(&self) -> bool;

    /// Start a new archive at `destination`
    async fn open(&self, destination: &Path) -> Result<Box<dyn ArchiveWriter>, ArchiveError>;
}

/// An archive under construction
#[async_trait]
pub trait ArchiveWriter: Send {
    /// Queue a file; it is stored under its file name
    fn add(&mut self, path: &Path) -> Result<(), ArchiveError>;

    /// Write the archive and return its path
    async fn finalize(self: Box<Self>) -> Result<PathBuf, ArchiveError>;
}

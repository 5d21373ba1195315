//! Zip archives built in-process with the `zip` crate

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, instrument};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

use crate::error::ArchiveError;
use crate::traits::{ArchiveCodec, ArchiveWriter};
use crate::types::{ArchiveFormat, EntryList};

/// Zip codec (deflate)
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipCodec;

impl ZipCodec {
    /// Create a new zip codec
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ArchiveCodec for ZipCodec {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn open(&self, destination: &Path) -> Result<Box<dyn ArchiveWriter>, ArchiveError> {
        Ok(Box::new(ZipArchiveWriter {
            destination: destination.to_path_buf(),
            entries: EntryList::new(),
        }))
    }
}

/// Zip archive under construction
#[derive(Debug)]
pub struct ZipArchiveWriter {
    destination: PathBuf,
    entries: EntryList,
}

#[async_trait]
impl ArchiveWriter for ZipArchiveWriter {
    fn add(&mut self, path: &Path) -> Result<(), ArchiveError> {
        self.entries.push(path)
    }

    #[instrument(skip(self), fields(destination = %self.destination.display()))]
    async fn finalize(self: Box<Self>) -> Result<PathBuf, ArchiveError> {
        let ZipArchiveWriter {
            destination,
            entries,
        } = *self;

        tokio::task::spawn_blocking(move || {
            write_zip(&destination, &entries)?;
            Ok(destination)
        })
        .await
        .map_err(|e| ArchiveError::Io(e.to_string()))?
    }
}

/// Write to a sibling temp file and rename, so a failed run never leaves a
/// truncated archive at `destination`
fn write_zip(destination: &Path, entries: &EntryList) -> Result<(), ArchiveError> {
    let partial = destination.with_extension("zip.partial");
    let file = File::create(&partial)?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let result = (|| -> Result<(), ArchiveError> {
        for (name, source) in entries.entries() {
            zip.start_file(name.as_str(), options)
                .map_err(|e| ArchiveError::Zip(e.to_string()))?;
            let mut input = File::open(source)?;
            io::copy(&mut input, &mut zip)?;
            debug!(entry = %name, "added zip entry");
        }
        zip.finish().map_err(|e| ArchiveError::Zip(e.to_string()))?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }

    std::fs::rename(&partial, destination)?;
    Ok(())
}

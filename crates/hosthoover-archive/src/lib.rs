//! hosthoover-archive: Archive codec abstraction
//!
//! Provides the `open` / `add` / `finalize` codec contract and implementations
//! for zip (in-process), 7z and rar (external tools).

pub mod error;
pub mod rar;
pub mod sevenzip;
mod tool;
pub mod traits;
pub mod types;
pub mod zip_codec;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, instrument};

pub use error::ArchiveError;
pub use rar::RarCodec;
pub use sevenzip::SevenZipCodec;
pub use traits::{ArchiveCodec, ArchiveWriter};
pub use types::{ArchiveFormat, EntryList};
pub use zip_codec::ZipCodec;

/// Codec implementing `format`
#[must_use]
pub fn codec_for(format: ArchiveFormat) -> Arc<dyn ArchiveCodec> {
    match format {
        ArchiveFormat::Zip => Arc::new(ZipCodec::new()),
        ArchiveFormat::SevenZip => Arc::new(SevenZipCodec::new()),
        ArchiveFormat::Rar => Arc::new(RarCodec::new()),
    }
}

/// Package `files` into a single archive at `destination`
///
/// An existing archive at `destination` is replaced.
///
/// # Errors
/// Returns `ArchiveError::UnsupportedFormat` when the codec cannot run on this
/// machine (no silent fallback to another format), or any error raised while
/// adding or finalizing
#[instrument(skip(codec, files), fields(format = %codec.format(), files = files.len()))]
pub async fn create_archive(
    codec: &dyn ArchiveCodec,
    files: &[PathBuf],
    destination: &Path,
) -> Result<PathBuf, ArchiveError> {
    if !codec.is_available().await {
        return Err(ArchiveError::UnsupportedFormat(codec.format().to_string()));
    }

    let mut writer = codec.open(destination).await?;
    for file in files {
        writer.add(file)?;
    }
    let path = writer.finalize().await?;

    info!(path = %path.display(), "archive created");

    Ok(path)
}

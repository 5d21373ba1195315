//! Type definitions for archive formats

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

/// Supported archive formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// Zip (deflate), built in-process
    #[default]
    Zip,
    /// 7z, via the `7z` command-line tool
    #[serde(rename = "7z", alias = "sevenzip")]
    SevenZip,
    /// RAR, via the `rar` command-line tool
    Rar,
}

impl ArchiveFormat {
    /// File extension without the dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::SevenZip => "7z",
            ArchiveFormat::Rar => "rar",
        }
    }
}

impl std::fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ArchiveFormat {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "7z" | "sevenzip" | "seven_zip" => Ok(ArchiveFormat::SevenZip),
            "rar" => Ok(ArchiveFormat::Rar),
            other => Err(ArchiveError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Files queued for an archive, keyed by entry name
#[derive(Debug, Clone, Default)]
pub struct EntryList {
    entries: Vec<(String, PathBuf)>,
    names: HashSet<String>,
}

impl EntryList {
    /// Create an empty list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `path` under its file name
    ///
    /// # Errors
    /// Returns `ArchiveError::SourceNotFound` if `path` is not a regular file and
    /// `ArchiveError::DuplicateEntry` if another file already claimed the name
    pub fn push(&mut self, path: &Path) -> Result<(), ArchiveError> {
        if !path.is_file() {
            return Err(ArchiveError::SourceNotFound(path.display().to_string()));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ArchiveError::SourceNotFound(path.display().to_string()))?;
        if !self.names.insert(name.clone()) {
            return Err(ArchiveError::DuplicateEntry(name));
        }
        self.entries.push((name, path.to_path_buf()));
        Ok(())
    }

    /// Queued `(entry name, source path)` pairs in insertion order
    #[must_use]
    pub fn entries(&self) -> &[(String, PathBuf)] {
        &self.entries
    }

    /// Number of queued files
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been queued
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

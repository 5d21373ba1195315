//! Shared plumbing for codecs that drive an external archiver

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::warn;

use crate::error::ArchiveError;

/// Sibling path the archiver writes to before the archive is published
pub(crate) fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write one entry per line to a temporary list file
///
/// Archivers read `@file` lists, which keeps argv small no matter how many
/// devices were captured.
pub(crate) fn list_file<I, S>(entries: I) -> Result<NamedTempFile, ArchiveError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut file = tempfile::Builder::new()
        .prefix("hosthoover-")
        .suffix(".lst")
        .tempfile()?;
    for entry in entries {
        writeln!(file, "{}", entry.as_ref())?;
    }
    file.flush()?;
    Ok(file)
}

/// `@<path>` argument naming a list file
pub(crate) fn list_arg(list: &NamedTempFile) -> String {
    format!("@{}", list.path().display())
}

pub(crate) async fn remove_existing(path: &Path) -> Result<(), ArchiveError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Move a finished archive into place, replacing any previous one
pub(crate) async fn publish(partial: &Path, destination: &Path) -> Result<(), ArchiveError> {
    tokio::fs::rename(partial, destination).await?;
    Ok(())
}

/// Drop whatever the archiver left behind after a failure
pub(crate) async fn discard(partial: &Path) {
    if let Err(e) = remove_existing(partial).await {
        warn!(path = %partial.display(), error = %e, "could not remove partial archive");
    }
}

/// Stand-in archiver: appends the `@list` contents to the `*.partial`
/// archive argument, then exits with `status`
#[cfg(all(test, unix))]
pub(crate) fn fake_archiver(dir: &Path, status: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        "#!/bin/sh\n\
         for arg in \"$@\"; do\n\
           case \"$arg\" in\n\
             @*) list=\"${{arg#@}}\" ;;\n\
             *.partial) archive=\"$arg\" ;;\n\
           esac\n\
         done\n\
         cat \"$list\" >> \"$archive\"\n\
         exit {status}\n"
    );
    let path = dir.join(format!("fake-archiver-{status}"));
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_path_keeps_extension() {
        assert_eq!(
            partial_path(Path::new("/var/backups/hosthoover_run.7z")),
            PathBuf::from("/var/backups/hosthoover_run.7z.partial")
        );
    }

    #[test]
    fn test_list_file_has_one_entry_per_line() {
        let names: Vec<String> = (1..=3).map(|i| format!("10.0.0.{i}_20240101-120000.cfg")).collect();
        let list = list_file(&names).unwrap();

        let content = std::fs::read_to_string(list.path()).unwrap();
        assert_eq!(content.lines().collect::<Vec<_>>(), names);
        assert!(list_arg(&list).starts_with('@'));
    }
}

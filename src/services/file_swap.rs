//! Promotion of a freshly patched archive over the original.
//!
//! The archive tool never writes the game archive in place. It produces a
//! temp archive next to it, and once the tool has succeeded this module
//! swaps that file into the canonical name:
//!
//! 1. Keep-backup requested and no backup yet: rename original -> `<stem>OLD<ext>`
//! 2. Otherwise: delete the original
//! 3. Rename temp -> original name
//!
//! Renames are used throughout so the window without a valid archive is as
//! short as the platform allows. Nothing is rolled back on failure, since
//! the original may already be gone; the error carries the temp file
//! location so the operator can finish the rename by hand.

use camino::{Utf8Path, Utf8PathBuf};
use std::fs;
use std::io;
use thiserror::Error;

const TEMP_SUFFIX: &str = "_Translated_PTBR_TEMP";
const BACKUP_SUFFIX: &str = "OLD";

fn with_stem_suffix(archive: &Utf8Path, suffix: &str) -> Utf8PathBuf {
    let stem = archive.file_stem().unwrap_or_default();
    let file_name = match archive.extension() {
        Some(ext) => format!("{stem}{suffix}.{ext}"),
        None => format!("{stem}{suffix}"),
    };
    archive.with_file_name(file_name)
}

/// Scratch file the tool writes: `<stem>_Translated_PTBR_TEMP<ext>`
pub fn temp_path_for(archive: &Utf8Path) -> Utf8PathBuf {
    with_stem_suffix(archive, TEMP_SUFFIX)
}

/// Backup of the pre-patch archive: `<stem>OLD<ext>`
pub fn backup_path_for(archive: &Utf8Path) -> Utf8PathBuf {
    with_stem_suffix(archive, BACKUP_SUFFIX)
}

/// What happened to the original archive during the swap
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupDisposition {
    /// The original was renamed to this backup file
    Created(Utf8PathBuf),
    /// A backup already existed; it was left alone and the original deleted
    PreservedExisting(Utf8PathBuf),
    /// No backup requested; the original was deleted
    Replaced,
}

/// Errors from a partially completed swap
///
/// Every variant carries the temp archive location, which still holds the
/// patched content (unless the promotion itself half-happened).
#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Patched archive \"{temp}\" is missing")]
    TempMissing { temp: Utf8PathBuf },

    #[error("Failed to move \"{original}\" to backup \"{backup}\": {source}")]
    Backup {
        original: Utf8PathBuf,
        backup: Utf8PathBuf,
        temp: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to remove original archive \"{original}\": {source}")]
    RemoveOriginal {
        original: Utf8PathBuf,
        temp: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to move \"{temp}\" to \"{original}\": {source}")]
    Promote {
        original: Utf8PathBuf,
        temp: Utf8PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SwapError {
    /// Where the patched archive was left
    pub fn temp_path(&self) -> &Utf8Path {
        match self {
            SwapError::TempMissing { temp }
            | SwapError::Backup { temp, .. }
            | SwapError::RemoveOriginal { temp, .. }
            | SwapError::Promote { temp, .. } => temp,
        }
    }
}

/// Rename, falling back to copy + delete when the rename crosses devices
fn move_file(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!("Rename {} -> {} crosses devices, copying", from, to);
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}

/// Swap the patched temp archive into place.
///
/// # Arguments
/// * `original` - Canonical archive path, still holding the pre-patch content
/// * `temp` - Tool output holding the patched content
/// * `keep_backup` - Keep the original as `<stem>OLD<ext>` if no backup exists yet
///
/// # Returns
/// How the original was disposed of
///
/// # Errors
/// A [`SwapError`] naming the step that failed. The original archive is
/// never touched when the temp archive is missing.
pub fn finalize(
    original: &Utf8Path,
    temp: &Utf8Path,
    keep_backup: bool,
) -> Result<BackupDisposition, SwapError> {
    if !temp.is_file() {
        return Err(SwapError::TempMissing {
            temp: temp.to_path_buf(),
        });
    }

    let backup = backup_path_for(original);

    let disposition = if keep_backup && !backup.exists() {
        tracing::info!("Moving original archive to backup {}", backup);
        move_file(original, &backup).map_err(|source| SwapError::Backup {
            original: original.to_path_buf(),
            backup: backup.clone(),
            temp: temp.to_path_buf(),
            source,
        })?;
        BackupDisposition::Created(backup)
    } else {
        tracing::info!("Removing original archive {}", original);
        if original.exists() {
            fs::remove_file(original).map_err(|source| SwapError::RemoveOriginal {
                original: original.to_path_buf(),
                temp: temp.to_path_buf(),
                source,
            })?;
        }
        if keep_backup {
            BackupDisposition::PreservedExisting(backup)
        } else {
            BackupDisposition::Replaced
        }
    };

    move_file(temp, original).map_err(|source| SwapError::Promote {
        original: original.to_path_buf(),
        temp: temp.to_path_buf(),
        source,
    })?;

    tracing::info!("Patched archive installed at {}", original);
    Ok(disposition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_and_backup_names() {
        let archive = Utf8PathBuf::from("/games/Until Then/UntilThen.pck");
        assert_eq!(
            temp_path_for(&archive),
            Utf8PathBuf::from("/games/Until Then/UntilThen_Translated_PTBR_TEMP.pck")
        );
        assert_eq!(
            backup_path_for(&archive),
            Utf8PathBuf::from("/games/Until Then/UntilThenOLD.pck")
        );
    }

    #[test]
    fn test_names_without_extension() {
        let archive = Utf8PathBuf::from("/games/archive");
        assert_eq!(backup_path_for(&archive), Utf8PathBuf::from("/games/archiveOLD"));
    }

    #[test]
    fn test_missing_temp_leaves_original() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let original = dir.join("UntilThen.pck");
        fs::write(&original, b"original").unwrap();

        let err = finalize(&original, &temp_path_for(&original), false).unwrap_err();

        assert!(matches!(err, SwapError::TempMissing { .. }));
        assert_eq!(err.temp_path(), temp_path_for(&original));
        assert_eq!(fs::read(&original).unwrap(), b"original");
    }

    #[test]
    fn test_existing_backup_preserved() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        let original = dir.join("UntilThen.pck");
        let temp = temp_path_for(&original);
        let backup = backup_path_for(&original);
        fs::write(&original, b"second install").unwrap();
        fs::write(&temp, b"patched").unwrap();
        fs::write(&backup, b"pristine").unwrap();

        let disposition = finalize(&original, &temp, true).unwrap();

        assert_eq!(disposition, BackupDisposition::PreservedExisting(backup.clone()));
        assert_eq!(fs::read(&backup).unwrap(), b"pristine");
        assert_eq!(fs::read(&original).unwrap(), b"patched");
        assert!(!temp.exists());
    }

    #[test]
    fn test_failure_reports_temp_location() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8Path::from_path(temp_dir.path()).unwrap();
        // A directory at the canonical path cannot be removed as a file
        let original = dir.join("UntilThen.pck");
        fs::create_dir(&original).unwrap();
        fs::write(original.join("blocker"), b"x").unwrap();
        let temp = temp_path_for(&original);
        fs::write(&temp, b"patched").unwrap();

        let err = finalize(&original, &temp, false).unwrap_err();

        assert_eq!(err.temp_path(), temp);
        assert!(temp.exists());
    }
}

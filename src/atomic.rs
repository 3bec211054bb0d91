//! Atomic replace-on-write persistence.
//!
//! New content is written to a temporary file in the target's own directory
//! (so the final rename stays on one filesystem), given the target's
//! permission bits, synced, and then renamed over the target. A reader sees
//! either the old complete file or the new complete file, never a partial one.
//!
//! Writing is split in two so callers can prepare several files before
//! committing any of them:
//!
//! ```no_run
//! use bundlever::atomic::{self, CommitOptions};
//! use std::path::Path;
//!
//! let staged = atomic::stage(Path::new("Info.plist"), b"...", &CommitOptions::default())?;
//! // Dropping `staged` here would delete the temp file and leave Info.plist untouched.
//! staged.commit()?;
//! # Ok::<(), bundlever::Error>(())
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::{Error, Result};

/// Prefix of temporary files created next to the target.
pub const TEMP_PREFIX: &str = ".plist.tmp_";

/// Options for a single commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// Keep the original as `<target>.bak`, renamed into place before the target
    pub backup: bool,
}

impl CommitOptions {
    pub fn with_backup(backup: bool) -> Self {
        Self { backup }
    }
}

/// What a successful commit produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub target: PathBuf,
    pub backup: Option<PathBuf>,
    pub bytes_written: usize,
}

/// New content written to a temp file, waiting to be renamed over its target.
///
/// When a backup was requested, a copy of the original is staged the same
/// way and only renamed to `<target>.bak` by [`StagedFile::commit_backup`]
/// (or [`StagedFile::commit`]). Dropping a `StagedFile` removes both temp
/// files; neither the target nor an existing `.bak` is touched.
#[derive(Debug)]
pub struct StagedFile {
    target: PathBuf,
    temp: NamedTempFile,
    pending_backup: Option<NamedTempFile>,
    backup: Option<PathBuf>,
    bytes_written: usize,
}

impl StagedFile {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Path of the temp file holding the new content.
    pub fn temp_path(&self) -> &Path {
        self.temp.path()
    }

    /// The backup path, once the backup copy has been renamed into place.
    pub fn backup(&self) -> Option<&Path> {
        self.backup.as_deref()
    }

    /// Rename the staged backup copy to `<target>.bak`.
    ///
    /// Does nothing if no backup was requested or it is already in place. The
    /// target itself is not touched.
    pub fn commit_backup(&mut self) -> Result<()> {
        if let Some(pending) = self.pending_backup.take() {
            let backup = backup_path(&self.target);
            pending.persist(&backup).map_err(|e| Error::Backup {
                path: self.target.clone(),
                backup: backup.clone(),
                source: e.error,
            })?;
            debug!(backup = %backup.display(), "backup written");
            self.backup = Some(backup);
        }
        Ok(())
    }

    /// Put the backup in place, then atomically rename the temp file over the
    /// target.
    ///
    /// On failure the temp files are removed and the target keeps its old
    /// content.
    pub fn commit(mut self) -> Result<CommitReceipt> {
        self.commit_backup()?;
        let StagedFile {
            target,
            temp,
            backup,
            bytes_written,
            ..
        } = self;

        // A failed persist hands the temp file back inside the error; dropping
        // it there deletes it.
        temp.persist(&target).map_err(|e| Error::Write {
            path: target.clone(),
            source: e.error,
        })?;
        debug!(target = %target.display(), bytes = bytes_written, "committed");

        Ok(CommitReceipt {
            target,
            backup,
            bytes_written,
        })
    }
}

/// Path of the backup sibling for `target`.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

fn temp_file_next_to(target: &Path) -> std::io::Result<NamedTempFile> {
    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    tempfile::Builder::new()
        .prefix(TEMP_PREFIX)
        .tempfile_in(dir)
}

/// Copy `target` into a temp file that will later become `<target>.bak`.
fn stage_backup(target: &Path, permissions: fs::Permissions) -> Result<NamedTempFile> {
    let backup = backup_path(target);
    let backup_err = |e: std::io::Error| Error::Backup {
        path: target.to_path_buf(),
        backup: backup.clone(),
        source: e,
    };

    // Only a regular file (or nothing) may sit where the backup goes
    match fs::symlink_metadata(&backup) {
        Ok(meta) if !meta.is_file() => {
            return Err(backup_err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "backup path exists and is not a regular file",
            )));
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(backup_err(e)),
    }

    let mut temp = temp_file_next_to(target).map_err(backup_err)?;
    let mut original = fs::File::open(target).map_err(backup_err)?;
    std::io::copy(&mut original, temp.as_file_mut()).map_err(backup_err)?;
    temp.as_file()
        .set_permissions(permissions)
        .map_err(backup_err)?;
    temp.as_file().sync_all().map_err(backup_err)?;
    Ok(temp)
}

/// Prepare `bytes` to replace `target` without touching `target` yet.
///
/// Reads the target's permissions, copies the original aside if a backup is
/// requested, writes and syncs a temp file in the same directory and applies
/// the permissions to it.
pub fn stage(target: &Path, bytes: &[u8], options: &CommitOptions) -> Result<StagedFile> {
    let metadata = fs::metadata(target).map_err(|e| Error::Stat {
        path: target.to_path_buf(),
        source: e,
    })?;

    let pending_backup = if options.backup {
        Some(stage_backup(target, metadata.permissions())?)
    } else {
        None
    };

    let write_err = |e: std::io::Error| Error::Write {
        path: target.to_path_buf(),
        source: e,
    };

    let mut temp = temp_file_next_to(target).map_err(write_err)?;
    temp.write_all(bytes).map_err(write_err)?;
    temp.flush().map_err(write_err)?;
    temp.as_file()
        .set_permissions(metadata.permissions())
        .map_err(write_err)?;
    temp.as_file().sync_all().map_err(write_err)?;

    debug!(
        target = %target.display(),
        temp = %temp.path().display(),
        bytes = bytes.len(),
        "staged"
    );

    Ok(StagedFile {
        target: target.to_path_buf(),
        temp,
        pending_backup,
        backup: None,
        bytes_written: bytes.len(),
    })
}

/// Stage and immediately commit `bytes` over `target`.
pub fn commit(target: &Path, bytes: &[u8], options: &CommitOptions) -> Result<CommitReceipt> {
    stage(target, bytes, options)?.commit()
}

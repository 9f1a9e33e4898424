//! Copy-or-symlink branch of the link strategy

use super::copy::{copy_file_atomic, ensure_parent_dir};
use crate::types::{map_io_error, Action, Applied, FileTask, SyncError};
use std::fs;
use std::path::Path;

/// Mirror one file as a copy (small) or a symlink (large).
///
/// An existing target, followed through symlinks, is left untouched.
/// A dangling symlink at the target is replaced.
pub fn copy_or_symlink(task: &FileTask, size_threshold: u64) -> Result<Applied, SyncError> {
    let target = &task.absolute_target;

    if target.exists() {
        return Ok(Applied::Skipped);
    }

    if fs::symlink_metadata(target).is_ok() {
        tracing::debug!("Replacing dangling symlink {}", target.display());
        fs::remove_file(target).map_err(|e| map_io_error(target, e))?;
    }

    ensure_parent_dir(target)?;

    let size = fs::metadata(&task.absolute_source)
        .map_err(SyncError::Io)?
        .len();

    if size <= size_threshold {
        copy_file_atomic(&task.absolute_source, target)?;
        Ok(Applied::Created(Action::Copied))
    } else {
        create_symlink(&task.absolute_source, target)?;
        Ok(Applied::Created(Action::Symlinked))
    }
}

#[cfg(unix)]
fn create_symlink(target: &Path, link_path: &Path) -> Result<(), SyncError> {
    std::os::unix::fs::symlink(target, link_path).map_err(|e| map_io_error(link_path, e))
}

#[cfg(windows)]
fn create_symlink(target: &Path, link_path: &Path) -> Result<(), SyncError> {
    std::os::windows::fs::symlink_file(target, link_path).map_err(|e| map_io_error(link_path, e))
}

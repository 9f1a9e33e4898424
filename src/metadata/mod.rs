//! Metadata pass: subtitles, artwork and nfo files
//!
//! Metadata files are small, so they are always copied. A destination is
//! refreshed only when the source modification time is strictly newer.

use crate::executor::TaskHandler;
use crate::strategy::copy_file_atomic;
use crate::types::{Action, Applied, FileTask, SyncError, TaskOutcome};
use std::fs;
use std::io::ErrorKind;

/// Task handler for the metadata pass
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataSyncer;

impl MetadataSyncer {
    pub fn new() -> Self {
        Self
    }
}

impl TaskHandler for MetadataSyncer {
    fn handle(&self, task: &FileTask) -> TaskOutcome {
        sync_metadata_file(task).into()
    }
}

/// Copy `task`'s source when the destination is absent or older.
pub fn sync_metadata_file(task: &FileTask) -> Result<Applied, SyncError> {
    let dest_meta = match fs::metadata(&task.absolute_target) {
        Ok(meta) => Some(meta),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(SyncError::Io(e)),
    };

    let action = match dest_meta {
        None => Action::MetadataCopied,
        Some(dest_meta) => {
            let src_mtime = fs::metadata(&task.absolute_source)
                .and_then(|m| m.modified())
                .map_err(SyncError::Io)?;
            let dest_mtime = dest_meta.modified().map_err(SyncError::Io)?;

            if src_mtime <= dest_mtime {
                return Ok(Applied::Skipped);
            }
            Action::MetadataUpdated
        }
    };

    copy_file_atomic(&task.absolute_source, &task.absolute_target)?;
    Ok(Applied::Created(action))
}

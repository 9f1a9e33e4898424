//! FileTask - One unit of work handed from the scanner to a worker

use super::SyncError;
use std::fmt;
use std::path::{Path, PathBuf};

/// A matched source file and where its artifact belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTask {
    /// Absolute path of the scanned source file
    pub absolute_source: PathBuf,

    /// Path relative to the source root
    pub relative_path: PathBuf,

    /// `target_root` joined with `relative_path`
    pub absolute_target: PathBuf,
}

impl FileTask {
    /// Re-base `absolute_source` from `source_root` onto `target_root`.
    ///
    /// Returns `None` when the path does not live under `source_root`.
    pub fn rebase(source_root: &Path, target_root: &Path, absolute_source: PathBuf) -> Option<Self> {
        let relative_path = absolute_source.strip_prefix(source_root).ok()?.to_path_buf();
        if relative_path.as_os_str().is_empty() {
            return None;
        }
        let absolute_target = target_root.join(&relative_path);

        Some(Self {
            absolute_source,
            relative_path,
            absolute_target,
        })
    }
}

/// Artifact produced for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Small file copied in full
    Copied,
    /// Large file symlinked
    Symlinked,
    /// New `.strm` placeholder written
    PlaceholderWritten,
    /// Stale placeholder deleted and rewritten
    PlaceholderRegenerated,
    /// Metadata file copied to an empty slot
    MetadataCopied,
    /// Older metadata file overwritten by a newer source
    MetadataUpdated,
}

impl Action {
    pub fn label(&self) -> &'static str {
        match self {
            Action::Copied => "Copy",
            Action::Symlinked => "Symlink",
            Action::PlaceholderWritten => "Strm",
            Action::PlaceholderRegenerated => "Regenerate strm",
            Action::MetadataCopied => "Copy metadata",
            Action::MetadataUpdated => "Update metadata",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Successful result of applying a strategy to one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created(Action),
    Skipped,
}

/// Structured per-task result aggregated by the worker pool
#[derive(Debug)]
pub enum TaskOutcome {
    /// Artifact written
    Created(Action),
    /// Up-to-date artifact already present
    Skipped,
    /// This file failed; the run continues
    Failed(SyncError),
    /// The run cannot continue
    Fatal(SyncError),
}

impl From<Result<Applied, SyncError>> for TaskOutcome {
    fn from(result: Result<Applied, SyncError>) -> Self {
        match result {
            Ok(Applied::Created(action)) => TaskOutcome::Created(action),
            Ok(Applied::Skipped) => TaskOutcome::Skipped,
            Err(err) if err.is_fatal() => TaskOutcome::Fatal(err),
            Err(err) => TaskOutcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rebase_joins_relative_path_onto_target() {
        let task = FileTask::rebase(
            Path::new("/mnt/media/Movies"),
            Path::new("/srv/links/Movies"),
            PathBuf::from("/mnt/media/Movies/Heat (1995)/Heat.mkv"),
        )
        .expect("rebase");

        assert_eq!(task.relative_path, PathBuf::from("Heat (1995)/Heat.mkv"));
        assert_eq!(
            task.absolute_target,
            PathBuf::from("/srv/links/Movies/Heat (1995)/Heat.mkv")
        );
    }

    #[test]
    fn test_rebase_rejects_foreign_path() {
        let task = FileTask::rebase(
            Path::new("/mnt/media/Movies"),
            Path::new("/srv/links/Movies"),
            PathBuf::from("/mnt/other/Heat.mkv"),
        );
        assert!(task.is_none());
    }

    #[test]
    fn test_rebase_rejects_root_itself() {
        let task = FileTask::rebase(
            Path::new("/mnt/media/Movies"),
            Path::new("/srv/links/Movies"),
            PathBuf::from("/mnt/media/Movies"),
        );
        assert!(task.is_none());
    }

    #[test]
    fn test_outcome_from_result_splits_error_tiers() {
        let created: TaskOutcome = Ok(Applied::Created(Action::Copied)).into();
        assert!(matches!(created, TaskOutcome::Created(Action::Copied)));

        let skipped: TaskOutcome = Ok(Applied::Skipped).into();
        assert!(matches!(skipped, TaskOutcome::Skipped));

        let failed: TaskOutcome = Err(SyncError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "gone",
        )))
        .into();
        assert!(matches!(failed, TaskOutcome::Failed(_)));

        let fatal: TaskOutcome = Err(SyncError::CloudRootMismatch {
            path: PathBuf::from("/x/y.mkv"),
            root: "/mnt".to_string(),
        })
        .into();
        assert!(matches!(fatal, TaskOutcome::Fatal(_)));
    }
}

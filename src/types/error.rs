//! Error types for medialink

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for medialink operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Standard IO error (automatically converted via #[from])
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error (logic checks)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Permission denied for specific path
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// No space left on the device holding `path`
    #[error("No space left on device: {path}")]
    StorageFull { path: PathBuf },

    /// Source file lies outside the configured cloud mount root
    #[error("Source path {path} is not under cloud root '{root}'")]
    CloudRootMismatch { path: PathBuf, root: String },

    /// A worker task died before reporting its outcome
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}

impl SyncError {
    /// Check if this error must stop the whole run rather than one file
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_) | SyncError::CloudRootMismatch { .. }
        )
    }

    /// Short category used when grouping errors in summaries
    pub fn kind_label(&self) -> &'static str {
        match self {
            SyncError::Io(_) => "I/O error",
            SyncError::Config(_) => "Configuration error",
            SyncError::Validation(_) => "Validation error",
            SyncError::PermissionDenied { .. } => "Permission denied",
            SyncError::StorageFull { .. } => "Disk full",
            SyncError::CloudRootMismatch { .. } => "Cloud root mismatch",
            SyncError::WorkerFailed(_) => "Worker failure",
        }
    }
}

/// Classify an IO error raised while writing `path`.
pub fn map_io_error(path: &Path, error: std::io::Error) -> SyncError {
    if matches!(error.kind(), ErrorKind::PermissionDenied) {
        SyncError::PermissionDenied {
            path: path.to_path_buf(),
        }
    } else if matches!(error.kind(), ErrorKind::StorageFull)
        || matches!(error.raw_os_error(), Some(28 | 122))
    {
        SyncError::StorageFull {
            path: path.to_path_buf(),
        }
    } else {
        SyncError::Io(error)
    }
}

//! Core type definitions for medialink

mod error;
mod job;
mod stats;
mod task;

pub use error::{map_io_error, SyncError};
pub use job::{
    to_slash, CloudBackend, CloudConfig, ExtensionSet, LinkMode, SyncJob, DEFAULT_QUEUE_CAPACITY,
    DEFAULT_SIZE_THRESHOLD,
};
pub use stats::{RunReport, RunStats};
pub use task::{Action, Applied, FileTask, TaskOutcome};

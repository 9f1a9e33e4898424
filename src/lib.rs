//! # medialink - Media Library Mirroring
//!
//! Mirror a media library into a second tree as full copies, symlinks or
//! lightweight `.strm` placeholders, plus a staleness-aware metadata pass
//! for subtitles, artwork and nfo files.

// Module declarations
pub mod config;
pub mod scanner;
pub mod strategy;
pub mod metadata;
pub mod executor;
pub mod ui;
pub mod commands;
pub mod types;

// Re-export commonly used types
pub use types::{
    CloudBackend, CloudConfig, ExtensionSet, FileTask, LinkMode, RunReport, RunStats, SyncError,
    SyncJob,
};
pub use config::Config;
pub use executor::{run_pass, Pass, SyncEvent};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

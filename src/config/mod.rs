//! Configuration management

use crate::executor::Pass;
use crate::types::{
    CloudBackend, CloudConfig, ExtensionSet, LinkMode, SyncError, SyncJob, DEFAULT_QUEUE_CAPACITY,
};
use clap::{ArgAction, Parser, ValueEnum};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Default media extensions for the link pass
pub const DEFAULT_LINK_EXTENSIONS: &str = ".mkv;.iso;.ts;.mp4;.avi;.rmvb;.wmv;.m2ts;.mpg;.flv;.rm";

/// Default auxiliary extensions for the metadata pass
pub const DEFAULT_METADATA_EXTENSIONS: &str = ".nfo;.jpg;.png;.svg;.ass;.srt;.sup";

/// Default worker count
pub const DEFAULT_THREADS: usize = 5;

/// Default copy/symlink boundary in MiB
pub const DEFAULT_SYMLINK_SIZE_MIB: u64 = 20;

/// Link mode as written on the command line or in a job file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModeArg {
    /// Copy small files, symlink large ones
    #[default]
    #[value(alias = "symlink")]
    #[serde(alias = "symlink")]
    CopyOrSymlink,

    /// Write .strm placeholder files
    #[value(alias = "strm")]
    #[serde(alias = "strm")]
    RemotePlaceholder,
}

/// Which passes a run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum PassSelection {
    /// Metadata pass for every source, then link pass for every source
    #[default]
    All,
    Links,
    Metadata,
}

impl PassSelection {
    /// Passes in execution order
    pub fn passes(&self) -> &'static [Pass] {
        match self {
            PassSelection::All => &[Pass::Metadata, Pass::Links],
            PassSelection::Links => &[Pass::Links],
            PassSelection::Metadata => &[Pass::Metadata],
        }
    }
}

/// Command-line interface
#[derive(Debug, Parser)]
#[command(
    name = "medialink",
    version,
    about = "Mirror media libraries as copies, symlinks or strm placeholders"
)]
pub struct Cli {
    /// Source library folders (each gets its own subtree under the target)
    #[arg(value_name = "SOURCE")]
    pub sources: Vec<PathBuf>,

    /// Target folder
    #[arg(short, long)]
    pub target: Option<PathBuf>,

    /// TOML job file; command-line options take precedence
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(short = 'j', long)]
    pub threads: Option<usize>,

    /// Artifact kind for media files
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Media extensions, semicolon separated
    #[arg(long, value_name = "LIST")]
    pub link_extensions: Option<String>,

    /// Metadata extensions, semicolon separated
    #[arg(long, value_name = "LIST")]
    pub metadata_extensions: Option<String>,

    /// Files up to this size (MiB) are copied instead of symlinked
    #[arg(long, value_name = "MIB")]
    pub symlink_size: Option<u64>,

    /// Cloud gateway for placeholder URLs (cd2 or alist)
    #[arg(long, value_name = "TYPE")]
    pub cloud_type: Option<String>,

    /// Local mount point of the cloud storage
    #[arg(long, value_name = "PATH")]
    pub cloud_root_path: Option<String>,

    /// Gateway host:port
    #[arg(long, value_name = "HOST:PORT")]
    pub cloud_url: Option<String>,

    /// Which passes to run
    #[arg(long, value_enum, default_value_t = PassSelection::All)]
    pub pass: PassSelection,

    /// Capacity of the scanner-to-worker queue
    #[arg(long)]
    pub queue_capacity: Option<usize>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors and hide progress
    #[arg(short, long)]
    pub quiet: bool,
}

/// Cloud section of a job file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileCloudConfig {
    #[serde(rename = "type")]
    pub backend: Option<String>,
    pub root_path: Option<String>,
    pub url: Option<String>,
}

/// Read-only TOML job file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub target: Option<PathBuf>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    pub threads: Option<usize>,
    pub mode: Option<ModeArg>,
    pub link_extensions: Option<String>,
    pub metadata_extensions: Option<String>,
    pub symlink_size: Option<u64>,
    pub queue_capacity: Option<usize>,
    pub cloud: Option<FileCloudConfig>,
}

impl FileConfig {
    /// Load and parse a job file.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("Cannot read config file {:?}: {}", path, e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SyncError> {
        toml::from_str(content)
            .map_err(|e| SyncError::Config(format!("Invalid config file: {}", e)))
    }
}

/// Resolved configuration for one invocation
#[derive(Debug, Clone)]
pub struct Config {
    /// Source library roots, processed in order
    pub sources: Vec<PathBuf>,

    /// Parent folder of every mirrored tree
    pub target: PathBuf,

    /// Number of worker threads
    pub threads: usize,

    /// Link pass artifact kind
    pub mode: LinkMode,

    /// Media extensions (case-insensitive)
    pub link_extensions: ExtensionSet,

    /// Metadata extensions (case-sensitive)
    pub metadata_extensions: ExtensionSet,

    /// Passes to run
    pub passes: PassSelection,

    /// Scanner-to-worker queue capacity
    pub queue_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            target: PathBuf::new(),
            threads: DEFAULT_THREADS,
            mode: LinkMode::CopyOrSymlink {
                size_threshold: DEFAULT_SYMLINK_SIZE_MIB * 1024 * 1024,
            },
            link_extensions: ExtensionSet::parse(DEFAULT_LINK_EXTENSIONS, false),
            metadata_extensions: ExtensionSet::parse(DEFAULT_METADATA_EXTENSIONS, true),
            passes: PassSelection::All,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.sources.is_empty() {
            return Err(SyncError::Config(
                "At least one source folder is required".to_string(),
            ));
        }

        if self.target.as_os_str().is_empty() {
            return Err(SyncError::Config("Target folder is required".to_string()));
        }

        if self.threads == 0 {
            return Err(SyncError::Config(
                "Thread count must be a positive integer".to_string(),
            ));
        }

        for pass in self.passes.passes() {
            let set = self.extensions_for(*pass);
            if set.is_empty() {
                return Err(SyncError::Config(format!(
                    "No extensions configured for the {} pass",
                    pass
                )));
            }
        }

        Ok(())
    }

    /// Extension set used by `pass`
    pub fn extensions_for(&self, pass: Pass) -> &ExtensionSet {
        match pass {
            Pass::Links => &self.link_extensions,
            Pass::Metadata => &self.metadata_extensions,
        }
    }

    /// Build the job for one source root and pass.
    pub fn job_for(&self, source: &Path, pass: Pass) -> Result<SyncJob, SyncError> {
        let job = SyncJob::new(
            source,
            &self.target,
            self.extensions_for(pass).clone(),
            self.mode.clone(),
            self.threads,
        )?;
        Ok(job.with_queue_capacity(self.queue_capacity))
    }
}

impl TryFrom<Cli> for Config {
    type Error = SyncError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let file = match &cli.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        let defaults = Config::default();

        let sources: Vec<PathBuf> = if cli.sources.is_empty() {
            file.sources
        } else {
            cli.sources
        }
        .into_iter()
        .filter(|p| !p.as_os_str().to_string_lossy().trim().is_empty())
        .collect();

        let target = cli.target.or(file.target).unwrap_or_default();
        let threads = cli.threads.or(file.threads).unwrap_or(defaults.threads);

        let link_extensions = match cli.link_extensions.or(file.link_extensions) {
            Some(list) => ExtensionSet::parse(&list, false),
            None => defaults.link_extensions,
        };
        let metadata_extensions = match cli.metadata_extensions.or(file.metadata_extensions) {
            Some(list) => ExtensionSet::parse(&list, true),
            None => defaults.metadata_extensions,
        };

        let file_cloud = file.cloud.unwrap_or_default();
        let cloud = resolve_cloud(
            cli.cloud_type.or(file_cloud.backend),
            cli.cloud_root_path.or(file_cloud.root_path),
            cli.cloud_url.or(file_cloud.url),
        )?;

        let mode = match cli.mode.or(file.mode).unwrap_or_default() {
            ModeArg::CopyOrSymlink => {
                if cloud.is_some() {
                    tracing::warn!("Cloud options are ignored in copy-or-symlink mode");
                }
                let mib = cli
                    .symlink_size
                    .or(file.symlink_size)
                    .unwrap_or(DEFAULT_SYMLINK_SIZE_MIB);
                let size_threshold = mib.checked_mul(1024 * 1024).ok_or_else(|| {
                    SyncError::Config(format!("Symlink size {} MiB is too large", mib))
                })?;
                LinkMode::CopyOrSymlink { size_threshold }
            }
            ModeArg::RemotePlaceholder => LinkMode::RemotePlaceholder { cloud },
        };

        let config = Config {
            sources,
            target,
            threads,
            mode,
            link_extensions,
            metadata_extensions,
            passes: cli.pass,
            queue_capacity: cli
                .queue_capacity
                .or(file.queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY)
                .max(1),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Cloud options must be given together or not at all.
fn resolve_cloud(
    backend: Option<String>,
    root_path: Option<String>,
    url: Option<String>,
) -> Result<Option<CloudConfig>, SyncError> {
    match (backend, root_path, url) {
        (None, None, None) => Ok(None),
        (Some(backend), Some(root_path), Some(url)) => Ok(Some(CloudConfig {
            backend: backend.parse::<CloudBackend>()?,
            root_path,
            url,
        })),
        _ => Err(SyncError::Config(
            "Cloud type, cloud root path and cloud url must be set together".to_string(),
        )),
    }
}

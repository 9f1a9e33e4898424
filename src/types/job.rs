//! SyncJob - Resolved description of one source tree to mirror

use super::SyncError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

/// Files at or below this size are copied instead of symlinked (20 MiB).
pub const DEFAULT_SIZE_THRESHOLD: u64 = 20 * 1024 * 1024;

/// Default capacity of the hand-off queue between scanner and workers.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Remote storage gateway that serves the mounted source tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CloudBackend {
    /// CloudDrive2 static file endpoint
    Cd2,
    /// Alist direct download endpoint
    Alist,
}

impl CloudBackend {
    /// Identifier used in configuration files and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudBackend::Cd2 => "cd2",
            CloudBackend::Alist => "alist",
        }
    }
}

impl fmt::Display for CloudBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudBackend {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cd2" => Ok(CloudBackend::Cd2),
            "alist" => Ok(CloudBackend::Alist),
            other => Err(SyncError::Config(format!(
                "unsupported cloud backend '{}' (expected 'cd2' or 'alist')",
                other
            ))),
        }
    }
}

/// Cloud gateway parameters for placeholder URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Gateway flavour, decides the URL template
    #[serde(rename = "type")]
    pub backend: CloudBackend,

    /// Local mount point of the remote storage, stripped from source paths
    pub root_path: String,

    /// Gateway `host:port`
    pub url: String,
}

impl CloudConfig {
    /// Path of `source` relative to the cloud mount root, `/`-separated,
    /// without a leading slash.
    pub fn remote_path(&self, source: &Path) -> Result<String, SyncError> {
        let source_str = to_slash(source);
        let root = self.root_path.replace('\\', "/");
        let root = root.trim_end_matches('/');

        let remainder = if root.is_empty() {
            source_str.as_str()
        } else if source_str == root {
            ""
        } else {
            match source_str.strip_prefix(root) {
                Some(rest) if rest.starts_with('/') => rest,
                _ => {
                    return Err(SyncError::CloudRootMismatch {
                        path: source.to_path_buf(),
                        root: self.root_path.clone(),
                    })
                }
            }
        };

        Ok(remainder.trim_start_matches('/').to_string())
    }
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Which artifact kind the link pass produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMode {
    /// Copy files up to `size_threshold` bytes, symlink anything larger
    CopyOrSymlink { size_threshold: u64 },

    /// Write `.strm` placeholders, optionally pointing at a cloud gateway
    RemotePlaceholder { cloud: Option<CloudConfig> },
}

impl LinkMode {
    /// Human-readable name of the artifacts this mode produces
    pub fn artifact_name(&self) -> &'static str {
        match self {
            LinkMode::CopyOrSymlink { .. } => "symlink",
            LinkMode::RemotePlaceholder { .. } => "strm file",
        }
    }
}

impl Default for LinkMode {
    fn default() -> Self {
        LinkMode::CopyOrSymlink {
            size_threshold: DEFAULT_SIZE_THRESHOLD,
        }
    }
}

/// Normalized set of file-name suffixes with its own case rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionSet {
    suffixes: BTreeSet<String>,
    case_sensitive: bool,
}

impl ExtensionSet {
    /// Parse a semicolon-delimited list such as `.mkv;.mp4; iso`.
    ///
    /// Entries are trimmed, empty entries dropped and a leading dot added
    /// where missing. Case-insensitive sets store lowercased suffixes.
    pub fn parse(list: &str, case_sensitive: bool) -> Self {
        Self::from_suffixes(list.split(';'), case_sensitive)
    }

    /// Build a set from individual suffixes.
    pub fn from_suffixes<I, S>(suffixes: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let suffixes = suffixes
            .into_iter()
            .filter_map(|raw| {
                let trimmed = raw.as_ref().trim();
                if trimmed.is_empty() {
                    return None;
                }
                let dotted = if trimmed.starts_with('.') {
                    trimmed.to_string()
                } else {
                    format!(".{}", trimmed)
                };
                Some(if case_sensitive {
                    dotted
                } else {
                    dotted.to_lowercase()
                })
            })
            .collect();

        Self {
            suffixes,
            case_sensitive,
        }
    }

    /// Does the file name of `path` end with one of the suffixes?
    pub fn matches(&self, path: &Path) -> bool {
        let name = match path.file_name() {
            Some(name) => name.to_string_lossy(),
            None => return false,
        };

        if self.case_sensitive {
            self.suffixes.iter().any(|s| name.ends_with(s.as_str()))
        } else {
            let lower = name.to_lowercase();
            self.suffixes.iter().any(|s| lower.ends_with(s.as_str()))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.suffixes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.suffixes.len()
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }
}

impl fmt::Display for ExtensionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .suffixes
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(";");
        f.write_str(&joined)
    }
}

/// Absolute, lexically normalized form of `path`.
///
/// Symlinks are kept as written, so a source below a symlinked mount still
/// matches a cloud root given through the same mount path.
pub fn absolute_root(path: &Path) -> Result<PathBuf, SyncError> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| {
                SyncError::Config(format!("Cannot resolve source root {:?}: {}", path, e))
            })?
            .join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    Ok(normalized)
}

/// Immutable description of one run over one source tree
#[derive(Debug, Clone)]
pub struct SyncJob {
    source_root: PathBuf,
    target_root: PathBuf,
    extensions: ExtensionSet,
    mode: LinkMode,
    thread_count: usize,
    queue_capacity: usize,
}

impl SyncJob {
    /// Create a job mirroring `source_root` into `target_parent/<source name>`.
    ///
    /// The source root is made absolute against the working directory and
    /// lexically normalized, so `.`/`..` resolve before the name is taken
    /// and every link or placeholder refers to an absolute source path.
    ///
    /// # Errors
    /// * `SyncError::Config` when `thread_count` is zero, the source root has
    ///   no final component, or a cloud root does not contain the source root
    pub fn new(
        source_root: impl Into<PathBuf>,
        target_parent: &Path,
        extensions: ExtensionSet,
        mode: LinkMode,
        thread_count: usize,
    ) -> Result<Self, SyncError> {
        let source_root = absolute_root(&source_root.into())?;

        if thread_count == 0 {
            return Err(SyncError::Config(
                "thread count must be a positive integer".to_string(),
            ));
        }

        let source_name = source_root.file_name().ok_or_else(|| {
            SyncError::Config(format!(
                "Cannot derive a target folder name from source root {:?}",
                source_root
            ))
        })?;
        let target_root = target_parent.join(source_name);

        if let LinkMode::RemotePlaceholder { cloud: Some(cloud) } = &mode {
            cloud.remote_path(&source_root).map_err(|_| {
                SyncError::Config(format!(
                    "Source root {:?} is not under cloud root '{}'",
                    source_root, cloud.root_path
                ))
            })?;
        }

        Ok(Self {
            source_root,
            target_root,
            extensions,
            mode,
            thread_count,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        })
    }

    /// Override the scanner-to-worker queue capacity (minimum 1).
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Recomputed target root: `<target parent>/<source name>`
    pub fn target_root(&self) -> &Path {
        &self.target_root
    }

    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    pub fn mode(&self) -> &LinkMode {
        &self.mode
    }

    pub fn thread_count(&self) -> usize {
        self.thread_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alist(root: &str) -> CloudConfig {
        CloudConfig {
            backend: CloudBackend::Alist,
            root_path: root.to_string(),
            url: "host:5244".to_string(),
        }
    }

    #[test]
    fn test_extension_set_normalizes_entries() {
        let set = ExtensionSet::parse(" .mkv ; mp4;;.ISO ", false);
        assert_eq!(set.len(), 3);
        assert_eq!(set.to_string(), ".iso;.mkv;.mp4");
    }

    #[test]
    fn test_extension_set_case_insensitive_match() {
        let set = ExtensionSet::parse(".mkv;.mp4", false);
        assert!(set.matches(Path::new("/lib/Movie.MKV")));
        assert!(set.matches(Path::new("/lib/clip.mp4")));
        assert!(!set.matches(Path::new("/lib/poster.jpg")));
    }

    #[test]
    fn test_extension_set_case_sensitive_match() {
        let set = ExtensionSet::parse(".nfo;.srt", true);
        assert!(set.matches(Path::new("/lib/movie.nfo")));
        assert!(!set.matches(Path::new("/lib/movie.NFO")));
        assert!(set.is_case_sensitive());
    }

    #[test]
    fn test_extension_set_matches_file_name_only() {
        let set = ExtensionSet::parse(".mkv", false);
        assert!(!set.matches(Path::new("/lib.mkv/movie.avi")));
        assert!(!set.matches(Path::new("/")));
    }

    #[test]
    fn test_cloud_backend_from_str() {
        assert_eq!("cd2".parse::<CloudBackend>().unwrap(), CloudBackend::Cd2);
        assert_eq!(" Alist ".parse::<CloudBackend>().unwrap(), CloudBackend::Alist);

        let err = "webdav".parse::<CloudBackend>().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("webdav"));
    }

    #[test]
    fn test_cloud_remote_path_strips_root() {
        let cloud = alist("/mnt/media");
        let rel = cloud
            .remote_path(Path::new("/mnt/media/Show/ep1.mkv"))
            .expect("remote path");
        assert_eq!(rel, "Show/ep1.mkv");
    }

    #[test]
    fn test_cloud_remote_path_tolerates_trailing_slash_root() {
        let cloud = alist("/mnt/media/");
        let rel = cloud
            .remote_path(Path::new("/mnt/media/Show/ep1.mkv"))
            .expect("remote path");
        assert_eq!(rel, "Show/ep1.mkv");
    }

    #[test]
    fn test_cloud_remote_path_requires_component_boundary() {
        let cloud = alist("/mnt/media");
        let err = cloud
            .remote_path(Path::new("/mnt/media2/Show/ep1.mkv"))
            .unwrap_err();
        assert!(matches!(err, SyncError::CloudRootMismatch { .. }));
    }

    #[test]
    fn test_job_recomputes_target_root() {
        let job = SyncJob::new(
            "/mnt/media/Movies",
            Path::new("/srv/links"),
            ExtensionSet::parse(".mkv", false),
            LinkMode::default(),
            4,
        )
        .expect("job");
        assert_eq!(job.target_root(), Path::new("/srv/links/Movies"));
        assert_eq!(job.queue_capacity(), DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_job_normalizes_dot_components() {
        for source in ["/mnt/media/Movies/.", "/mnt/media/Shows/../Movies/"] {
            let job = SyncJob::new(
                source,
                Path::new("/srv/links"),
                ExtensionSet::parse(".mkv", false),
                LinkMode::default(),
                1,
            )
            .expect("job");
            assert_eq!(job.source_root(), Path::new("/mnt/media/Movies"));
            assert_eq!(job.target_root(), Path::new("/srv/links/Movies"));
        }
    }

    #[test]
    fn test_job_resolves_relative_source_against_cwd() {
        let job = SyncJob::new(
            "Movies",
            Path::new("/srv/links"),
            ExtensionSet::parse(".mkv", false),
            LinkMode::default(),
            1,
        )
        .expect("job");
        let cwd = std::env::current_dir().expect("cwd");
        assert!(job.source_root().is_absolute());
        assert_eq!(job.source_root(), cwd.join("Movies"));
        assert_eq!(job.target_root(), Path::new("/srv/links/Movies"));
    }

    #[test]
    fn test_job_rejects_zero_threads() {
        let err = SyncJob::new(
            "/mnt/media/Movies",
            Path::new("/srv/links"),
            ExtensionSet::parse(".mkv", false),
            LinkMode::default(),
            0,
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_job_rejects_source_outside_cloud_root() {
        let err = SyncJob::new(
            "/srv/other/Movies",
            Path::new("/srv/links"),
            ExtensionSet::parse(".mkv", false),
            LinkMode::RemotePlaceholder {
                cloud: Some(alist("/mnt/media")),
            },
            2,
        )
        .unwrap_err();
        assert!(matches!(err, SyncError::Config(_)));
    }

    #[test]
    fn test_job_queue_capacity_minimum_one() {
        let job = SyncJob::new(
            "/mnt/media/Movies",
            Path::new("/srv/links"),
            ExtensionSet::parse(".mkv", false),
            LinkMode::default(),
            1,
        )
        .expect("job")
        .with_queue_capacity(0);
        assert_eq!(job.queue_capacity(), 1);
    }
}

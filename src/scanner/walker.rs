//! Lazy source-tree walker

use crate::types::{ExtensionSet, FileTask};
use std::fs;
use std::path::{Path, PathBuf};

/// Lazy, non-restartable walk over files matching an extension set
///
/// Traversal policy:
/// - ignore files (`.gitignore`, `.ignore`) and hidden-file filtering are off
/// - symlinked directories are not descended
/// - symlinks to files are yielded, dangling symlinks are skipped
/// - unreadable entries are logged and skipped
/// - a missing root yields nothing
pub struct PathScanner {
    walk: ignore::Walk,
    extensions: ExtensionSet,
    matched: u64,
}

impl PathScanner {
    pub fn new(root: &Path, extensions: ExtensionSet) -> Self {
        let walk = ignore::WalkBuilder::new(root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .build();

        Self {
            walk,
            extensions,
            matched: 0,
        }
    }

    /// Number of files yielded so far
    pub fn matched(&self) -> u64 {
        self.matched
    }
}

impl Iterator for PathScanner {
    type Item = PathBuf;

    fn next(&mut self) -> Option<PathBuf> {
        for result in self.walk.by_ref() {
            let entry = match result {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable entry during scan: {}", e);
                    continue;
                }
            };

            let file_type = match entry.file_type() {
                Some(ft) => ft,
                None => continue,
            };

            if file_type.is_dir() {
                continue;
            }

            if file_type.is_symlink() {
                // Only symlinks that resolve to regular files count
                match fs::metadata(entry.path()) {
                    Ok(meta) if meta.is_file() => {}
                    Ok(_) => continue,
                    Err(e) => {
                        tracing::debug!("Skipping dangling symlink {}: {}", entry.path().display(), e);
                        continue;
                    }
                }
            } else if !file_type.is_file() {
                continue;
            }

            if !self.extensions.matches(entry.path()) {
                continue;
            }

            self.matched += 1;
            return Some(entry.into_path());
        }

        None
    }
}

/// Walk `source_root` and re-base every match onto `target_root`.
pub fn scan_tasks<'a>(
    scanner: &'a mut PathScanner,
    source_root: &'a Path,
    target_root: &'a Path,
) -> impl Iterator<Item = FileTask> + 'a {
    scanner.filter_map(move |source| {
        let task = FileTask::rebase(source_root, target_root, source.clone());
        if task.is_none() {
            tracing::warn!(
                "Skipping {}: not under source root {}",
                source.display(),
                source_root.display()
            );
        }
        task
    })
}

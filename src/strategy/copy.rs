//! Atomic file copy implementation

use crate::types::{map_io_error, SyncError};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Copy a file atomically using the write-then-rename strategy
///
/// 1. Write to a sibling `<name>.part` file
/// 2. Flush and sync to disk
/// 3. Preserve metadata (permissions, mtime)
/// 4. Rename over the final destination
///
/// An existing destination is replaced by the rename.
///
/// # Returns
/// * `Ok(u64)` - Number of bytes copied
/// * `Err(SyncError)` - IO error or other failure
///
/// # Example
/// ```no_run
/// use medialink::strategy::copy_file_atomic;
/// use std::path::Path;
///
/// let bytes = copy_file_atomic(Path::new("movie.nfo"), Path::new("mirror/movie.nfo"))?;
/// # Ok::<(), medialink::SyncError>(())
/// ```
pub fn copy_file_atomic(src: &Path, dest: &Path) -> Result<u64, SyncError> {
    // STEP 1: Prepare - Create parent directories and .part path
    ensure_parent_dir(dest)?;
    let part_path = part_path_for(dest);

    // STEP 2: Copy - Stream from src to .part file
    let mut src_file = File::open(src).map_err(SyncError::Io)?;
    // Declared before the handle so the file is closed before removal
    let mut guard = PartFileGuard::new(&part_path);
    let mut part_file = File::create(&part_path).map_err(|e| map_io_error(&part_path, e))?;

    let mut buffer = vec![0u8; 128 * 1024];
    let mut total_bytes = 0u64;

    loop {
        let bytes_read = src_file.read(&mut buffer).map_err(SyncError::Io)?;

        if bytes_read == 0 {
            break;
        }

        part_file
            .write_all(&buffer[0..bytes_read])
            .map_err(|e| map_io_error(&part_path, e))?;
        total_bytes += bytes_read as u64;
    }

    // STEP 3: Flush
    part_file
        .sync_all()
        .map_err(|e| map_io_error(&part_path, e))?;

    // Drop the file handle before rename (required on Windows)
    drop(part_file);

    // STEP 4: Metadata - Preserve permissions and mtime
    let src_metadata = fs::metadata(src).map_err(SyncError::Io)?;
    fs::set_permissions(&part_path, src_metadata.permissions())
        .map_err(|e| map_io_error(&part_path, e))?;

    let mtime = filetime::FileTime::from_last_modification_time(&src_metadata);
    filetime::set_file_mtime(&part_path, mtime).map_err(|e| map_io_error(&part_path, e))?;

    // STEP 5: Commit
    fs::rename(&part_path, dest).map_err(|e| map_io_error(dest, e))?;
    guard.commit();

    Ok(total_bytes)
}

/// Create the parent directory of `path` if needed.
///
/// Safe to call from several workers for the same directory.
pub fn ensure_parent_dir(path: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| map_io_error(parent, e))?;
    }
    Ok(())
}

/// Removes an uncommitted `.part` file when the copy bails out early.
struct PartFileGuard<'a> {
    path: &'a Path,
    committed: bool,
}

impl<'a> PartFileGuard<'a> {
    fn new(path: &'a Path) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn commit(&mut self) {
        self.committed = true;
    }
}

impl Drop for PartFileGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(self.path);
        }
    }
}

fn part_path_for(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("medialink"));
    name.push(".part");
    dest.with_file_name(name)
}

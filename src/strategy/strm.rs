//! Remote-placeholder (`.strm`) branch of the link strategy
//!
//! A placeholder is a single-line text file holding either the
//! percent-encoded source path or a gateway URL for it. An existing
//! placeholder is kept only while the source it records still exists.

use super::copy::ensure_parent_dir;
use crate::types::{
    map_io_error, to_slash, Action, Applied, CloudBackend, CloudConfig, ExtensionSet, FileTask,
    SyncError,
};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Extension of placeholder files
pub const PLACEHOLDER_EXTENSION: &str = "strm";

/// Where the placeholder for `task` lives
pub fn placeholder_path(task: &FileTask) -> PathBuf {
    task.absolute_target.with_extension(PLACEHOLDER_EXTENSION)
}

/// Build the placeholder text for `source`.
///
/// Without a cloud gateway this is the source path with every segment
/// percent-encoded. With a gateway the path is made relative to the mount
/// root, encoded as a single component and embedded in the backend URL.
pub fn placeholder_content(source: &Path, cloud: Option<&CloudConfig>) -> Result<String, SyncError> {
    let cloud = match cloud {
        Some(cloud) => cloud,
        None => return Ok(encode_path(&to_slash(source))),
    };

    let remote = cloud.remote_path(source)?;
    let encoded = urlencoding::encode(&remote);

    Ok(match cloud.backend {
        CloudBackend::Cd2 => format!(
            "http://{url}/static/http/{url}/False/{path}",
            url = cloud.url,
            path = encoded
        ),
        CloudBackend::Alist => format!("http://{}/d/{}", cloud.url, encoded),
    })
}

/// Write, keep or regenerate the placeholder for `task`.
///
/// Matching sources that differ only in extension share one placeholder
/// path. Only the sibling with the smallest file name writes it; the others
/// are skipped whatever order the workers reach them in.
pub fn generate_placeholder(
    task: &FileTask,
    cloud: Option<&CloudConfig>,
    extensions: &ExtensionSet,
) -> Result<Applied, SyncError> {
    if !owns_placeholder(task, extensions)? {
        tracing::debug!(
            "{} shares its placeholder with a sibling, skipping",
            task.absolute_source.display()
        );
        return Ok(Applied::Skipped);
    }

    let strm_path = placeholder_path(task);
    let mut action = Action::PlaceholderWritten;

    let existing = fs::symlink_metadata(&strm_path).is_ok();
    if existing && is_placeholder_valid(&strm_path, task)? {
        return Ok(Applied::Skipped);
    }

    let content = placeholder_content(&task.absolute_source, cloud)?;

    if existing {
        fs::remove_file(&strm_path).map_err(|e| map_io_error(&strm_path, e))?;
        tracing::debug!("Removed stale placeholder {}", strm_path.display());
        action = Action::PlaceholderRegenerated;
    }

    ensure_parent_dir(&strm_path)?;
    fs::write(&strm_path, content).map_err(|e| map_io_error(&strm_path, e))?;

    Ok(Applied::Created(action))
}

/// Does the placeholder at `strm_path` still refer to an existing source?
///
/// The recorded reference only contributes its extension: the source is
/// reconstructed from the task's relative position, so a placeholder stays
/// valid when the library is remounted elsewhere.
pub fn is_placeholder_valid(strm_path: &Path, task: &FileTask) -> Result<bool, SyncError> {
    let raw = fs::read_to_string(strm_path).map_err(SyncError::Io)?;
    let reference = raw.trim();
    if reference.is_empty() {
        return Ok(false);
    }

    let decoded = match urlencoding::decode(reference) {
        Ok(decoded) => decoded,
        Err(_) => return Ok(false),
    };

    let extension = match Path::new(decoded.as_ref()).extension() {
        Some(ext) => ext.to_os_string(),
        None => return Ok(false),
    };

    Ok(task.absolute_source.with_extension(extension).exists())
}

/// Is `task` the matching source with the smallest name among those sharing its stem?
fn owns_placeholder(task: &FileTask, extensions: &ExtensionSet) -> Result<bool, SyncError> {
    let source = &task.absolute_source;
    let (dir, stem, name) = match (source.parent(), source.file_stem(), source.file_name()) {
        (Some(dir), Some(stem), Some(name)) => (dir, stem, name),
        _ => return Ok(true),
    };

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(SyncError::Io(e)),
    };
    for entry in entries {
        let entry = entry.map_err(SyncError::Io)?;
        let sibling_name = entry.file_name();
        if sibling_name.as_os_str() >= name {
            continue;
        }
        let sibling = entry.path();
        if sibling.file_stem() == Some(stem) && extensions.matches(&sibling) && sibling.is_file() {
            return Ok(false);
        }
    }
    Ok(true)
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cloud(backend: CloudBackend) -> CloudConfig {
        CloudConfig {
            backend,
            root_path: "/mnt/media".to_string(),
            url: "host:5244".to_string(),
        }
    }

    #[test]
    fn test_alist_url() {
        let content = placeholder_content(
            Path::new("/mnt/media/Show/ep1.mkv"),
            Some(&cloud(CloudBackend::Alist)),
        )
        .expect("content");
        assert_eq!(content, "http://host:5244/d/Show%2Fep1.mkv");
    }

    #[test]
    fn test_cd2_url() {
        let content = placeholder_content(
            Path::new("/mnt/media/Show/ep1.mkv"),
            Some(&cloud(CloudBackend::Cd2)),
        )
        .expect("content");
        assert_eq!(
            content,
            "http://host:5244/static/http/host:5244/False/Show%2Fep1.mkv"
        );
    }

    #[test]
    fn test_cloud_url_encodes_special_characters() {
        let content = placeholder_content(
            Path::new("/mnt/media/Heat (1995)/Heat & Co.mkv"),
            Some(&cloud(CloudBackend::Alist)),
        )
        .expect("content");
        assert_eq!(
            content,
            "http://host:5244/d/Heat%20%281995%29%2FHeat%20%26%20Co.mkv"
        );
    }

    #[test]
    fn test_cloud_source_outside_root_is_fatal() {
        let err = placeholder_content(
            Path::new("/srv/elsewhere/ep1.mkv"),
            Some(&cloud(CloudBackend::Alist)),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_local_content_keeps_separators() {
        let content =
            placeholder_content(Path::new("/mnt/media/My Show/ep 1.mkv"), None).expect("content");
        assert_eq!(content, "/mnt/media/My%20Show/ep%201.mkv");
    }

    fn media() -> ExtensionSet {
        ExtensionSet::parse(".mkv;.mp4", false)
    }

    fn strm_task(src: &TempDir, dst: &TempDir, rel: &str) -> FileTask {
        FileTask::rebase(src.path(), dst.path(), src.path().join(rel)).expect("rebase")
    }

    #[test]
    fn test_placeholder_written_then_skipped() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::create_dir_all(src.path().join("Show")).expect("create Show");
        fs::write(src.path().join("Show/ep1.mkv"), b"video").expect("write source");

        let task = strm_task(&src, &dst, "Show/ep1.mkv");
        assert_eq!(
            generate_placeholder(&task, None, &media()).expect("first run"),
            Applied::Created(Action::PlaceholderWritten)
        );

        let strm = dst.path().join("Show/ep1.strm");
        let written = fs::read_to_string(&strm).expect("read strm");
        assert_eq!(
            urlencoding::decode(&written).expect("decode").as_ref(),
            to_slash(&task.absolute_source)
        );

        assert_eq!(generate_placeholder(&task, None, &media()).expect("second run"), Applied::Skipped);
    }

    #[test]
    fn test_stale_placeholder_is_regenerated() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("ep1.mp4"), b"video").expect("write source");
        fs::write(dst.path().join("ep1.strm"), "/old/library/ep1.mkv").expect("write stale strm");

        let task = strm_task(&src, &dst, "ep1.mp4");
        assert_eq!(
            generate_placeholder(&task, None, &media()).expect("regenerate"),
            Applied::Created(Action::PlaceholderRegenerated)
        );

        let content = fs::read_to_string(dst.path().join("ep1.strm")).expect("read strm");
        assert!(content.ends_with("ep1.mp4"));
    }

    #[test]
    fn test_empty_placeholder_is_stale() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("ep1.mkv"), b"video").expect("write source");
        fs::write(dst.path().join("ep1.strm"), "  \n").expect("write empty strm");

        let task = strm_task(&src, &dst, "ep1.mkv");
        assert!(!is_placeholder_valid(&dst.path().join("ep1.strm"), &task).expect("check"));
    }

    #[test]
    fn test_cloud_placeholder_validates_by_extension() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("ep1.mkv"), b"video").expect("write source");
        fs::write(
            dst.path().join("ep1.strm"),
            "http://host:5244/d/Show%2Fep1.mkv",
        )
        .expect("write strm");

        let task = strm_task(&src, &dst, "ep1.mkv");
        assert!(is_placeholder_valid(&dst.path().join("ep1.strm"), &task).expect("check"));
    }

    #[test]
    fn test_unreadable_placeholder_is_per_file_error() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("ep1.mkv"), b"video").expect("write source");
        // A directory where the placeholder should be cannot be read as text
        fs::create_dir(dst.path().join("ep1.strm")).expect("create blocking dir");

        let task = strm_task(&src, &dst, "ep1.mkv");
        let err = generate_placeholder(&task, None, &media()).unwrap_err();
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_siblings_sharing_a_stem_have_one_owner() {
        let src = TempDir::new().expect("create src tempdir");
        let dst = TempDir::new().expect("create dst tempdir");
        fs::write(src.path().join("ep1.mkv"), b"video").expect("write mkv");
        fs::write(src.path().join("ep1.mp4"), b"video").expect("write mp4");
        fs::write(src.path().join("ep1.nfo"), b"<ep/>").expect("write nfo");

        let mkv = strm_task(&src, &dst, "ep1.mkv");
        let mp4 = strm_task(&src, &dst, "ep1.mp4");

        // Reached first, the non-owner still leaves the path alone
        assert_eq!(
            generate_placeholder(&mp4, None, &media()).expect("mp4"),
            Applied::Skipped
        );
        assert!(!dst.path().join("ep1.strm").exists());

        assert_eq!(
            generate_placeholder(&mkv, None, &media()).expect("mkv"),
            Applied::Created(Action::PlaceholderWritten)
        );
        let content = fs::read_to_string(dst.path().join("ep1.strm")).expect("read strm");
        assert!(content.ends_with("ep1.mkv"));

        // A sibling outside the extension set does not compete
        let only_mp4 = ExtensionSet::parse(".mp4", false);
        fs::remove_file(dst.path().join("ep1.strm")).expect("remove strm");
        assert_eq!(
            generate_placeholder(&mp4, None, &only_mp4).expect("mp4 alone"),
            Applied::Created(Action::PlaceholderWritten)
        );
    }
}

//! File operation utilities
//!
//! Destination directories, partial files and the final rename.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::downloader::core::{DownloadError, FileOperation, Result};

/// Name used when neither the response nor the URL yields one
pub const FALLBACK_FILENAME: &str = "downloaded_file";

/// Reduce a server- or URL-supplied name to a single path component
///
/// Returns `None` for names that would not produce a regular file inside
/// the destination directory.
pub fn sanitize_filename(raw: &str) -> Option<String> {
    let last = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    match last {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Final path segment of a URL, without query or fragment
pub fn filename_from_url(url: &str) -> Option<String> {
    match url::Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(sanitize_filename),
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or(url);
            sanitize_filename(path)
        }
    }
}

/// Create a directory and its parents; an existing directory is fine
pub async fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| DownloadError::fs(dir, FileOperation::CreateDir, e))
}

pub async fn file_exists(path: &Path) -> bool {
    match fs::try_exists(path).await {
        Ok(exists) => exists,
        Err(e) => {
            debug!("Could not check {}: {}", path.display(), e);
            false
        }
    }
}

/// Sibling path the body is streamed into before the final rename
pub fn create_temp_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest_path.with_file_name(name)
}

/// Move a finished temp file over its destination
pub async fn atomic_rename(temp_path: &Path, dest_path: &Path) -> Result<()> {
    fs::rename(temp_path, dest_path)
        .await
        .map_err(|e| DownloadError::fs(dest_path, FileOperation::Rename, e))?;
    debug!("Renamed {} to {}", temp_path.display(), dest_path.display());
    Ok(())
}

/// Best-effort removal of a partial file after a failed transfer
pub async fn discard_partial(temp_path: &Path) {
    match fs::remove_file(temp_path).await {
        Ok(()) => debug!("Removed partial file {}", temp_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial file {}: {}", temp_path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf").as_deref(), Some("report.pdf"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("C:\\temp\\a.txt").as_deref(), Some("a.txt"));
        assert_eq!(sanitize_filename("  spaced.txt ").as_deref(), Some("spaced.txt"));
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(""), None);
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(
            filename_from_url("https://example.com/files/archive.tar.gz?token=1#x").as_deref(),
            Some("archive.tar.gz")
        );
        assert_eq!(filename_from_url("https://example.com/"), None);
        assert_eq!(filename_from_url("https://example.com"), None);
        assert_eq!(filename_from_url("not a url/thing.bin?x=1").as_deref(), Some("thing.bin"));
    }

    #[test]
    fn test_temp_path_keeps_full_name() {
        assert_eq!(
            create_temp_path(Path::new("/data/a.tar.gz")),
            PathBuf::from("/data/a.tar.gz.part")
        );
    }

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let root = tempdir().unwrap();
        let nested = root.path().join("a").join("b").join("c");
        ensure_dir(&nested).await.unwrap();
        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_concurrent_ensure_dir() {
        let root = tempdir().unwrap();
        let shared = root.path().join("shared");
        let dirs: Vec<PathBuf> = (0..8).map(|i| shared.join(format!("d{}", i % 3))).collect();
        let results = futures::future::join_all(dirs.iter().map(|d| ensure_dir(d))).await;
        assert!(results.iter().all(|r| r.is_ok()));
    }

    #[tokio::test]
    async fn test_discard_missing_partial_is_quiet() {
        let root = tempdir().unwrap();
        discard_partial(&root.path().join("nothing.part")).await;
    }
}

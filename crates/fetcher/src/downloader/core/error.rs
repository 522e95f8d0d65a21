//! Error types for the fetcher with enough context to tell resources apart

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::downloader::batch::BatchReport;

/// Everything that can fail while resolving, verifying or transferring a resource
#[derive(Error, Debug)]
pub enum DownloadError {
    /// Request could not be issued or the body stream broke
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// URL parsing errors
    #[error("Invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid HTTP method '{method}'")]
    InvalidMethod { method: String },

    /// File system I/O errors with file context
    #[error("File operation failed on '{path}' while {operation}")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// Per-resource deadline expired
    #[error("Download of '{url}' timed out after {}s", .after.as_secs())]
    Timeout { url: String, after: Duration },

    /// Cancelled through the downloader's cancellation token
    #[error("Download of '{url}' was cancelled")]
    Cancelled { url: String },

    #[error("Invalid configuration: {message}")]
    Configuration { message: String },

    /// Raised after a run only when `fail_on_error` is enabled; the full
    /// report travels with it
    #[error("{failed} of {total} resources failed to download")]
    BatchFailed {
        failed: usize,
        total: usize,
        report: Box<BatchReport>,
    },

    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Rename,
    CreateDir,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Rename => write!(f, "renaming"),
            FileOperation::CreateDir => write!(f, "creating directory"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;

impl DownloadError {
    /// Wrap an I/O error with the path and operation it came from
    pub fn fs<P: Into<PathBuf>>(path: P, operation: FileOperation, source: std::io::Error) -> Self {
        DownloadError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn request<S: Into<String>>(url: S, source: reqwest::Error) -> Self {
        DownloadError::HttpRequest {
            url: url.into(),
            source,
        }
    }

    /// Get error category for metrics and logging
    pub fn category(&self) -> &'static str {
        match self {
            DownloadError::HttpRequest { .. } => "http_request",
            DownloadError::HttpStatus { .. } => "http_status",
            DownloadError::InvalidUrl { .. } => "invalid_url",
            DownloadError::InvalidMethod { .. } => "invalid_method",
            DownloadError::FileSystem { .. } => "file_system",
            DownloadError::Timeout { .. } => "timeout",
            DownloadError::Cancelled { .. } => "cancelled",
            DownloadError::Configuration { .. } => "configuration",
            DownloadError::BatchFailed { .. } => "batch_failed",
            DownloadError::ClientBuild(_) => "client_build",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_system_error_message_names_path_and_operation() {
        let err = DownloadError::fs(
            "/tmp/out/file.bin",
            FileOperation::CreateDir,
            std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        );
        let message = err.to_string();
        assert!(message.contains("/tmp/out/file.bin"));
        assert!(message.contains("creating directory"));
        assert_eq!(err.category(), "file_system");
    }

    #[test]
    fn test_timeout_message_names_url_and_deadline() {
        let err = DownloadError::Timeout {
            url: "http://example.com/a".to_string(),
            after: Duration::from_secs(5),
        };
        assert_eq!(err.category(), "timeout");
        assert_eq!(err.to_string(), "Download of 'http://example.com/a' timed out after 5s");
    }
}

//! Core types used throughout the downloader
//!
//! Everything else in the downloader depends on these. The only way back out
//! is the batch report carried by [`DownloadError::BatchFailed`].

pub mod error;
pub mod files;
pub mod hasher;
pub mod http;
pub mod metrics;
pub mod progress;
pub mod speed;

pub use error::{DownloadError, FileOperation, Result};
pub use metrics::{DownloadMetrics, DownloadMetricsSnapshot};
pub use progress::{
    ConsoleProgressReporter, DoneOptions, IntoProgressCallback, NullProgressReporter,
    ProgressCallback, ProgressEvent, ProgressReporter, RecordingProgressReporter, Style,
    TaskKind, TaskOptions, TaskUpdate,
};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the response body is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Chunks are written as they arrive, with a progress update per chunk
    #[default]
    Stream,
    /// The whole body is collected first, then written in one go
    #[serde(alias = "arraybuffer", alias = "blob")]
    Buffered,
}

/// One file to fetch
///
/// Deserializes from either a bare URL string or an object with camelCase
/// keys (`url`, `filename`, `destinationDir`, `method`, `responseType`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DescriptorRepr", rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub url: String,
    /// Explicit file name; otherwise taken from the response
    pub filename: Option<String>,
    /// Directory below the installation root; the configured default if unset
    pub destination_dir: Option<PathBuf>,
    pub method: String,
    pub response_type: ResponseType,
}

impl ResourceDescriptor {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            filename: None,
            destination_dir: None,
            method: "GET".to_string(),
            response_type: ResponseType::default(),
        }
    }

    pub fn with_filename<S: Into<String>>(mut self, filename: S) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_destination_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.destination_dir = Some(dir.into());
        self
    }

    pub fn with_method<S: Into<String>>(mut self, method: S) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }

    /// A blank URL is accepted and does nothing
    pub fn is_blank(&self) -> bool {
        self.url.trim().is_empty()
    }

    pub(crate) fn destination_dir_or<'a>(&'a self, default: &'a Path) -> &'a Path {
        self.destination_dir.as_deref().unwrap_or(default)
    }
}

impl From<&str> for ResourceDescriptor {
    fn from(url: &str) -> Self {
        Self::new(url)
    }
}

impl From<String> for ResourceDescriptor {
    fn from(url: String) -> Self {
        Self::new(url)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorRepr {
    Url(String),
    Full(FullDescriptor),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FullDescriptor {
    #[serde(default)]
    url: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    destination_dir: Option<PathBuf>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    response_type: ResponseType,
}

impl From<DescriptorRepr> for ResourceDescriptor {
    fn from(repr: DescriptorRepr) -> Self {
        match repr {
            DescriptorRepr::Url(url) => ResourceDescriptor::new(url),
            DescriptorRepr::Full(full) => ResourceDescriptor {
                url: full.url,
                filename: full.filename.filter(|name| !name.is_empty()),
                destination_dir: full.destination_dir,
                method: full.method.unwrap_or_else(|| "GET".to_string()),
                response_type: full.response_type,
            },
        }
    }
}

/// What the caller asked to download: one resource or a list
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResourceInput {
    List(Vec<ResourceDescriptor>),
    Single(ResourceDescriptor),
}

impl From<&str> for ResourceInput {
    fn from(url: &str) -> Self {
        ResourceInput::Single(url.into())
    }
}

impl From<String> for ResourceInput {
    fn from(url: String) -> Self {
        ResourceInput::Single(url.into())
    }
}

impl From<ResourceDescriptor> for ResourceInput {
    fn from(descriptor: ResourceDescriptor) -> Self {
        ResourceInput::Single(descriptor)
    }
}

impl From<Vec<ResourceDescriptor>> for ResourceInput {
    fn from(list: Vec<ResourceDescriptor>) -> Self {
        ResourceInput::List(list)
    }
}

/// Result of a successful download operation
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadResult {
    /// No file existed, the body was written
    Downloaded { path: PathBuf, size: u64 },
    /// The existing file did not match the remote content and was replaced
    Redownloaded { path: PathBuf, size: u64 },
    /// The existing file matched the remote content, nothing was written
    AlreadyVerified { path: PathBuf, size: u64 },
    /// Blank URL, nothing was done
    Skipped,
}

impl DownloadResult {
    pub fn path(&self) -> Option<&Path> {
        match self {
            DownloadResult::Downloaded { path, .. }
            | DownloadResult::Redownloaded { path, .. }
            | DownloadResult::AlreadyVerified { path, .. } => Some(path),
            DownloadResult::Skipped => None,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            DownloadResult::Downloaded { size, .. }
            | DownloadResult::Redownloaded { size, .. }
            | DownloadResult::AlreadyVerified { size, .. } => *size,
            DownloadResult::Skipped => 0,
        }
    }
}

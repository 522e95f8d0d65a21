//! Configuration types for the downloader

use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::downloader::core::{DownloadError, Result};

/// How a list of resources is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleMode {
    /// Fixed groups of `batch_size`; a group starts once the previous one settled
    #[default]
    Batches,
    /// At most `batch_size` in flight; a finished download frees its slot at once
    Sliding,
}

/// Configuration for download operations
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Concurrent downloads per batch
    pub batch_size: usize,
    pub schedule: ScheduleMode,
    /// Base directory destination directories are resolved against
    pub installation_root: PathBuf,
    /// Used when a descriptor has no destination directory
    pub default_destination_dir: PathBuf,
    pub user_agent: String,
    pub connect_timeout: Duration,
    /// Deadline for one resource from request to completion; none by default
    pub resource_timeout: Option<Duration>,
    /// Minimum delay between two progress updates of one transfer
    pub progress_interval: Duration,
    /// Largest body kept in memory while verifying an existing file
    pub verify_buffer_limit: u64,
    /// Turn a run with failed resources into an error
    pub fail_on_error: bool,
}

impl DownloadConfig {
    pub fn builder() -> DownloadConfigBuilder {
        DownloadConfigBuilder::default()
    }

    /// Defaults overridden by `FETCHER_*` environment variables
    ///
    /// Recognised: `FETCHER_ROOT`, `FETCHER_DEST_DIR`, `FETCHER_BATCH_SIZE`,
    /// `FETCHER_TIMEOUT_SECS`, `FETCHER_USER_AGENT`. Unparseable numbers are
    /// logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(root) = lookup("FETCHER_ROOT") {
            config.installation_root = PathBuf::from(root);
        }
        if let Some(dir) = lookup("FETCHER_DEST_DIR") {
            config.default_destination_dir = PathBuf::from(dir);
        }
        if let Some(agent) = lookup("FETCHER_USER_AGENT") {
            config.user_agent = agent;
        }
        if let Some(raw) = lookup("FETCHER_BATCH_SIZE") {
            match raw.trim().parse::<usize>() {
                Ok(size) => config.batch_size = size,
                Err(e) => warn!("Ignoring FETCHER_BATCH_SIZE={:?}: {}", raw, e),
            }
        }
        if let Some(raw) = lookup("FETCHER_TIMEOUT_SECS") {
            match raw.trim().parse::<u64>() {
                Ok(0) => config.resource_timeout = None,
                Ok(secs) => config.resource_timeout = Some(Duration::from_secs(secs)),
                Err(e) => warn!("Ignoring FETCHER_TIMEOUT_SECS={:?}: {}", raw, e),
            }
        }

        config
    }

    /// Reject settings the scheduler cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DownloadError::Configuration {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        if self.resource_timeout == Some(Duration::ZERO) {
            return Err(DownloadError::Configuration {
                message: "resource_timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Directory a descriptor's file lands in
    ///
    /// Only the normal components of `destination_dir` are kept, so roots,
    /// drive prefixes and `..` never leave `installation_root`.
    pub fn destination_root(&self, destination_dir: &Path) -> PathBuf {
        let relative: PathBuf = destination_dir
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();

        if destination_dir
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            warn!(
                "Destination directory {} clamped to {} under {}",
                destination_dir.display(),
                relative.display(),
                self.installation_root.display()
            );
        }
        self.installation_root.join(relative)
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            batch_size: 2,
            schedule: ScheduleMode::default(),
            installation_root: default_installation_root(),
            default_destination_dir: PathBuf::from("temp"),
            user_agent: format!("fetcher/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(30),
            resource_timeout: None,
            progress_interval: Duration::ZERO,
            verify_buffer_limit: 8 * 1024 * 1024,
            fail_on_error: false,
        }
    }
}

/// The directory above the one holding the running executable
///
/// Falls back to the working directory when the executable path is unknown.
pub fn default_installation_root() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().and_then(Path::parent).map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Builder for [`DownloadConfig`]
#[derive(Debug, Clone, Default)]
pub struct DownloadConfigBuilder {
    config: DownloadConfig,
}

impl DownloadConfigBuilder {
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    pub fn schedule(mut self, schedule: ScheduleMode) -> Self {
        self.config.schedule = schedule;
        self
    }

    pub fn installation_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.config.installation_root = root.into();
        self
    }

    pub fn default_destination_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.default_destination_dir = dir.into();
        self
    }

    pub fn user_agent<S: Into<String>>(mut self, agent: S) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    pub fn resource_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.resource_timeout = timeout;
        self
    }

    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval;
        self
    }

    pub fn verify_buffer_limit(mut self, limit: u64) -> Self {
        self.config.verify_buffer_limit = limit;
        self
    }

    pub fn fail_on_error(mut self, fail: bool) -> Self {
        self.config.fail_on_error = fail;
        self
    }

    pub fn build(self) -> Result<DownloadConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

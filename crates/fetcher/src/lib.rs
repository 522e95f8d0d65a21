//! Fetcher Library
//!
//! Downloads remote resources into a local directory tree, a bounded number
//! at a time. A file that already exists is hashed (xxHash64) and compared
//! with the remote content; it is kept when both match and replaced
//! otherwise. Progress (size, rate, ETA) is reported per file.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use fetcher::{
//!     ConsoleProgressReporter, DownloadConfig, Downloader, IntoProgressCallback,
//!     ResourceDescriptor,
//! };
//!
//! # async fn example() -> fetcher::Result<()> {
//! let config = DownloadConfig::builder()
//!     .installation_root("/opt/game")
//!     .batch_size(4)
//!     .build()?;
//!
//! let downloader = Downloader::new(config)?
//!     .with_reporter(ConsoleProgressReporter::new(true).into_callback());
//!
//! let report = downloader
//!     .run(vec![
//!         ResourceDescriptor::new("https://example.com/data/base.pak"),
//!         ResourceDescriptor::new("https://example.com/latest")
//!             .with_filename("patch.zip")
//!             .with_destination_dir("patches"),
//!     ])
//!     .await?;
//!
//! for outcome in report.failures() {
//!     if let Err(e) = &outcome.result {
//!         eprintln!("{}: {}", outcome.url, e);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Integrity check**: existing files are compared with the remote body and skipped when equal
//! - **Safe writes**: bodies go to a `.part` file that replaces the destination once complete
//! - **Progress tracking**: per-file task events with rate and ETA
//! - **Batch downloads**: fixed groups or a sliding window of concurrent downloads
//! - **Timeouts and cancellation**: per-resource deadline and an external cancellation token

pub mod downloader;

// Re-export commonly used types for convenience
pub use downloader::{
    BatchReport, ConsoleProgressReporter, DownloadConfig, DownloadError, DownloadResult,
    Downloader, IntoProgressCallback, NullProgressReporter, ProgressCallback, ProgressEvent,
    ProgressReporter, RecordingProgressReporter, ResourceDescriptor, ResourceInput,
    ResourceOutcome, ResponseType, Result, ScheduleMode,
};

/// Download `input` with default settings and console progress output
///
/// `batch_size` resources run at a time. Individual failures end up in the
/// report; the call only fails when the setup is invalid.
pub async fn download_resource(
    input: impl Into<ResourceInput>,
    batch_size: usize,
) -> Result<BatchReport> {
    let config = DownloadConfig::builder().batch_size(batch_size).build()?;
    Downloader::new(config)?
        .with_reporter(ConsoleProgressReporter::default().into_callback())
        .run(input)
        .await
}

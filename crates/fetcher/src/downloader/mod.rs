//! Downloader module
//!
//! Core types, configuration, the single-resource downloader and the batch
//! orchestrator.

pub mod batch;
pub mod config;
pub mod core;
pub mod engine;
pub mod single;

// Re-export main types for convenience
pub use batch::{BatchReport, ResourceOutcome};
pub use config::{DownloadConfig, DownloadConfigBuilder, ScheduleMode};
pub use core::{
    ConsoleProgressReporter, DoneOptions, DownloadError, DownloadMetrics, DownloadMetricsSnapshot,
    DownloadResult, FileOperation, IntoProgressCallback, NullProgressReporter, ProgressCallback,
    ProgressEvent, ProgressReporter, RecordingProgressReporter, ResourceDescriptor, ResourceInput,
    ResponseType, Result, Style, TaskKind, TaskOptions, TaskUpdate,
};
pub use engine::Downloader;
pub use single::ResourceDownloader;

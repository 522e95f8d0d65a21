//! Main entry point for the downloader
//!
//! The call chain flows as follows:
//!
//! User Code
//! ↓
//! Downloader (this file)
//! ↓
//! batch:: functions (batch/mod.rs)
//! ↓
//! ResourceDownloader (single.rs)
//! ↓
//! Core types (core/*)

use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::downloader::batch::{self, BatchReport};
use crate::downloader::config::DownloadConfig;
use crate::downloader::core::http::HttpClient;
use crate::downloader::core::{
    DownloadError, DownloadMetrics, DownloadResult, ProgressCallback, ResourceDescriptor,
    ResourceInput, Result,
};
use crate::downloader::single::ResourceDownloader;

/// Batch downloader with verification and progress reporting
///
/// Holds one HTTP client for all runs. Metrics are collected per run and
/// returned in the [`BatchReport`].
pub struct Downloader {
    client: HttpClient,
    config: DownloadConfig,
    progress_callback: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl Downloader {
    /// Create a downloader; fails on an invalid configuration
    pub fn new(config: DownloadConfig) -> Result<Self> {
        config.validate()?;
        let client = HttpClient::from_config(&config)?;

        Ok(Self {
            client,
            config,
            progress_callback: None,
            cancellation: None,
        })
    }

    /// Send task events to `callback`
    pub fn with_reporter(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Abort in-flight and pending downloads once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download with the configured batch size
    pub async fn run(&self, input: impl Into<ResourceInput>) -> Result<BatchReport> {
        self.run_with_batch_size(input, self.config.batch_size).await
    }

    /// Download one resource or a list, `batch_size` at a time
    ///
    /// Individual failures are reported in the outcomes. The call itself only
    /// fails for a zero batch size, or when `fail_on_error` is set and any
    /// resource failed; [`DownloadError::BatchFailed`] then carries the report.
    pub async fn run_with_batch_size(
        &self,
        input: impl Into<ResourceInput>,
        batch_size: usize,
    ) -> Result<BatchReport> {
        if batch_size == 0 {
            return Err(DownloadError::Configuration {
                message: "batch_size must be at least 1".to_string(),
            });
        }

        let started = Instant::now();
        let metrics = DownloadMetrics::default();
        let downloader = self.resource_downloader(&metrics);

        let outcomes = match input.into() {
            ResourceInput::Single(descriptor) => {
                vec![batch::settle(&downloader, &metrics, descriptor).await]
            }
            ResourceInput::List(resources) => {
                batch::download_batches(
                    &downloader,
                    &metrics,
                    resources,
                    batch_size,
                    self.config.schedule,
                )
                .await
            }
        };

        let report = BatchReport {
            outcomes,
            metrics: metrics.snapshot(),
            duration: started.elapsed(),
        };

        let failed = report.failed_count();
        info!(
            "Finished {} resources in {:.2}s ({} failed)",
            report.outcomes.len(),
            report.duration.as_secs_f64(),
            failed
        );

        if failed > 0 && self.config.fail_on_error {
            warn!("{} of {} resources failed", failed, report.outcomes.len());
            return Err(DownloadError::BatchFailed {
                failed,
                total: report.outcomes.len(),
                report: Box::new(report),
            });
        }

        Ok(report)
    }

    /// Download a single resource and return its result directly
    pub async fn download_one(&self, descriptor: &ResourceDescriptor) -> Result<DownloadResult> {
        let metrics = DownloadMetrics::default();
        self.resource_downloader(&metrics).download(descriptor).await
    }

    fn resource_downloader<'a>(&'a self, metrics: &'a DownloadMetrics) -> ResourceDownloader<'a> {
        ResourceDownloader::new(&self.client, &self.config, metrics)
            .with_progress(self.progress_callback.clone())
            .with_cancellation(self.cancellation.clone())
    }
}

//! Batch download operations
//!
//! A list of descriptors is split into groups of `batch_size`. In
//! [`ScheduleMode::Batches`] a group starts only after every download of the
//! previous group settled; [`ScheduleMode::Sliding`] keeps up to `batch_size`
//! downloads in flight and starts the next one as soon as a slot frees up.
//! Each resource settles on its own, and a failure never cancels its siblings.

use futures::{StreamExt, future::join_all, stream};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::downloader::config::ScheduleMode;
use crate::downloader::core::{
    DownloadMetrics, DownloadMetricsSnapshot, DownloadResult, ResourceDescriptor, Result,
};
use crate::downloader::single::ResourceDownloader;

/// Settlement of one resource
#[derive(Debug)]
pub struct ResourceOutcome {
    pub url: String,
    pub result: Result<DownloadResult>,
}

impl ResourceOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Result of a batch download operation
#[derive(Debug)]
pub struct BatchReport {
    /// One entry per input resource, in input order
    pub outcomes: Vec<ResourceOutcome>,
    pub metrics: DownloadMetricsSnapshot,
    /// Total time taken for the run
    pub duration: Duration,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(ResourceOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ResourceOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.is_success())
    }

    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }
}

/// Download one resource and fold its result into the run metrics
pub async fn settle(
    downloader: &ResourceDownloader<'_>,
    metrics: &DownloadMetrics,
    descriptor: ResourceDescriptor,
) -> ResourceOutcome {
    metrics.record_started();
    let result = downloader.download(&descriptor).await;

    match &result {
        Ok(DownloadResult::Downloaded { size, .. }) => metrics.record_downloaded(*size, false),
        Ok(DownloadResult::Redownloaded { size, .. }) => metrics.record_downloaded(*size, true),
        Ok(DownloadResult::AlreadyVerified { .. }) => metrics.record_verified(),
        Ok(DownloadResult::Skipped) => metrics.record_skipped(),
        Err(e) => {
            warn!(url = %descriptor.url, category = e.category(), "Download failed: {}", e);
            metrics.record_failed();
        }
    }

    ResourceOutcome {
        url: descriptor.url,
        result,
    }
}

/// Download every descriptor with at most `batch_size` in flight
///
/// Outcomes come back in input order whatever the schedule.
pub async fn download_batches(
    downloader: &ResourceDownloader<'_>,
    metrics: &DownloadMetrics,
    resources: Vec<ResourceDescriptor>,
    batch_size: usize,
    schedule: ScheduleMode,
) -> Vec<ResourceOutcome> {
    debug!(
        "Starting download of {} resources, batch_size={}, schedule={:?}",
        resources.len(),
        batch_size,
        schedule
    );

    match schedule {
        ScheduleMode::Batches => download_in_groups(downloader, metrics, resources, batch_size).await,
        ScheduleMode::Sliding => download_sliding(downloader, metrics, resources, batch_size).await,
    }
}

async fn download_in_groups(
    downloader: &ResourceDownloader<'_>,
    metrics: &DownloadMetrics,
    resources: Vec<ResourceDescriptor>,
    batch_size: usize,
) -> Vec<ResourceOutcome> {
    let total_batches = resources.len().div_ceil(batch_size);
    let mut outcomes = Vec::with_capacity(resources.len());

    for (index, group) in resources.chunks(batch_size).enumerate() {
        let settled = join_all(
            group
                .iter()
                .cloned()
                .map(|descriptor| settle(downloader, metrics, descriptor)),
        )
        .await;

        info!("Downloaded batch {} of {}", index + 1, total_batches);
        outcomes.extend(settled);
    }

    outcomes
}

async fn download_sliding(
    downloader: &ResourceDownloader<'_>,
    metrics: &DownloadMetrics,
    resources: Vec<ResourceDescriptor>,
    width: usize,
) -> Vec<ResourceOutcome> {
    let mut settled: Vec<(usize, ResourceOutcome)> = stream::iter(resources.into_iter().enumerate())
        .map(|(index, descriptor)| async move {
            (index, settle(downloader, metrics, descriptor).await)
        })
        .buffer_unordered(width)
        .collect()
        .await;

    settled.sort_by_key(|(index, _)| *index);
    info!("Downloaded {} resources", settled.len());
    settled.into_iter().map(|(_, outcome)| outcome).collect()
}

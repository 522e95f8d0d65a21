//! Single-resource download
//!
//! A descriptor is resolved against the response headers, checked against an
//! existing file when there is one, and otherwise streamed into a `.part`
//! file that replaces the destination only once it is complete.

use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use reqwest::Response;
use std::future::{Future, pending};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::downloader::config::DownloadConfig;
use crate::downloader::core::hasher;
use crate::downloader::core::http::{self, HttpClient};
use crate::downloader::core::progress::ReportedTask;
use crate::downloader::core::speed::{self, FormatOptions, TransferState};
use crate::downloader::core::{
    DownloadError, DownloadMetrics, DownloadResult, ProgressCallback, ResourceDescriptor,
    ResponseType, Result, Style, TaskKind, files,
};

/// Outcome of hashing the response body against the local digest
enum BodyCheck {
    Matches { size: u64 },
    /// `buffered` holds the whole body when it fit under the buffer limit
    Differs { buffered: Option<Vec<Bytes>> },
}

/// State shared between one download and its failure cleanup
struct Attempt {
    task: ReportedTask,
    partial: Option<PathBuf>,
}

/// Downloads one resource at a time; shared by every task of a run
pub struct ResourceDownloader<'a> {
    client: &'a HttpClient,
    config: &'a DownloadConfig,
    metrics: &'a DownloadMetrics,
    progress_callback: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl<'a> ResourceDownloader<'a> {
    pub fn new(client: &'a HttpClient, config: &'a DownloadConfig, metrics: &'a DownloadMetrics) -> Self {
        Self {
            client,
            config,
            metrics,
            progress_callback: None,
            cancellation: None,
        }
    }

    pub fn with_progress(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress_callback = callback;
        self
    }

    pub fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Fetch one resource
    ///
    /// A blank url returns [`DownloadResult::Skipped`] without any I/O or
    /// reporter traffic. On error the reporter task (if one was opened) is
    /// closed with a failure message and any partial file is removed.
    pub async fn download(&self, descriptor: &ResourceDescriptor) -> Result<DownloadResult> {
        if descriptor.is_blank() {
            debug!("Skipping resource with an empty url");
            return Ok(DownloadResult::Skipped);
        }

        let _active = self.metrics.track_active();
        let provisional_key = files::filename_from_url(&descriptor.url)
            .unwrap_or_else(|| files::FALLBACK_FILENAME.to_string());
        let mut attempt = Attempt {
            task: ReportedTask::new(self.progress_callback.clone(), provisional_key),
            partial: None,
        };

        let result = self
            .bounded(&descriptor.url, self.run(descriptor, &mut attempt))
            .await;

        if let Err(ref error) = result {
            if let Some(partial) = attempt.partial.take() {
                files::discard_partial(&partial).await;
            }
            debug!("{} failed: {}", attempt.task.key(), error);
            attempt.task.finish(format!("Failed: {}", error), Style::Failure);
        }

        result
    }

    /// Race the work against cancellation and the per-resource deadline
    async fn bounded<F>(&self, url: &str, work: F) -> Result<DownloadResult>
    where
        F: Future<Output = Result<DownloadResult>>,
    {
        let timeout = self.config.resource_timeout;
        let deadline = async {
            match timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancellation {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(DownloadError::Cancelled { url: url.to_string() }),
            _ = deadline => Err(DownloadError::Timeout {
                url: url.to_string(),
                after: timeout.unwrap_or_default(),
            }),
            result = work => result,
        }
    }

    async fn run(&self, descriptor: &ResourceDescriptor, attempt: &mut Attempt) -> Result<DownloadResult> {
        let response = self.client.send(descriptor).await?;
        let filename = http::resolve_filename(descriptor, response.headers());
        attempt.task.set_key(filename.as_str());

        let dir = self
            .config
            .destination_root(descriptor.destination_dir_or(&self.config.default_destination_dir));
        files::ensure_dir(&dir).await?;
        let dest = dir.join(&filename);

        if !files::file_exists(&dest).await {
            attempt.task.add(TaskKind::Percentage, "Download initialization");
            let size = self.transfer_response(descriptor, response, &dest, attempt).await?;
            attempt.task.finish("Done.", Style::Success);
            return Ok(DownloadResult::Downloaded { path: dest, size });
        }

        attempt.task.add(TaskKind::Indefinite, "Verifying file integrity");

        let local_digest = match hasher::digest_file(&dest).await {
            Ok(digest) => digest,
            Err(e) => {
                warn!("Could not hash existing {}, downloading again: {}", dest.display(), e);
                attempt.task.set_kind(TaskKind::Percentage);
                attempt.task.update(None, "Existing file unreadable. Redownloading...");
                let size = self.transfer_response(descriptor, response, &dest, attempt).await?;
                attempt.task.finish("Done.", Style::Success);
                return Ok(DownloadResult::Redownloaded { path: dest, size });
            }
        };

        let size = match self.check_body(&descriptor.url, response, &local_digest).await? {
            BodyCheck::Matches { size } => {
                info!("{} matches the remote content, skipping download", dest.display());
                attempt.task.finish("Verified, skipping download.", Style::Success);
                return Ok(DownloadResult::AlreadyVerified { path: dest, size });
            }
            BodyCheck::Differs { buffered } => {
                warn!("{} does not match the remote content, redownloading", dest.display());
                attempt.task.set_kind(TaskKind::Percentage);
                attempt.task.update(None, "Corrupted. Redownloading...");

                match buffered {
                    Some(chunks) => {
                        let total = chunks.iter().map(|chunk| chunk.len() as u64).sum();
                        let body = stream::iter(chunks.into_iter().map(Ok));
                        self.transfer(&descriptor.url, body, Some(total), &dest, attempt)
                            .await?
                    }
                    None => {
                        debug!("{} exceeded the verification buffer, requesting it again", descriptor.url);
                        let response = self.client.send(descriptor).await?;
                        self.transfer_response(descriptor, response, &dest, attempt).await?
                    }
                }
            }
        };

        attempt.task.finish("Done.", Style::Success);
        Ok(DownloadResult::Redownloaded { path: dest, size })
    }

    /// Hash the whole response body, keeping it when it is small enough
    async fn check_body(&self, url: &str, response: Response, local_digest: &str) -> Result<BodyCheck> {
        let limit = self.config.verify_buffer_limit;
        let mut buffered = match response.content_length() {
            Some(length) if length > limit => None,
            _ => Some(Vec::new()),
        };

        let mut size = 0u64;
        let body = response.bytes_stream().inspect(|chunk| {
            let Ok(chunk) = chunk else { return };
            size += chunk.len() as u64;
            if size > limit {
                buffered = None;
            }
            if let Some(chunks) = buffered.as_mut() {
                chunks.push(chunk.clone());
            }
        });

        let remote_digest = hasher::digest_stream(body)
            .await
            .map_err(|e| DownloadError::request(url, e))?;
        debug!("{}: local {} remote {}", url, local_digest, remote_digest);

        if remote_digest == local_digest {
            Ok(BodyCheck::Matches { size })
        } else {
            Ok(BodyCheck::Differs { buffered })
        }
    }

    async fn transfer_response(
        &self,
        descriptor: &ResourceDescriptor,
        response: Response,
        dest: &Path,
        attempt: &mut Attempt,
    ) -> Result<u64> {
        match descriptor.response_type {
            ResponseType::Stream => {
                let total = response.content_length();
                self.transfer(&descriptor.url, response.bytes_stream(), total, dest, attempt)
                    .await
            }
            ResponseType::Buffered => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| DownloadError::request(&descriptor.url, e))?;
                let total = Some(body.len() as u64);
                self.transfer(&descriptor.url, stream::iter([Ok(body)]), total, dest, attempt)
                    .await
            }
        }
    }

    /// Stream a body into `<dest>.part` and move it over `dest`
    async fn transfer<S>(
        &self,
        url: &str,
        body: S,
        total: Option<u64>,
        dest: &Path,
        attempt: &mut Attempt,
    ) -> Result<u64>
    where
        S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin,
    {
        info!("Downloading {} to {}", url, dest.display());

        let temp_path = files::create_temp_path(dest);
        attempt.partial = Some(temp_path.clone());

        let task = &attempt.task;
        let interval = self.config.progress_interval;
        let mut last_report: Option<Instant> = None;
        let mut reported_bytes = 0;
        let mut state = TransferState::new(total);

        let written = http::stream_to_file(url, body, &temp_path, &mut state, |state| {
            let finished = state.total_length == Some(state.downloaded_bytes);
            if finished || last_report.is_none_or(|at| at.elapsed() >= interval) {
                report_progress(task, state);
                last_report = Some(Instant::now());
                reported_bytes = state.downloaded_bytes;
            }
        })
        .await?;

        // last chunk may have been throttled
        if reported_bytes != written {
            report_progress(task, &state);
        }

        files::atomic_rename(&temp_path, dest).await?;
        attempt.partial = None;

        info!(
            "Successfully downloaded {} ({})",
            dest.display(),
            speed::format_bytes(written as f64, FormatOptions::default())
        );
        Ok(written)
    }
}

fn report_progress(task: &ReportedTask, state: &TransferState) {
    let estimate = state.estimate();
    task.update(estimate.fraction, speed::progress_message(state, &estimate));
}

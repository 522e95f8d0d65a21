//! Example demonstrating batch downloads with the fetcher downloader
//!
//! Downloads a handful of files twice into a temporary directory. The second
//! run finds every file in place, hashes it against the remote content and
//! skips the write.
//!
//! Run this example with:
//! ```
//! cargo run --example batch_download_example
//! ```

use fetcher::downloader::{DoneOptions, Style, TaskOptions, TaskUpdate};
use fetcher::{
    DownloadConfig, DownloadError, DownloadResult, Downloader, IntoProgressCallback,
    ProgressReporter, ResourceDescriptor, ScheduleMode,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::tempdir;

/// Prints adds and completions, counts updates
#[derive(Default)]
struct SummaryReporter {
    updates: AtomicUsize,
}

impl ProgressReporter for SummaryReporter {
    fn add_task(&self, key: &str, options: &TaskOptions) {
        println!("📥 {}: {}", key, options.message);
    }

    fn update_task(&self, _key: &str, _update: &TaskUpdate) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    fn done(&self, key: &str, options: &DoneOptions) {
        let icon = if options.style == Style::Failure { "❌" } else { "✅" };
        println!(
            "{} {}: {} (after {} updates so far)",
            icon,
            key,
            options.message,
            self.updates.load(Ordering::Relaxed)
        );
    }
}

#[tokio::main]
async fn main() -> fetcher::Result<()> {
    tracing_subscriber::fmt::init();

    let temp_dir = tempdir().map_err(|e| DownloadError::Configuration {
        message: format!("cannot create a temporary directory: {}", e),
    })?;
    println!("📁 Download directory: {}", temp_dir.path().display());

    let config = DownloadConfig::builder()
        .installation_root(temp_dir.path())
        .batch_size(3)
        .schedule(ScheduleMode::Sliding)
        .build()?;

    let downloader = Downloader::new(config)?.with_reporter(SummaryReporter::default().into_callback());

    let resources = vec![
        ResourceDescriptor::new("https://httpbin.org/bytes/1024").with_filename("small_file.bin"),
        ResourceDescriptor::new("https://httpbin.org/bytes/102400").with_filename("large_file.bin"),
        ResourceDescriptor::new("https://httpbin.org/response-headers?Content-Disposition=attachment%3B%20filename%3D%22named.txt%22"),
        ResourceDescriptor::new("https://httpbin.org/status/500"),
        ResourceDescriptor::new("https://httpbin.org/image/png").with_destination_dir("images"),
    ];

    for pass in 1..=2 {
        println!("\n🔄 Pass {}", pass);
        let report = downloader.run(resources.clone()).await?;

        println!("{}", "─".repeat(60));
        for outcome in &report.outcomes {
            match &outcome.result {
                Ok(DownloadResult::AlreadyVerified { path, .. }) => {
                    println!("📋 {} already up to date", path.display())
                }
                Ok(result) => println!("📄 {} bytes written for {}", result.size(), outcome.url),
                Err(e) => println!("⚠️  {} [{}]: {}", outcome.url, e.category(), e),
            }
        }
        println!(
            "📈 {} downloaded, {} verified, {} failed, {} bytes in {:.2?}",
            report.metrics.downloaded + report.metrics.redownloaded,
            report.metrics.verified,
            report.metrics.failed,
            report.metrics.bytes_written,
            report.duration
        );
    }

    println!("✨ Batch download example completed!");
    Ok(())
}

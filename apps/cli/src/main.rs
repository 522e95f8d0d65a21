//! `fetch`: download resources into a local directory tree.

use anyhow::{Context, Result, bail};
use clap::Parser;
use fetcher::{
    BatchReport, ConsoleProgressReporter, DownloadConfig, DownloadError, DownloadResult,
    Downloader, IntoProgressCallback, NullProgressReporter, ResourceDescriptor, ResourceInput,
    ScheduleMode,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fetch")]
#[command(about = "Download files, skipping the ones already up to date", long_about = None)]
struct Args {
    /// URLs to download
    urls: Vec<String>,

    /// JSON file holding a url, a descriptor object or an array of either
    #[arg(long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Downloads running at the same time
    #[arg(long, value_name = "N")]
    batch_size: Option<usize>,

    /// Installation root the destination directories are resolved against
    #[arg(long, value_name = "DIR")]
    root: Option<PathBuf>,

    /// Destination directory for entries that do not name one
    #[arg(long, value_name = "DIR")]
    dest: Option<PathBuf>,

    /// Give up on a single resource after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Start the next download as soon as any slot is free
    #[arg(long)]
    sliding: bool,

    /// Exit with an error when any resource failed
    #[arg(long)]
    fail_on_error: bool,

    /// No progress output
    #[arg(long, short)]
    quiet: bool,

    /// Debug logging and per-chunk progress lines
    #[arg(long, short)]
    verbose: bool,
}

impl Args {
    /// Environment settings with the command line applied on top
    fn config(&self) -> Result<DownloadConfig> {
        let mut config = DownloadConfig::from_env();

        if let Some(size) = self.batch_size {
            config.batch_size = size;
        }
        if let Some(root) = &self.root {
            config.installation_root = root.clone();
        }
        if let Some(dest) = &self.dest {
            config.default_destination_dir = dest.clone();
        }
        if let Some(secs) = self.timeout {
            config.resource_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if self.sliding {
            config.schedule = ScheduleMode::Sliding;
        }
        config.fail_on_error = self.fail_on_error;

        config.validate()?;
        Ok(config)
    }

    /// Manifest entries first, then the positional urls
    fn resources(&self) -> Result<Vec<ResourceDescriptor>> {
        let mut resources = Vec::new();

        if let Some(manifest) = &self.manifest {
            let raw = std::fs::read_to_string(manifest)
                .with_context(|| format!("Failed to read manifest {}", manifest.display()))?;
            resources.extend(parse_manifest(&raw).with_context(|| {
                format!("Failed to parse manifest {}", manifest.display())
            })?);
        }
        resources.extend(self.urls.iter().map(|url| ResourceDescriptor::new(url.as_str())));

        if resources.is_empty() {
            bail!("Nothing to download: pass URLs or --manifest");
        }
        Ok(resources)
    }
}

fn parse_manifest(raw: &str) -> Result<Vec<ResourceDescriptor>> {
    Ok(match serde_json::from_str::<ResourceInput>(raw)? {
        ResourceInput::List(list) => list,
        ResourceInput::Single(descriptor) => vec![descriptor],
    })
}

fn init_logging(args: &Args) {
    let default_level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,fetcher={}", default_level)));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn describe(result: &DownloadResult) -> String {
    match result {
        DownloadResult::Downloaded { path, size } => {
            format!("downloaded {} ({} bytes)", path.display(), size)
        }
        DownloadResult::Redownloaded { path, size } => {
            format!("replaced {} ({} bytes)", path.display(), size)
        }
        DownloadResult::AlreadyVerified { path, .. } => format!("up to date {}", path.display()),
        DownloadResult::Skipped => "skipped (empty url)".to_string(),
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.config()?;
    let resources = args.resources()?;

    let reporter = if args.quiet {
        NullProgressReporter.into_callback()
    } else {
        ConsoleProgressReporter::new(args.verbose).into_callback()
    };
    let downloader = Downloader::new(config)?.with_reporter(reporter);

    let (lines, status) = summarize(downloader.run(resources).await);
    for line in lines {
        println!("{}", line);
    }
    status
}

/// Printable report lines and the exit status of a run
///
/// A `fail_on_error` failure still yields every outcome line.
fn summarize(result: fetcher::Result<BatchReport>) -> (Vec<String>, Result<()>) {
    match result {
        Ok(report) => (report_lines(&report), Ok(())),
        Err(DownloadError::BatchFailed { report, .. }) => {
            let lines = report_lines(&report);
            let err = anyhow::anyhow!(
                "{} of {} resources failed to download",
                report.failed_count(),
                report.outcomes.len()
            );
            (lines, Err(err))
        }
        Err(e) => (Vec::new(), Err(e.into())),
    }
}

fn report_lines(report: &BatchReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(result) => format!("{}: {}", outcome.url, describe(result)),
            Err(e) => format!("{}: failed: {}", outcome.url, e),
        })
        .collect();
    lines.push(format!(
        "{} resources in {:.2}s: {} downloaded, {} replaced, {} up to date, {} failed",
        report.outcomes.len(),
        report.duration.as_secs_f64(),
        report.metrics.downloaded,
        report.metrics.redownloaded,
        report.metrics.verified,
        report.metrics.failed
    ));
    lines
}

#[tokio::main]
async fn main() {
    // .env may carry RUST_LOG and FETCHER_* settings
    dotenv::dotenv().ok();

    let args = Args::parse();
    init_logging(&args);

    if let Err(err) = run(args).await {
        eprintln!("fetch error: {:#}", err);
        std::process::exit(1);
    }
}

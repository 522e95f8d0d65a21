//! Transfer rate, remaining time and human-readable byte counts

use std::time::{Duration, Instant};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Counters for one in-flight transfer
///
/// Created after the response headers arrive, right before the body is read.
#[derive(Debug, Clone)]
pub struct TransferState {
    pub downloaded_bytes: u64,
    pub total_length: Option<u64>,
    pub start: Instant,
}

impl TransferState {
    pub fn new(total_length: Option<u64>) -> Self {
        Self {
            downloaded_bytes: 0,
            total_length,
            start: Instant::now(),
        }
    }

    pub fn record_chunk(&mut self, len: usize) {
        self.downloaded_bytes += len as u64;
    }

    /// Estimate against the time elapsed since the transfer started
    pub fn estimate(&self) -> Estimate {
        estimate(
            self.downloaded_bytes,
            self.start.elapsed().as_secs_f64(),
            self.total_length,
        )
    }
}

/// Output of [`estimate`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    /// Average bytes per second since the transfer started
    pub rate_bps: f64,
    /// Remaining time, `None` when it cannot be computed
    pub eta: Option<Duration>,
    /// Completed share in `[0, 1]`, `None` without a known total
    pub fraction: Option<f64>,
}

/// Average rate and remaining time for a transfer
///
/// A zero (or invalid) elapsed time gives a rate of 0 and an unknown ETA.
/// Without a total size only the rate is meaningful.
pub fn estimate(downloaded: u64, elapsed_secs: f64, total: Option<u64>) -> Estimate {
    let rate_bps = if elapsed_secs.is_finite() && elapsed_secs > 0.0 {
        downloaded as f64 / elapsed_secs
    } else {
        0.0
    };

    let Some(total) = total else {
        return Estimate {
            rate_bps,
            eta: None,
            fraction: None,
        };
    };

    let fraction = if total == 0 {
        1.0
    } else {
        (downloaded as f64 / total as f64).clamp(0.0, 1.0)
    };

    let remaining = total.saturating_sub(downloaded);
    let eta = if remaining == 0 {
        Some(Duration::ZERO)
    } else if rate_bps > 0.0 {
        // rejects negative, non-finite and overflowing values
        Duration::try_from_secs_f64(remaining as f64 / rate_bps).ok()
    } else {
        None
    };

    Estimate {
        rate_bps,
        eta,
        fraction: Some(fraction),
    }
}

/// Options for [`format_bytes`]
#[derive(Debug, Clone, Copy)]
pub struct FormatOptions {
    /// Append the unit; without it only the scaled number is returned
    pub show_units: bool,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self { show_units: true }
    }
}

/// Scale a byte count (or rate) to the largest 1024-based unit, two decimals
pub fn format_bytes(value: f64, options: FormatOptions) -> String {
    let mut value = if value.is_finite() && value > 0.0 { value } else { 0.0 };
    let mut index = 0;
    while value >= 1024.0 && index < UNITS.len() - 1 {
        value /= 1024.0;
        index += 1;
    }

    if options.show_units {
        format!("{:.2} {}", value, UNITS[index])
    } else {
        format!("{:.2}", value)
    }
}

/// Zero-padded `HH:MM:SS`, or `--:--:--` when unknown
pub fn format_eta(eta: Option<Duration>) -> String {
    match eta {
        Some(eta) => {
            let total = eta.as_secs();
            let hours = total / 3600;
            let minutes = (total % 3600) / 60;
            let seconds = total % 60;
            format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
        }
        None => "--:--:--".to_string(),
    }
}

/// Progress line for a transfer, e.g. `512.00/1.00 MB 256.00 KB/s eta: 00:00:02`
pub fn progress_message(state: &TransferState, estimate: &Estimate) -> String {
    let rate = format_bytes(estimate.rate_bps, FormatOptions::default());
    match state.total_length {
        Some(total) => format!(
            "{}/{} {}/s eta: {}",
            format_bytes(state.downloaded_bytes as f64, FormatOptions { show_units: false }),
            format_bytes(total as f64, FormatOptions::default()),
            rate,
            format_eta(estimate.eta),
        ),
        None => format!(
            "{} {}/s",
            format_bytes(state.downloaded_bytes as f64, FormatOptions::default()),
            rate,
        ),
    }
}

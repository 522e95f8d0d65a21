//! Counters shared by concurrent downloads of one run

use std::sync::atomic::{AtomicU64, Ordering};

/// Download statistics, updated from every in-flight task
#[derive(Debug, Default)]
pub struct DownloadMetrics {
    pub total_resources: AtomicU64,
    pub downloaded: AtomicU64,
    pub redownloaded: AtomicU64,
    pub verified: AtomicU64,
    pub skipped: AtomicU64,
    pub failed: AtomicU64,
    pub bytes_written: AtomicU64,
    pub active_transfers: AtomicU64,
    pub peak_active_transfers: AtomicU64,
}

impl DownloadMetrics {
    pub fn record_started(&self) {
        self.total_resources.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_downloaded(&self, size: u64, replaced_existing: bool) {
        if replaced_existing {
            self.redownloaded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.downloaded.fetch_add(1, Ordering::Relaxed);
        }
        self.bytes_written.fetch_add(size, Ordering::Relaxed);
    }

    pub fn record_verified(&self) {
        self.verified.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a request as in flight until the returned guard is dropped
    pub fn track_active(&self) -> ActiveTransfer<'_> {
        let now = self.active_transfers.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active_transfers.fetch_max(now, Ordering::SeqCst);
        ActiveTransfer { metrics: self }
    }

    /// Get a snapshot of current metrics
    pub fn snapshot(&self) -> DownloadMetricsSnapshot {
        DownloadMetricsSnapshot {
            total_resources: self.total_resources.load(Ordering::Relaxed),
            downloaded: self.downloaded.load(Ordering::Relaxed),
            redownloaded: self.redownloaded.load(Ordering::Relaxed),
            verified: self.verified.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            peak_active_transfers: self.peak_active_transfers.load(Ordering::SeqCst),
        }
    }
}

/// Guard returned by [`DownloadMetrics::track_active`]
pub struct ActiveTransfer<'a> {
    metrics: &'a DownloadMetrics,
}

impl Drop for ActiveTransfer<'_> {
    fn drop(&mut self) {
        self.metrics.active_transfers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Immutable snapshot of download metrics
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DownloadMetricsSnapshot {
    pub total_resources: u64,
    pub downloaded: u64,
    pub redownloaded: u64,
    pub verified: u64,
    pub skipped: u64,
    pub failed: u64,
    pub bytes_written: u64,
    pub peak_active_transfers: u64,
}

impl DownloadMetricsSnapshot {
    /// Share of resources that ended without error (0.0 to 1.0)
    pub fn success_rate(&self) -> f64 {
        if self.total_resources == 0 {
            0.0
        } else {
            (self.total_resources - self.failed) as f64 / self.total_resources as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_guard_tracks_peak() {
        let metrics = DownloadMetrics::default();
        {
            let _a = metrics.track_active();
            let _b = metrics.track_active();
            assert_eq!(metrics.active_transfers.load(Ordering::SeqCst), 2);
        }
        let _c = metrics.track_active();
        assert_eq!(metrics.active_transfers.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().peak_active_transfers, 2);
    }

    #[test]
    fn test_success_rate() {
        let metrics = DownloadMetrics::default();
        assert_eq!(metrics.snapshot().success_rate(), 0.0);
        for _ in 0..4 {
            metrics.record_started();
        }
        metrics.record_downloaded(10, false);
        metrics.record_downloaded(5, true);
        metrics.record_verified();
        metrics.record_failed();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.success_rate(), 0.75);
        assert_eq!(snapshot.bytes_written, 15);
        assert_eq!(snapshot.redownloaded, 1);
    }
}

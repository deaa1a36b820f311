//! Run-level accounting.
//!
//! Fetchers and writers isolate failures and keep going; every drop is counted
//! here so a finished run can say what it lost.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

/// Counters shared by the discovery and detail tasks
#[derive(Debug, Default)]
pub struct RunStats {
    pages_fetched: AtomicU64,
    pages_dropped: AtomicU64,
    total_pages: AtomicU64,
    ids_discovered: AtomicU64,
    adult_skipped: AtomicU64,
    movies_decomposed: AtomicU64,
    movies_dropped: AtomicU64,
}

impl RunStats {
    pub fn page_fetched(&self, ids: u64, adult: u64) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
        self.ids_discovered.fetch_add(ids, Ordering::Relaxed);
        self.adult_skipped.fetch_add(adult, Ordering::Relaxed);
    }

    pub fn page_dropped(&self) {
        self.pages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_total_pages(&self, total: u32) {
        self.total_pages.store(u64::from(total), Ordering::Relaxed);
    }

    pub fn movie_decomposed(&self) {
        self.movies_decomposed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn movie_dropped(&self) {
        self.movies_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn pages_dropped(&self) -> u64 {
        self.pages_dropped.load(Ordering::Relaxed)
    }

    pub fn ids_discovered(&self) -> u64 {
        self.ids_discovered.load(Ordering::Relaxed)
    }

    pub fn movies_decomposed(&self) -> u64 {
        self.movies_decomposed.load(Ordering::Relaxed)
    }

    pub fn movies_dropped(&self) -> u64 {
        self.movies_dropped.load(Ordering::Relaxed)
    }
}

/// Outcome of one batch writer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WriterReport {
    pub relation: &'static str,
    pub records_received: u64,
    pub batches_committed: u64,
    pub batches_failed: u64,
    /// Rows the store reports as inserted or updated
    pub rows_affected: u64,
    /// Records lost with failed batches
    pub records_dropped: u64,
}

impl WriterReport {
    pub fn new(relation: &'static str) -> Self {
        Self {
            relation,
            ..Default::default()
        }
    }
}

/// Everything a finished run reports
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub pages_fetched: u64,
    pub pages_dropped: u64,
    pub total_pages: u64,
    pub ids_discovered: u64,
    pub adult_skipped: u64,
    pub movies_decomposed: u64,
    pub movies_dropped: u64,
    pub rate_limit_timeouts: u64,
    pub writers: Vec<WriterReport>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl RunReport {
    pub fn new(stats: &RunStats, rate_limit_timeouts: usize, writers: Vec<WriterReport>, duration: Duration) -> Self {
        Self {
            pages_fetched: stats.pages_fetched.load(Ordering::Relaxed),
            pages_dropped: stats.pages_dropped.load(Ordering::Relaxed),
            total_pages: stats.total_pages.load(Ordering::Relaxed),
            ids_discovered: stats.ids_discovered.load(Ordering::Relaxed),
            adult_skipped: stats.adult_skipped.load(Ordering::Relaxed),
            movies_decomposed: stats.movies_decomposed.load(Ordering::Relaxed),
            movies_dropped: stats.movies_dropped.load(Ordering::Relaxed),
            rate_limit_timeouts: rate_limit_timeouts as u64,
            writers,
            duration,
        }
    }

    pub fn writer(&self, relation: &str) -> Option<&WriterReport> {
        self.writers.iter().find(|w| w.relation == relation)
    }

    pub fn records_dropped(&self) -> u64 {
        self.writers.iter().map(|w| w.records_dropped).sum()
    }

    /// True when nothing was dropped anywhere
    pub fn is_clean(&self) -> bool {
        self.pages_dropped == 0 && self.movies_dropped == 0 && self.records_dropped() == 0
    }

    pub fn log(&self) {
        for writer in &self.writers {
            info!(
                relation = writer.relation,
                received = writer.records_received,
                committed_batches = writer.batches_committed,
                failed_batches = writer.batches_failed,
                rows_affected = writer.rows_affected,
                dropped = writer.records_dropped,
                "Writer finished"
            );
        }

        info!(
            pages_fetched = self.pages_fetched,
            total_pages = self.total_pages,
            ids_discovered = self.ids_discovered,
            adult_skipped = self.adult_skipped,
            movies_decomposed = self.movies_decomposed,
            duration_ms = self.duration.as_millis() as u64,
            "Ingestion run complete"
        );

        if !self.is_clean() || self.rate_limit_timeouts > 0 {
            warn!(
                pages_dropped = self.pages_dropped,
                movies_dropped = self.movies_dropped,
                records_dropped = self.records_dropped(),
                rate_limit_timeouts = self.rate_limit_timeouts,
                "Run finished with dropped work"
            );
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_report_snapshots_stats() {
        let stats = RunStats::default();
        stats.set_total_pages(3);
        stats.page_fetched(10, 2);
        stats.page_fetched(5, 0);
        stats.page_dropped();
        stats.movie_decomposed();
        stats.movie_dropped();

        let report = RunReport::new(&stats, 1, vec![WriterReport::new("movie")], Duration::from_secs(2));

        assert_eq!(report.pages_fetched, 2);
        assert_eq!(report.pages_dropped, 1);
        assert_eq!(report.total_pages, 3);
        assert_eq!(report.ids_discovered, 15);
        assert_eq!(report.adult_skipped, 2);
        assert_eq!(report.rate_limit_timeouts, 1);
        assert!(!report.is_clean());
        assert!(report.writer("movie").is_some());
        assert!(report.writer("genre").is_none());
    }

    #[test]
    fn test_dropped_records_make_report_unclean() {
        let stats = RunStats::default();
        let mut writer = WriterReport::new("movie_genre");
        assert!(RunReport::new(&stats, 0, vec![writer.clone()], Duration::ZERO).is_clean());

        writer.records_dropped = 4;
        let report = RunReport::new(&stats, 0, vec![writer], Duration::ZERO);
        assert_eq!(report.records_dropped(), 4);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_report_serializes_duration_as_millis() {
        let report = RunReport::new(&RunStats::default(), 0, vec![], Duration::from_millis(1500));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["duration"], 1500);
    }
}

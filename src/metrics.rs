//! Run counters per source
//!
//! Tracks what happened to every title and chapter in one pipeline run so a
//! summary can be logged at the end.

use crate::models::{ChapterOutcome, Source};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetrics {
    pub titles_seen: u64,
    pub titles_failed: u64,
    pub chapters_skipped: u64,
    pub chapters_completed: u64,
    pub chapters_partially_failed: u64,
    pub chapters_resolution_failed: u64,
    pub chapters_forwarding_failed: u64,
    pub proxy_requests: u64,
}

impl SourceMetrics {
    pub fn chapters_attempted(&self) -> u64 {
        self.chapters_completed
            + self.chapters_partially_failed
            + self.chapters_resolution_failed
            + self.chapters_forwarding_failed
    }

    pub fn success_rate(&self) -> f64 {
        let attempted = self.chapters_attempted();
        if attempted == 0 {
            0.0
        } else {
            (self.chapters_completed as f64 / attempted as f64) * 100.0
        }
    }

    pub fn record_outcome(&mut self, outcome: ChapterOutcome) {
        match outcome {
            ChapterOutcome::Skipped => self.chapters_skipped += 1,
            ChapterOutcome::Completed => self.chapters_completed += 1,
            ChapterOutcome::PartiallyFailed => self.chapters_partially_failed += 1,
            ChapterOutcome::ResolutionFailed => self.chapters_resolution_failed += 1,
            ChapterOutcome::ForwardingFailed => self.chapters_forwarding_failed += 1,
        }
    }
}

/// Counters for one run, plus titles that never reached an adapter
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub sources: BTreeMap<Source, SourceMetrics>,
    pub titles_excluded: u64,
    pub titles_unsupported: u64,
    pub titles_without_source: u64,
    pub titles_without_manga_id: u64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(&mut self, source: Source) -> &mut SourceMetrics {
        self.sources.entry(source).or_default()
    }

    pub fn get(&self, source: Source) -> Option<&SourceMetrics> {
        self.sources.get(&source)
    }

    pub fn record_outcome(&mut self, source: Source, outcome: ChapterOutcome) {
        self.source(source).record_outcome(outcome);
    }

    pub fn total(&self) -> SourceMetrics {
        self.sources.values().fold(SourceMetrics::default(), |mut acc, m| {
            acc.titles_seen += m.titles_seen;
            acc.titles_failed += m.titles_failed;
            acc.chapters_skipped += m.chapters_skipped;
            acc.chapters_completed += m.chapters_completed;
            acc.chapters_partially_failed += m.chapters_partially_failed;
            acc.chapters_resolution_failed += m.chapters_resolution_failed;
            acc.chapters_forwarding_failed += m.chapters_forwarding_failed;
            acc.proxy_requests += m.proxy_requests;
            acc
        })
    }

    pub fn log_summary(&self) {
        log::info!("=== Run summary ===");
        for (source, m) in &self.sources {
            log::info!(
                "[{}] titles: {} ({} failed) | chapters: {} completed, {} partial, {} unresolved, {} not forwarded, {} skipped | proxy requests: {} | success rate: {:.2}%",
                source,
                m.titles_seen,
                m.titles_failed,
                m.chapters_completed,
                m.chapters_partially_failed,
                m.chapters_resolution_failed,
                m.chapters_forwarding_failed,
                m.chapters_skipped,
                m.proxy_requests,
                m.success_rate()
            );
        }
        let total = self.total();
        log::info!(
            "Total: {} titles, {} chapters forwarded cleanly, {} failed, {} already cached, {} proxy requests",
            total.titles_seen,
            total.chapters_completed,
            total.chapters_attempted() - total.chapters_completed,
            total.chapters_skipped,
            total.proxy_requests
        );
        let not_processed = self.titles_excluded
            + self.titles_unsupported
            + self.titles_without_source
            + self.titles_without_manga_id;
        if not_processed > 0 {
            log::info!(
                "Titles not processed: {} excluded, {} unsupported source, {} without source id, {} without manga id",
                self.titles_excluded,
                self.titles_unsupported,
                self.titles_without_source,
                self.titles_without_manga_id
            );
        }
        log::debug!("Run statistics: {}", self.export_json());
    }

    pub fn export_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = SourceMetrics::default();
        assert_eq!(metrics.chapters_attempted(), 0);
        assert_eq!(metrics.success_rate(), 0.0);
    }

    #[test]
    fn test_skipped_is_not_attempted() {
        let mut metrics = SourceMetrics::default();
        metrics.record_outcome(ChapterOutcome::Skipped);
        metrics.record_outcome(ChapterOutcome::Completed);
        metrics.record_outcome(ChapterOutcome::PartiallyFailed);

        assert_eq!(metrics.chapters_skipped, 1);
        assert_eq!(metrics.chapters_attempted(), 2);
        assert_eq!(metrics.success_rate(), 50.0);
    }

    #[test]
    fn test_run_totals() {
        let mut stats = RunStats::new();
        stats.source(Source::MangaDex).titles_seen += 1;
        stats.record_outcome(Source::MangaDex, ChapterOutcome::Completed);
        stats.source(Source::Batoto).titles_seen += 2;
        stats.record_outcome(Source::Batoto, ChapterOutcome::ResolutionFailed);
        stats.source(Source::Batoto).proxy_requests += 3;

        let total = stats.total();
        assert_eq!(total.titles_seen, 3);
        assert_eq!(total.chapters_completed, 1);
        assert_eq!(total.chapters_resolution_failed, 1);
        assert_eq!(total.proxy_requests, 3);
        assert!(stats.get(Source::WeebCentral).is_none());
    }

    #[test]
    fn test_export_json() {
        let mut stats = RunStats::new();
        stats.record_outcome(Source::WeebCentral, ChapterOutcome::ForwardingFailed);
        let json: serde_json::Value = serde_json::from_str(&stats.export_json()).unwrap();
        assert_eq!(json["sources"]["WeebCentral"]["chapters_forwarding_failed"], 1);
        assert_eq!(json["titles_without_manga_id"], 0);
    }
}

//! Sequential driver: library entries, then titles, then chapters.
//!
//! Every chapter result is flushed to the cache before the next chapter
//! starts, so an interrupted run loses at most the chapter in flight. Title
//! and chapter failures are logged and never abort the run.
//!
//! The title and chapter gates are passed before each unit starts, so
//! consecutive titles (and consecutive chapters) start at least one interval
//! apart.

use crate::cache::CompletionCache;
use crate::config::PipelineConfig;
use crate::error::CacheError;
use crate::forwarder::ProxyForwarder;
use crate::helpers::{parse_source, sanitize_name};
use crate::metrics::RunStats;
use crate::models::{ChapterOutcome, ChapterRef, LibraryEntry, Source};
use crate::rate_limit::RateLimiter;
use crate::sources::{AdapterMap, SourceAdapter};
use std::collections::HashSet;

pub struct Pipeline {
    adapters: AdapterMap,
    forwarder: ProxyForwarder,
    cache: CompletionCache,
    excluded: HashSet<String>,
    chapter_gate: RateLimiter,
    title_gate: RateLimiter,
    stats: RunStats,
}

impl Pipeline {
    pub fn new(
        adapters: AdapterMap,
        forwarder: ProxyForwarder,
        cache: CompletionCache,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            adapters,
            forwarder,
            cache,
            excluded: config.excluded_sources.iter().map(|s| sanitize_name(s)).collect(),
            chapter_gate: RateLimiter::new("chapter", config.chapter_interval()),
            title_gate: RateLimiter::new("title", config.title_interval()),
            stats: RunStats::new(),
        }
    }

    pub fn cache(&self) -> &CompletionCache {
        &self.cache
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Write the cache to disk, logging instead of failing
    pub fn flush(&self) {
        if let Err(e) = self.try_flush() {
            log::error!("Failed to flush cache: {}", e);
        }
    }

    pub fn try_flush(&self) -> Result<(), CacheError> {
        self.cache.flush()
    }

    /// Process every library entry in archive order
    pub async fn run(&mut self, entries: &[LibraryEntry]) {
        log::info!("Processing {} library entries", entries.len());
        for entry in entries {
            self.process_entry(entry).await;
        }
        self.flush();
        log::info!(
            "Run finished: {} chapters cached as complete, {} as failed",
            self.cache.completed_count(),
            self.cache.failed_count()
        );
    }

    async fn process_entry(&mut self, entry: &LibraryEntry) {
        let Some(raw_source) = entry.source_id.as_deref().filter(|s| !s.trim().is_empty()) else {
            log::warn!("Skipping '{}': no sourceId", entry.manga_id);
            self.stats.titles_without_source += 1;
            return;
        };
        let source_id = sanitize_name(raw_source);

        if self.excluded.contains(&source_id) {
            log::debug!("Skipping '{}': source '{}' is excluded", entry.manga_id, source_id);
            self.stats.titles_excluded += 1;
            return;
        }
        let Some(source) = parse_source(&source_id) else {
            log::warn!("Skipping '{}': unsupported source '{}'", entry.manga_id, raw_source);
            self.stats.titles_unsupported += 1;
            return;
        };
        if entry.manga_id.trim().is_empty() {
            log::warn!("Skipping {} entry with an empty mangaId", source);
            self.stats.titles_without_manga_id += 1;
            return;
        }

        self.process_title(source, &source_id, entry.manga_id.trim()).await;
    }

    /// Discover, filter against the cache, then resolve and forward each
    /// pending chapter
    pub async fn process_title(&mut self, source: Source, source_id: &str, manga_id: &str) {
        let Some(adapter) = self.adapters.get(&source) else {
            log::warn!("[{}] no adapter registered, skipping '{}'", source, manga_id);
            self.stats.titles_unsupported += 1;
            return;
        };

        self.title_gate.wait().await;
        self.cache.ensure_bucket(source_id, manga_id);
        self.stats.source(source).titles_seen += 1;
        log::info!("[{}] {}", source, manga_id);

        let listed = match adapter.begin_title(manga_id).await {
            Ok(()) => adapter.list_chapters(manga_id).await,
            Err(e) => Err(e),
        };

        match listed {
            Ok(chapters) => {
                let pending: Vec<ChapterRef> = self
                    .cache
                    .pending(source_id, manga_id, &chapters)
                    .into_iter()
                    .cloned()
                    .collect();
                let skipped = chapters.len() - pending.len();
                for _ in 0..skipped {
                    self.stats.record_outcome(source, ChapterOutcome::Skipped);
                }
                log::info!(
                    "[{}] {}: {} chapters, {} already cached, {} pending",
                    source,
                    manga_id,
                    chapters.len(),
                    skipped,
                    pending.len()
                );

                for chapter in &pending {
                    self.chapter_gate.wait().await;
                    let (outcome, requests) = forward_chapter(adapter.as_ref(), &self.forwarder, chapter).await;
                    self.stats.source(source).proxy_requests += requests as u64;
                    self.stats.record_outcome(source, outcome);
                    if let Some(value) = outcome.cache_value() {
                        self.cache.record(source_id, manga_id, chapter, value);
                    }
                    if let Err(e) = self.cache.flush() {
                        log::error!("Failed to flush cache: {}", e);
                    }
                }
            }
            Err(e) => {
                log::error!("[{}] {}: chapter discovery failed: {}", source, manga_id, e);
                self.stats.source(source).titles_failed += 1;
            }
        }

        adapter.end_title().await;
        self.flush();
    }
}

/// Resolve and forward one chapter, returning its outcome and the number of
/// proxy requests issued
async fn forward_chapter(
    adapter: &dyn SourceAdapter,
    forwarder: &ProxyForwarder,
    chapter: &ChapterRef,
) -> (ChapterOutcome, usize) {
    let source = adapter.source();
    let resolution = match adapter.resolve_pages(chapter).await {
        Ok(resolution) => resolution,
        Err(e) => {
            log::error!("[{}] chapter {}: {}", source, chapter, e);
            return (ChapterOutcome::ResolutionFailed, 0);
        }
    };

    match forwarder.forward(&resolution).await {
        Ok(report) if report.is_clean() => {
            log::info!("[{}] chapter {} forwarded in {} requests", source, chapter, report.requests);
            (ChapterOutcome::Completed, report.requests)
        }
        Ok(report) => {
            log::warn!(
                "[{}] chapter {}: proxy reported {} failed images",
                source,
                chapter,
                report.failed_images.len()
            );
            (ChapterOutcome::PartiallyFailed, report.requests)
        }
        Err(abort) => {
            log::error!("[{}] chapter {}: forwarding failed: {}", source, chapter, abort.error);
            (ChapterOutcome::ForwardingFailed, abort.partial.requests)
        }
    }
}

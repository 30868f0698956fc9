//! Per-site chapter discovery and page resolution
//!
//! Every site is a fixed, hand-written integration behind `SourceAdapter`.
//! MangaDex talks to the JSON API, WeebCentral and Manganato are scraped over
//! plain HTTP, Batoto needs a real browser tab.

pub mod batoto;
pub mod mangadex;
pub mod manganato;
pub mod weebcentral;

use crate::config::Config;
use crate::error::{DiscoveryError, ResolutionError};
use crate::http_client::Fetch;
use crate::models::{ChapterRef, Resolution, Source};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Called once before a title's chapters are listed
    async fn begin_title(&self, _manga_id: &str) -> Result<(), DiscoveryError> {
        Ok(())
    }

    /// Every chapter of the title; an empty list is not an error
    async fn list_chapters(&self, manga_id: &str) -> Result<Vec<ChapterRef>, DiscoveryError>;

    async fn resolve_pages(&self, chapter: &ChapterRef) -> Result<Resolution, ResolutionError>;

    /// Called once after the title's chapters, on success or failure
    async fn end_title(&self) {}
}

/// Shared plumbing handed to the HTTP-backed adapters
#[derive(Clone)]
pub struct SourceContext {
    pub fetch: Arc<dyn Fetch>,
    /// Discovery gate shared by every upstream request
    pub gate: Arc<RateLimiter>,
}

pub type AdapterMap = HashMap<Source, Box<dyn SourceAdapter>>;

/// One adapter per supported site
pub fn build_adapters(config: &Config, context: SourceContext) -> AdapterMap {
    let mut adapters: AdapterMap = HashMap::new();
    adapters.insert(
        Source::MangaDex,
        Box::new(mangadex::MangaDex::new(
            context.clone(),
            &config.sources.mangadex_api,
            config.pipeline.mangadex_page_size,
        )),
    );
    adapters.insert(
        Source::WeebCentral,
        Box::new(weebcentral::WeebCentral::new(context.clone(), &config.sources.weebcentral)),
    );
    adapters.insert(Source::Manganato, Box::new(manganato::Manganato::new(context.clone())));
    adapters.insert(
        Source::Batoto,
        Box::new(batoto::Batoto::new(
            config.browser.to_browser_config(),
            &config.sources.batoto,
            context.gate,
        )),
    );
    adapters
}

/// Deduplicate while keeping first-seen order
pub(crate) fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_in_order() {
        let items = vec!["b", "a", "b", "c", "a"].into_iter().map(String::from).collect();
        assert_eq!(dedup_in_order(items), vec!["b", "a", "c"]);
    }
}

use super::{SourceAdapter, SourceContext};
use crate::error::{DiscoveryError, ResolutionError};
use crate::http_client::FetchRequest;
use crate::models::{ChapterRef, Resolution, Source};
use async_trait::async_trait;

pub const BASE_URL: &str = "https://api.mangadex.org";

const CONTENT_RATINGS: [&str; 4] = ["safe", "suggestive", "erotica", "pornographic"];
const LANGUAGE: &str = "en";

pub struct MangaDex {
    context: SourceContext,
    base_url: String,
    page_size: usize,
}

impl MangaDex {
    pub fn new(context: SourceContext, base_url: &str, page_size: usize) -> Self {
        Self {
            context,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size: page_size.max(1),
        }
    }

    fn feed_request(&self, manga_id: &str, offset: usize) -> FetchRequest {
        let mut request = FetchRequest::get(format!("{}/manga/{}/feed", self.base_url, manga_id))
            .query("limit", self.page_size.to_string())
            .query("offset", offset.to_string())
            .query("translatedLanguage[]", LANGUAGE)
            .query("order[chapter]", "asc");
        for rating in CONTENT_RATINGS {
            request = request.query("contentRating[]", rating);
        }
        request
    }
}

/// Ids of the `chapter`-typed entries of one feed page
pub fn parse_feed_page(body: &serde_json::Value) -> Result<Vec<String>, DiscoveryError> {
    let data = body
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| DiscoveryError::Shape("feed response has no data array".to_string()))?;

    Ok(data
        .iter()
        .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("chapter"))
        .filter_map(|item| item.get("id").and_then(|id| id.as_str()))
        .map(str::to_string)
        .collect())
}

#[async_trait]
impl SourceAdapter for MangaDex {
    fn source(&self) -> Source {
        Source::MangaDex
    }

    /// Page through the feed until a page comes back empty. Short pages are
    /// not taken as the end.
    async fn list_chapters(&self, manga_id: &str) -> Result<Vec<ChapterRef>, DiscoveryError> {
        let mut out: Vec<ChapterRef> = Vec::new();
        let mut offset = 0usize;

        loop {
            self.context.gate.wait().await;
            let body = self
                .context
                .fetch
                .fetch_json(self.feed_request(manga_id, offset))
                .await?;

            let returned = body
                .get("data")
                .and_then(|d| d.as_array())
                .map(|d| d.len())
                .unwrap_or(0);
            let ids = parse_feed_page(&body)?;
            log::debug!("[mangadex] {} offset {}: {} entries", manga_id, offset, returned);

            if returned == 0 {
                break;
            }
            out.extend(ids);
            offset += returned;
        }

        Ok(super::dedup_in_order(out))
    }

    async fn resolve_pages(&self, chapter: &ChapterRef) -> Result<Resolution, ResolutionError> {
        Ok(Resolution::ProxyChapter(chapter.clone()))
    }
}

use super::{SourceAdapter, SourceContext};
use crate::error::{DiscoveryError, ResolutionError};
use crate::helpers::{image_source, last_path_segment};
use crate::http_client::FetchRequest;
use crate::models::{ChapterRef, PageUrl, Resolution, Source};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::LazyLock;

pub const BASE_URL: &str = "https://weebcentral.com";

static CHAPTER_LINKS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMAGES: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

pub struct WeebCentral {
    context: SourceContext,
    base_url: String,
}

impl WeebCentral {
    pub fn new(context: SourceContext, base_url: &str) -> Self {
        Self {
            context,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn chapter_list_url(&self, manga_id: &str) -> String {
        format!("{}/series/{}/full-chapter-list", self.base_url, manga_id)
    }

    fn images_url(&self, chapter_id: &str) -> String {
        format!("{}/chapters/{}/images", self.base_url, chapter_id)
    }
}

/// Chapter ids from the full chapter list fragment
pub fn parse_chapter_list(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let ids = document
        .select(&CHAPTER_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains("/chapters/"))
        .map(|href| last_path_segment(href).to_string())
        .filter(|id| !id.is_empty())
        .collect();
    super::dedup_in_order(ids)
}

/// Page URLs from the images fragment; images with no usable source are dropped
pub fn parse_images(html: &str) -> Vec<PageUrl> {
    let document = Html::parse_document(html);
    document
        .select(&IMAGES)
        .enumerate()
        .filter_map(|(index, img)| {
            let src = image_source(&img);
            if src.is_none() {
                log::debug!("[weebcentral] image {} has no source, skipping", index);
            }
            src
        })
        .map(PageUrl::new)
        .collect()
}

#[async_trait]
impl SourceAdapter for WeebCentral {
    fn source(&self) -> Source {
        Source::WeebCentral
    }

    async fn list_chapters(&self, manga_id: &str) -> Result<Vec<ChapterRef>, DiscoveryError> {
        self.context.gate.wait().await;
        let html = self
            .context
            .fetch
            .fetch_text(FetchRequest::get(self.chapter_list_url(manga_id)))
            .await?;
        Ok(parse_chapter_list(&html))
    }

    async fn resolve_pages(&self, chapter: &ChapterRef) -> Result<Resolution, ResolutionError> {
        let request = FetchRequest::get(self.images_url(chapter))
            .query("is_prev", "False")
            .query("current_page", "1")
            .query("reading_style", "long_strip");

        self.context.gate.wait().await;
        let html = self.context.fetch.fetch_text(request).await?;

        let pages = parse_images(&html);
        if pages.is_empty() {
            return Err(ResolutionError::MissingMarkup(format!("no images for chapter {}", chapter)));
        }
        Ok(Resolution::Pages(pages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chapter_list() {
        let html = r#"
            <div x-data>
              <a href="https://weebcentral.com/chapters/01JABC/" class="flex">Chapter 2</a>
              <a href="https://weebcentral.com/chapters/01JABB">Chapter 1</a>
              <a href="https://weebcentral.com/series/01J76/Some-Title">Series</a>
              <a href="https://weebcentral.com/chapters/01JABB">Chapter 1 (dup)</a>
            </div>"#;
        assert_eq!(parse_chapter_list(html), vec!["01JABC", "01JABB"]);
    }

    #[test]
    fn test_parse_images_strips_undefined_and_falls_back() {
        let html = r#"
            <section>
              <img src="https://hot.planeptune.us/manga/X/0001-001.png?undefined" alt="Page 1">
              <img data-src="https://hot.planeptune.us/manga/X/0001-002.png" alt="Page 2">
              <img alt="broken">
            </section>"#;
        let pages = parse_images(html);
        assert_eq!(
            pages,
            vec![
                PageUrl::new("https://hot.planeptune.us/manga/X/0001-001.png"),
                PageUrl::new("https://hot.planeptune.us/manga/X/0001-002.png"),
            ]
        );
    }
}

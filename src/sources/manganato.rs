use super::{SourceAdapter, SourceContext};
use crate::error::{DiscoveryError, ResolutionError};
use crate::helpers::image_source;
use crate::http_client::FetchRequest;
use crate::models::{ChapterRef, PageUrl, Resolution, Source};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

/// Both chapter-list layouts the site serves
static CHAPTER_LINKS: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("ul.row-content-chapter li a, div.chapter-list div.row span a").unwrap()
});
static READER_IMAGES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.container-chapter-reader img").unwrap());

/// Titles and chapters are addressed by absolute URL, so no base URL is needed
pub struct Manganato {
    context: SourceContext,
}

impl Manganato {
    pub fn new(context: SourceContext) -> Self {
        Self { context }
    }
}

/// Absolute chapter URLs from a title page
pub fn parse_chapter_list(html: &str, manga_url: &str) -> Vec<String> {
    let base = Url::parse(manga_url).ok();
    let document = Html::parse_document(html);
    let urls = document
        .select(&CHAPTER_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| match &base {
            Some(b) => b.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        })
        .collect();
    super::dedup_in_order(urls)
}

/// Every reader image must carry `src` or `data-src`, otherwise the whole
/// chapter is rejected
pub fn parse_reader_images(html: &str) -> Result<Vec<PageUrl>, ResolutionError> {
    let document = Html::parse_document(html);
    let mut pages = Vec::new();
    for (index, img) in document.select(&READER_IMAGES).enumerate() {
        let src = image_source(&img).ok_or(ResolutionError::MissingImageSource { index })?;
        pages.push(PageUrl::new(src));
    }
    if pages.is_empty() {
        return Err(ResolutionError::MissingMarkup(
            "div.container-chapter-reader img".to_string(),
        ));
    }
    Ok(pages)
}

#[async_trait]
impl SourceAdapter for Manganato {
    fn source(&self) -> Source {
        Source::Manganato
    }

    async fn list_chapters(&self, manga_id: &str) -> Result<Vec<ChapterRef>, DiscoveryError> {
        self.context.gate.wait().await;
        let html = self
            .context
            .fetch
            .fetch_text(FetchRequest::get(manga_id).header("Referer", manga_id))
            .await?;
        Ok(parse_chapter_list(&html, manga_id))
    }

    async fn resolve_pages(&self, chapter: &ChapterRef) -> Result<Resolution, ResolutionError> {
        self.context.gate.wait().await;
        let html = self
            .context
            .fetch
            .fetch_text(FetchRequest::get(chapter.as_str()))
            .await?;
        Ok(Resolution::Pages(parse_reader_images(&html)?))
    }
}

//! Batoto, driven through a headless browser tab.
//!
//! The site serves an origin challenge, so every page is rendered in a real
//! tab that is opened when a title starts and closed when it ends. Chapter
//! pages carry an inline script with three constants:
//! - `batoPass`: an obfuscated expression yielding the AES passphrase
//! - `batoWord`: the encrypted JSON array of per-image access tokens
//! - `imgHttps`: the base image URLs
//!
//! Page `i` is `imgHttps[i] + "?" + token[i]`.

pub mod crypto;
pub mod expr;

use super::SourceAdapter;
use crate::browser::{BrowserConfig, BrowserError, BrowserManager, BrowserScraper};
use crate::error::{DiscoveryError, ResolutionError};
use crate::helpers::last_path_segment;
use crate::models::{ChapterRef, PageUrl, Resolution, Source};
use crate::rate_limit::RateLimiter;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::{Arc, LazyLock, Mutex};

pub const BASE_URL: &str = "https://bato.to";

static EPISODE_LINKS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(".episode-list a[href]").unwrap());
static SCRIPTS: LazyLock<Selector> = LazyLock::new(|| Selector::parse("script").unwrap());

static BATO_PASS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:const|let|var)\s+batoPass\s*=\s*([^;]+?)\s*;").unwrap());
static BATO_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:const|let|var)\s+batoWord\s*=\s*["']([^"']+)["']"#).unwrap());
static IMAGE_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(?:const|let|var)\s+(?:imgHttps|imgHttpLis)\s*=\s*(\[.*?\])\s*;").unwrap()
});

pub struct Batoto {
    config: BrowserConfig,
    base_url: String,
    gate: Arc<RateLimiter>,
    manager: Mutex<Option<Arc<BrowserManager>>>,
    tab: Mutex<Option<Arc<BrowserScraper>>>,
}

impl Batoto {
    /// The browser is only launched once a Batoto title is actually processed
    pub fn new(config: BrowserConfig, base_url: &str, gate: Arc<RateLimiter>) -> Self {
        Self {
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
            gate,
            manager: Mutex::new(None),
            tab: Mutex::new(None),
        }
    }

    fn title_url(&self, manga_id: &str) -> String {
        if manga_id.starts_with("http") {
            manga_id.to_string()
        } else {
            format!("{}/series/{}", self.base_url, manga_id)
        }
    }

    fn chapter_url(&self, chapter: &str) -> String {
        if chapter.starts_with("http") {
            chapter.to_string()
        } else {
            format!("{}/chapter/{}", self.base_url, chapter)
        }
    }

    async fn ensure_manager(&self) -> Result<Arc<BrowserManager>, BrowserError> {
        if let Some(manager) = lock(&self.manager).clone() {
            return Ok(manager);
        }
        let config = self.config.clone();
        let manager = Arc::new(blocking(move || BrowserManager::new(config)).await?);
        *lock(&self.manager) = Some(manager.clone());
        Ok(manager)
    }

    async fn ensure_tab(&self) -> Result<Arc<BrowserScraper>, BrowserError> {
        if let Some(tab) = lock(&self.tab).clone() {
            return Ok(tab);
        }
        let manager = self.ensure_manager().await?;
        let scraper = blocking(move || {
            manager
                .new_tab()
                .map(|tab| BrowserScraper::new(tab, manager.config()))
        })
        .await?;
        let scraper = Arc::new(scraper);
        *lock(&self.tab) = Some(scraper.clone());
        Ok(scraper)
    }

    /// Navigate the title's tab and return the settled HTML
    async fn render(&self, url: String) -> Result<String, BrowserError> {
        let tab = self.ensure_tab().await?;
        self.gate.wait().await;
        blocking(move || {
            tab.navigate_until_idle(&url)?;
            tab.get_html()
        })
        .await
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// headless_chrome is synchronous; keep it off the async workers
async fn blocking<T, F>(f: F) -> Result<T, BrowserError>
where
    F: FnOnce() -> Result<T, BrowserError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BrowserError::JavaScriptError(format!("browser task failed: {}", e)))?
}

/// Chapter ids from the episode list of a title page
pub fn parse_chapter_list(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let ids = document
        .select(&EPISODE_LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains("/chapter/"))
        .map(|href| last_path_segment(href).to_string())
        .filter(|id| !id.is_empty())
        .collect();
    super::dedup_in_order(ids)
}

/// Locate the image script and turn it into signed page URLs
pub fn extract_pages(html: &str) -> Result<Vec<PageUrl>, ResolutionError> {
    let document = Html::parse_document(html);
    let script = document
        .select(&SCRIPTS)
        .map(|s| s.text().collect::<String>())
        .find(|text| text.contains("batoWord") || text.contains("batoPass"))
        .ok_or_else(|| ResolutionError::MissingMarkup("chapter image script".to_string()))?;

    let pass_expr = capture(&BATO_PASS, &script).ok_or(ResolutionError::MissingConstant("batoPass"))?;
    let payload = capture(&BATO_WORD, &script).ok_or(ResolutionError::MissingConstant("batoWord"))?;
    let images_json = capture(&IMAGE_LIST, &script).ok_or(ResolutionError::MissingConstant("imgHttps"))?;

    let images: Vec<String> = serde_json::from_str(images_json)
        .map_err(|e| ResolutionError::MissingMarkup(format!("imgHttps is not a string array: {}", e)))?;
    if images.is_empty() {
        return Err(ResolutionError::MissingMarkup("imgHttps is empty".to_string()));
    }

    let passphrase =
        expr::evaluate_to_string(pass_expr).map_err(|e| ResolutionError::Passphrase(e.to_string()))?;
    let plaintext = crypto::decrypt_salted(&passphrase, payload).map_err(ResolutionError::Decrypt)?;
    let tokens: Vec<String> = serde_json::from_slice(&plaintext).map_err(|e| {
        ResolutionError::Decrypt(format!("decrypted payload is not a JSON string array: {}", e))
    })?;

    if tokens.len() != images.len() {
        return Err(ResolutionError::TokenMismatch {
            tokens: tokens.len(),
            images: images.len(),
        });
    }

    Ok(images
        .into_iter()
        .zip(tokens)
        .map(|(url, token)| PageUrl::with_token(url, token))
        .collect())
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text).and_then(|c| c.get(1)).map(|m| m.as_str())
}

#[async_trait]
impl SourceAdapter for Batoto {
    fn source(&self) -> Source {
        Source::Batoto
    }

    async fn begin_title(&self, manga_id: &str) -> Result<(), DiscoveryError> {
        log::debug!("[batoto] opening tab for {}", manga_id);
        self.ensure_tab().await?;
        Ok(())
    }

    async fn list_chapters(&self, manga_id: &str) -> Result<Vec<ChapterRef>, DiscoveryError> {
        let html = self.render(self.title_url(manga_id)).await?;
        Ok(parse_chapter_list(&html))
    }

    async fn resolve_pages(&self, chapter: &ChapterRef) -> Result<Resolution, ResolutionError> {
        let html = self.render(self.chapter_url(chapter)).await?;
        Ok(Resolution::Pages(extract_pages(&html)?))
    }

    async fn end_title(&self) {
        let tab = lock(&self.tab).take();
        if let Some(tab) = tab {
            if let Err(e) = blocking(move || tab.close()).await {
                log::warn!("[batoto] could not close tab: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASS_EXPR: &str = "(+(+!+[]+[+!+[]]+(!+[]+!+[])))+[]+(!+[]+!+[]+!+[])";

    fn chapter_page(pass_expr: &str, payload: &str, images: &[&str]) -> String {
        let list = serde_json::to_string(images).unwrap();
        format!(
            r#"<html><head><script>var other = 1;</script></head><body>
            <script>
              const imgHttps = {list};
              const batoPass = {pass_expr};
              const batoWord = "{payload}";
            </script></body></html>"#
        )
    }

    #[test]
    fn test_parse_chapter_list() {
        let html = r#"
            <div class="episode-list">
              <div class="main">
                <a class="visited chapt" href="/chapter/2791153"><b>Chapter 12</b></a>
                <a class="chapt" href="/chapter/2791100/"><b>Chapter 11</b></a>
                <a href="/user/42">uploader</a>
              </div>
            </div>
            <a href="/chapter/999">outside list</a>"#;
        assert_eq!(parse_chapter_list(html), vec!["2791153", "2791100"]);
    }

    #[test]
    fn test_extract_pages_round_trip() {
        let tokens = vec!["acc=a1&exp=1", "acc=b2&exp=1", "acc=c3&exp=1"];
        let images = ["https://xfs-n01.xfsbb.com/comic/1.webp", "https://xfs-n01.xfsbb.com/comic/2.webp", "https://xfs-n01.xfsbb.com/comic/3.webp"];
        let payload = crypto::encrypt_salted("1123", *b"S4ltS4lt", serde_json::to_string(&tokens).unwrap().as_bytes());

        let pages = extract_pages(&chapter_page(PASS_EXPR, &payload, &images)).unwrap();
        assert_eq!(pages.len(), 3);
        for (i, page) in pages.iter().enumerate() {
            assert_eq!(page.to_request_url(), format!("{}?{}", images[i], tokens[i]));
        }
    }

    #[test]
    fn test_corrupted_payload_is_resolution_error() {
        let payload = crypto::encrypt_salted("1123", *b"S4ltS4lt", br#"["t1"]"#);
        let mut corrupted: Vec<char> = payload.chars().collect();
        let last = corrupted.len() - 3;
        corrupted[last] = if corrupted[last] == 'A' { 'B' } else { 'A' };
        let corrupted: String = corrupted.into_iter().collect();

        let result = extract_pages(&chapter_page(PASS_EXPR, &corrupted, &["https://x/1.webp"]));
        assert!(matches!(
            result,
            Err(ResolutionError::Decrypt(_)) | Err(ResolutionError::TokenMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_passphrase_is_resolution_error() {
        let payload = crypto::encrypt_salted("9999", *b"S4ltS4lt", br#"["t1"]"#);
        let result = extract_pages(&chapter_page(PASS_EXPR, &payload, &["https://x/1.webp"]));
        assert!(result.is_err());
    }

    #[test]
    fn test_token_count_mismatch() {
        let payload = crypto::encrypt_salted("1123", *b"S4ltS4lt", br#"["t1"]"#);
        let result = extract_pages(&chapter_page(PASS_EXPR, &payload, &["https://x/1.webp", "https://x/2.webp"]));
        assert!(matches!(result, Err(ResolutionError::TokenMismatch { tokens: 1, images: 2 })));
    }

    #[test]
    fn test_missing_constants() {
        let no_script = "<html><script>var a = 1;</script></html>";
        assert!(matches!(extract_pages(no_script), Err(ResolutionError::MissingMarkup(_))));

        let no_word = r#"<script>const imgHttps = ["https://x/1.webp"]; const batoPass = 1+1;</script>"#;
        assert!(matches!(extract_pages(no_word), Err(ResolutionError::MissingConstant("batoWord"))));

        let no_images = r#"<script>const batoPass = 1+1; const batoWord = "U2FsdGVkX1abc";</script>"#;
        assert!(matches!(extract_pages(no_images), Err(ResolutionError::MissingConstant("imgHttps"))));
    }

    #[test]
    fn test_passphrase_code_is_rejected() {
        let payload = crypto::encrypt_salted("1", *b"S4ltS4lt", br#"["t1"]"#);
        let result = extract_pages(&chapter_page("fetch('//evil')", &payload, &["https://x/1.webp"]));
        assert!(matches!(result, Err(ResolutionError::Passphrase(_))));
    }

    #[test]
    fn test_title_and_chapter_urls() {
        let adapter = Batoto::new(
            BrowserConfig::default(),
            "https://bato.to/",
            Arc::new(RateLimiter::new("discovery", std::time::Duration::ZERO)),
        );
        assert_eq!(adapter.title_url("86663"), "https://bato.to/series/86663");
        assert_eq!(adapter.title_url("https://mirror.to/series/1"), "https://mirror.to/series/1");
        assert_eq!(adapter.chapter_url("2791153"), "https://bato.to/chapter/2791153");
    }
}

mod common;

use common::*;
use paperback_cache_warmer::error::{DiscoveryError, ResolutionError};
use paperback_cache_warmer::http_client::Fetch;
use paperback_cache_warmer::models::{PageUrl, Resolution};
use paperback_cache_warmer::rate_limit::RateLimiter;
use paperback_cache_warmer::sources::mangadex::MangaDex;
use paperback_cache_warmer::sources::manganato::Manganato;
use paperback_cache_warmer::sources::weebcentral::WeebCentral;
use paperback_cache_warmer::sources::{SourceAdapter, SourceContext};
use std::sync::Arc;
use std::time::Duration;

fn context(fetch: Arc<ScriptedFetch>) -> SourceContext {
    let fetch: Arc<dyn Fetch> = fetch;
    SourceContext {
        fetch,
        gate: Arc::new(RateLimiter::new("discovery", Duration::from_millis(250))),
    }
}

fn feed_page(start: usize, count: usize) -> String {
    let data: Vec<serde_json::Value> = (start..start + count)
        .map(|i| serde_json::json!({"id": format!("chapter-{}", i), "type": "chapter"}))
        .collect();
    serde_json::json!({"result": "ok", "data": data}).to_string()
}

#[tokio::test(start_paused = true)]
async fn test_mangadex_pages_until_empty() {
    let fetch = ScriptedFetch::new();
    fetch.bodies(
        "/manga/md-1/feed",
        vec![feed_page(0, 500), feed_page(500, 500), feed_page(1000, 237), feed_page(0, 0)],
    );
    let adapter = MangaDex::new(context(fetch.clone()), UPSTREAM, 500);

    let started = tokio::time::Instant::now();
    let chapters = adapter.list_chapters("md-1").await.unwrap();

    assert_eq!(chapters.len(), 1237);
    assert_eq!(chapters[1236], "chapter-1236");
    let requests = fetch.requests();
    assert_eq!(requests.len(), 4);
    let offsets: Vec<&str> = requests.iter().map(|r| r.query_values("offset")[0]).collect();
    assert_eq!(offsets, vec!["0", "500", "1000", "1237"]);
    assert_eq!(requests[0].query_values("limit"), vec!["500"]);
    assert_eq!(requests[0].query_values("translatedLanguage[]"), vec!["en"]);
    assert_eq!(requests[0].query_values("contentRating[]").len(), 4);
    // Three gaps between four gated requests
    assert!(started.elapsed() >= Duration::from_millis(750));
}

#[tokio::test(start_paused = true)]
async fn test_mangadex_feed_error_is_discovery_error() {
    let fetch = ScriptedFetch::new();
    fetch.route("/manga/md-1/feed", vec![Reply::Status(503)]);
    let adapter = MangaDex::new(context(fetch), UPSTREAM, 500);

    assert!(matches!(
        adapter.list_chapters("md-1").await,
        Err(DiscoveryError::Fetch(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_mangadex_resolves_to_proxy_chapter() {
    let adapter = MangaDex::new(context(ScriptedFetch::new()), UPSTREAM, 500);
    assert_eq!(
        adapter.resolve_pages(&"ch-1".to_string()).await.unwrap(),
        Resolution::ProxyChapter("ch-1".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_weebcentral_image_request() {
    let fetch = ScriptedFetch::new();
    fetch.body("/chapters/01JX/images", weebcentral_images("01JX", 2));
    let adapter = WeebCentral::new(context(fetch.clone()), UPSTREAM);

    let resolution = adapter.resolve_pages(&"01JX".to_string()).await.unwrap();
    assert_eq!(
        resolution,
        Resolution::Pages(vec![
            PageUrl::new("https://cdn.test/01JX/001.png"),
            PageUrl::new("https://cdn.test/01JX/002.png"),
        ])
    );

    let request = &fetch.requests()[0];
    assert_eq!(request.url, format!("{}/chapters/01JX/images", UPSTREAM));
    assert_eq!(request.query_values("is_prev"), vec!["False"]);
    assert_eq!(request.query_values("current_page"), vec!["1"]);
    assert_eq!(request.query_values("reading_style"), vec!["long_strip"]);
}

#[tokio::test(start_paused = true)]
async fn test_manganato_title_to_pages() {
    let title = "https://chapmanganato.test/manga-ab123";
    let fetch = ScriptedFetch::new();
    fetch.body(
        "/manga-ab123/chapter-1",
        r#"<div class="container-chapter-reader"><img src="https://img.test/1.jpg"><img data-src="https://img.test/2.jpg"></div>"#,
    );
    fetch.body(
        "/manga-ab123",
        r#"<ul class="row-content-chapter"><li><a href="/manga-ab123/chapter-1">Chapter 1</a></li></ul>"#,
    );
    let adapter = Manganato::new(context(fetch.clone()));

    let chapters = adapter.list_chapters(title).await.unwrap();
    assert_eq!(chapters, vec!["https://chapmanganato.test/manga-ab123/chapter-1"]);
    assert_eq!(fetch.requests()[0].header_value("referer"), Some(title));

    match adapter.resolve_pages(&chapters[0]).await.unwrap() {
        Resolution::Pages(pages) => assert_eq!(pages.len(), 2),
        other => panic!("unexpected resolution {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_manganato_missing_image_source_fails_chapter() {
    let fetch = ScriptedFetch::new();
    fetch.body(
        "/chapter-2",
        r#"<div class="container-chapter-reader"><img src="https://img.test/1.jpg"><img></div>"#,
    );
    let adapter = Manganato::new(context(fetch));

    let result = adapter
        .resolve_pages(&"https://chapmanganato.test/manga-ab123/chapter-2".to_string())
        .await;
    assert!(matches!(result, Err(ResolutionError::MissingImageSource { index: 1 })));
}

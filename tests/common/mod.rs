// Shared fixtures for the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use paperback_cache_warmer::cache::CompletionCache;
use paperback_cache_warmer::config::{Config, ProxyConfig};
use paperback_cache_warmer::error::FetchError;
use paperback_cache_warmer::forwarder::ProxyForwarder;
use paperback_cache_warmer::http_client::{Fetch, FetchRequest};
use paperback_cache_warmer::models::LibraryEntry;
use paperback_cache_warmer::pipeline::Pipeline;
use paperback_cache_warmer::rate_limit::RateLimiter;
use paperback_cache_warmer::sources::{build_adapters, SourceContext};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const SITE: &str = "https://proxy.test";
pub const UPSTREAM: &str = "https://upstream.test";

#[derive(Debug, Clone)]
pub enum Reply {
    Body(String),
    Status(u16),
}

struct Route {
    pattern: String,
    replies: VecDeque<Reply>,
}

/// Replays canned bodies for URLs containing a pattern and records every
/// request. Each route pops its replies in order; the last one repeats.
/// Unmatched URLs get a 404.
#[derive(Default)]
pub struct ScriptedFetch {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<(Instant, FetchRequest)>>,
}

impl ScriptedFetch {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, pattern: &str, replies: Vec<Reply>) {
        self.routes.lock().unwrap().push(Route {
            pattern: pattern.to_string(),
            replies: replies.into(),
        });
    }

    pub fn body(&self, pattern: &str, body: impl Into<String>) {
        self.route(pattern, vec![Reply::Body(body.into())]);
    }

    pub fn bodies(&self, pattern: &str, bodies: Vec<String>) {
        self.route(pattern, bodies.into_iter().map(Reply::Body).collect());
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    /// When each request for URLs containing `pattern` arrived, on the tokio clock
    pub fn request_times(&self, pattern: &str) -> Vec<Instant> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r.url.contains(pattern))
            .map(|(at, _)| *at)
            .collect()
    }

    pub fn requests_to(&self, pattern: &str) -> Vec<FetchRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(pattern))
            .collect()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetch for ScriptedFetch {
    async fn fetch_text(&self, request: FetchRequest) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push((Instant::now(), request.clone()));

        let mut routes = self.routes.lock().unwrap();
        let reply = routes
            .iter_mut()
            .find(|route| request.url.contains(&route.pattern))
            .and_then(|route| {
                if route.replies.len() > 1 {
                    route.replies.pop_front()
                } else {
                    route.replies.front().cloned()
                }
            });

        match reply {
            Some(Reply::Body(body)) => Ok(body),
            Some(Reply::Status(status)) => Err(FetchError::Status {
                url: request.url,
                status,
            }),
            None => Err(FetchError::Status {
                url: request.url,
                status: 404,
            }),
        }
    }
}

pub fn proxy_ok() -> String {
    r#"{"failedImages": []}"#.to_string()
}

pub fn proxy_failed(urls: &[&str]) -> String {
    serde_json::json!({ "failedImages": urls }).to_string()
}

pub fn entry(source_id: &str, manga_id: &str) -> LibraryEntry {
    serde_json::from_value(serde_json::json!({
        "sourceId": source_id,
        "mangaId": manga_id,
        "title": manga_id,
    }))
    .unwrap()
}

pub fn test_config(cache_file: &Path) -> Config {
    let mut config = Config::default();
    config.pipeline.cache_file = cache_file.to_path_buf();
    config.sources.mangadex_api = UPSTREAM.to_string();
    config.sources.weebcentral = UPSTREAM.to_string();
    config.sources.batoto = UPSTREAM.to_string();
    config
}

/// A pipeline over the real adapters, talking to the scripted fetch
pub fn pipeline(fetch: Arc<dyn Fetch>, config: &Config) -> Pipeline {
    let proxy = ProxyConfig::from_lookup(|key| match key {
        "SITE" => Some(format!("{}/", SITE)),
        "TOKEN" => Some("secret".to_string()),
        _ => None,
    })
    .unwrap();

    let context = SourceContext {
        fetch: fetch.clone(),
        gate: Arc::new(RateLimiter::new("discovery", config.pipeline.discovery_interval())),
    };
    let forwarder = ProxyForwarder::new(
        fetch,
        proxy,
        config.pipeline.chunk_size,
        RateLimiter::new("forward", Duration::from_millis(config.pipeline.forward_interval_ms)),
    );
    let cache = CompletionCache::load(&config.pipeline.cache_file).unwrap();
    Pipeline::new(build_adapters(config, context), forwarder, cache, &config.pipeline)
}

/// Minimum gap between consecutive instants
pub fn min_gap(times: &[Instant]) -> Duration {
    times
        .windows(2)
        .map(|w| w[1] - w[0])
        .min()
        .unwrap_or(Duration::MAX)
}

/// WeebCentral chapter list fragment
pub fn weebcentral_list(chapter_ids: &[&str]) -> String {
    let links: String = chapter_ids
        .iter()
        .map(|id| format!(r#"<a href="{}/chapters/{}">Chapter</a>"#, UPSTREAM, id))
        .collect();
    format!("<div>{}</div>", links)
}

/// WeebCentral images fragment with `count` pages
pub fn weebcentral_images(chapter_id: &str, count: usize) -> String {
    let imgs: String = (1..=count)
        .map(|i| format!(r#"<img src="https://cdn.test/{}/{:03}.png">"#, chapter_id, i))
        .collect();
    format!("<section>{}</section>", imgs)
}

//! Forwarding resolved chapters to the caching proxy.
//!
//! Two endpoints, same response shape (`{"failedImages": [...]}`):
//! - `GET {SITE}/manga?chapterId=..` where the proxy resolves the chapter itself
//! - `GET {SITE}/generic?imageUrls=..&imageUrls=..` for at most `chunk_size` URLs

use crate::config::ProxyConfig;
use crate::error::ForwardingError;
use crate::http_client::{Fetch, FetchRequest};
use crate::models::{PageUrl, Resolution};
use crate::rate_limit::RateLimiter;
use std::sync::Arc;

/// Outcome of forwarding one chapter
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardReport {
    pub requests: usize,
    pub failed_images: Vec<String>,
}

impl ForwardReport {
    pub fn is_clean(&self) -> bool {
        self.failed_images.is_empty()
    }
}

/// Chapter forwarding was cut short by a failed proxy call
#[derive(Debug)]
pub struct ForwardAbort {
    pub partial: ForwardReport,
    pub error: ForwardingError,
}

pub struct ProxyForwarder {
    fetch: Arc<dyn Fetch>,
    proxy: ProxyConfig,
    chunk_size: usize,
    gate: RateLimiter,
}

impl ProxyForwarder {
    pub fn new(fetch: Arc<dyn Fetch>, proxy: ProxyConfig, chunk_size: usize, gate: RateLimiter) -> Self {
        Self {
            fetch,
            proxy,
            chunk_size: chunk_size.max(1),
            gate,
        }
    }

    pub async fn forward(&self, resolution: &Resolution) -> Result<ForwardReport, ForwardAbort> {
        match resolution {
            Resolution::ProxyChapter(chapter_id) => self.forward_chapter_id(chapter_id).await,
            Resolution::Pages(pages) => self.forward_pages(pages).await,
        }
    }

    /// Single call, the proxy fetches every image of the chapter
    pub async fn forward_chapter_id(&self, chapter_id: &str) -> Result<ForwardReport, ForwardAbort> {
        let request = self
            .authorized(format!("{}/manga", self.proxy.site))
            .query("chapterId", chapter_id);

        match self.send(request).await {
            Ok(failed) => Ok(ForwardReport {
                requests: 1,
                failed_images: failed,
            }),
            Err(error) => Err(ForwardAbort {
                partial: ForwardReport::default(),
                error,
            }),
        }
    }

    /// One request per chunk; reported image failures do not stop later chunks,
    /// a failed request does
    pub async fn forward_pages(&self, pages: &[PageUrl]) -> Result<ForwardReport, ForwardAbort> {
        let mut report = ForwardReport::default();
        let chunks = pages.len().div_ceil(self.chunk_size);

        for (index, chunk) in pages.chunks(self.chunk_size).enumerate() {
            let mut request = self.authorized(format!("{}/generic", self.proxy.site));
            for page in chunk {
                request = request.query("imageUrls", page.to_request_url());
            }

            report.requests += 1;
            match self.send(request).await {
                Ok(failed) => {
                    if !failed.is_empty() {
                        log::warn!(
                            "Proxy reported {} failed images in chunk {}/{}",
                            failed.len(),
                            index + 1,
                            chunks
                        );
                    }
                    report.failed_images.extend(failed);
                }
                Err(error) => {
                    log::error!("Chunk {}/{} failed, abandoning chapter: {}", index + 1, chunks, error);
                    return Err(ForwardAbort {
                        partial: report,
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    fn authorized(&self, url: String) -> FetchRequest {
        FetchRequest::get(url)
            .header("Authorization", format!("Bearer {}", self.proxy.token))
            .header("Referer", self.proxy.site.clone())
    }

    async fn send(&self, request: FetchRequest) -> Result<Vec<String>, ForwardingError> {
        self.gate.wait().await;
        let body = self.fetch.fetch_json(request).await?;
        parse_failed_images(&body)
    }
}

/// `failedImages` must be present and an array of strings
pub fn parse_failed_images(body: &serde_json::Value) -> Result<Vec<String>, ForwardingError> {
    let failed = body
        .get("failedImages")
        .and_then(|v| v.as_array())
        .ok_or_else(|| ForwardingError::Response(body.to_string()))?;
    Ok(failed
        .iter()
        .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
        .collect())
}

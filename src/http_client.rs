use crate::error::FetchError;
use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// User agents to rotate through to avoid bot detection
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// A GET request: URL, repeated query pairs and extra headers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    /// All values of a query key, in order
    pub fn query_values(&self, key: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

/// Outbound HTTP seam shared by the adapters and the forwarder.
///
/// Implementations return the body of a 2xx response; anything else is a
/// `FetchError`. There are no retries: a failed request is abandoned for
/// this run.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch_text(&self, request: FetchRequest) -> Result<String, FetchError>;

    async fn fetch_json(&self, request: FetchRequest) -> Result<serde_json::Value, FetchError> {
        let url = request.url.clone();
        let text = self.fetch_text(request).await?;
        serde_json::from_str(&text).map_err(|e| FetchError::Body {
            url,
            message: e.to_string(),
        })
    }
}

/// Configuration for the HTTP client
#[derive(Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub enable_cookies: bool,
    pub enable_gzip: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            enable_cookies: true,
            enable_gzip: true,
        }
    }
}

/// reqwest client with browser-like default headers
pub struct EnhancedHttpClient {
    client: Client,
}

impl EnhancedHttpClient {
    /// Create a new client with default configuration
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,application/json;q=0.9,*/*;q=0.8",
            ),
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            reqwest::header::HeaderValue::from_static("en-US,en;q=0.9"),
        );
        headers.insert(
            reqwest::header::HeaderName::from_static("dnt"),
            reqwest::header::HeaderValue::from_static("1"),
        );

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(Self::random_user_agent())
            .cookie_store(config.enable_cookies)
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    /// Get a random user agent from the pool
    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }
}

#[async_trait]
impl Fetch for EnhancedHttpClient {
    async fn fetch_text(&self, request: FetchRequest) -> Result<String, FetchError> {
        let url = request.url.clone();
        let mut builder = self
            .client
            .get(&request.url)
            .header(reqwest::header::USER_AGENT, Self::random_user_agent());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| FetchError::Request {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| FetchError::Body {
            url,
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        let client = EnhancedHttpClient::new();
        assert!(client.is_ok());
    }

    #[test]
    fn test_random_user_agent() {
        let ua = EnhancedHttpClient::random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn test_request_builder_keeps_repeated_query_keys() {
        let request = FetchRequest::get("https://proxy/generic")
            .query("imageUrls", "a")
            .query("imageUrls", "b")
            .header("Authorization", "Bearer t");
        assert_eq!(request.query_values("imageUrls"), vec!["a", "b"]);
        assert_eq!(request.header_value("authorization"), Some("Bearer t"));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_status_error_is_reported() {
        let client = EnhancedHttpClient::new().unwrap();
        let result = client
            .fetch_text(FetchRequest::get("https://httpbin.org/status/404"))
            .await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }
}

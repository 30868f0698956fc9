use crate::error::StartupError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub sources: SourceUrls,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Completion cache location
    #[serde(default = "default_cache_file")]
    pub cache_file: PathBuf,

    /// Directory scanned for the backup archive
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Page URLs per proxy request
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Minimum gap between upstream discovery/resolution requests
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_ms: u64,

    /// Minimum gap between proxy requests
    #[serde(default = "default_forward_interval")]
    pub forward_interval_ms: u64,

    #[serde(default = "default_chapter_interval")]
    pub chapter_interval_ms: u64,

    #[serde(default = "default_title_interval")]
    pub title_interval_ms: u64,

    #[serde(default = "default_mangadex_page_size")]
    pub mangadex_page_size: usize,

    /// Sanitized source ids that are never processed
    #[serde(default = "default_excluded")]
    pub excluded_sources: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enable_cookies: bool,
    #[serde(default = "default_true")]
    pub enable_compression: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrowserSettings {
    #[serde(default = "default_true")]
    pub headless: bool,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Quiet period that counts as "network idle"
    #[serde(default = "default_network_idle")]
    pub network_idle_ms: u64,
    #[serde(default = "default_true")]
    pub disable_images: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceUrls {
    #[serde(default = "default_mangadex_api")]
    pub mangadex_api: String,
    #[serde(default = "default_weebcentral")]
    pub weebcentral: String,
    #[serde(default = "default_batoto")]
    pub batoto: String,
}

/// Proxy endpoint and credentials, always taken from the environment
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub site: String,
    pub token: String,
}

fn default_true() -> bool { true }
fn default_cache_file() -> PathBuf { PathBuf::from("cache.json") }
fn default_archive_dir() -> PathBuf { PathBuf::from(".") }
fn default_chunk_size() -> usize { 10 }
fn default_discovery_interval() -> u64 { 250 }
fn default_forward_interval() -> u64 { 100 }
fn default_chapter_interval() -> u64 { 250 }
fn default_title_interval() -> u64 { 250 }
fn default_mangadex_page_size() -> usize { 500 }
fn default_excluded() -> Vec<String> { vec!["toonily".to_string(), "anilist".to_string()] }
fn default_timeout() -> u64 { 30 }
fn default_network_idle() -> u64 { 500 }
fn default_mangadex_api() -> String { crate::sources::mangadex::BASE_URL.to_string() }
fn default_weebcentral() -> String { crate::sources::weebcentral::BASE_URL.to_string() }
fn default_batoto() -> String { crate::sources::batoto::BASE_URL.to_string() }

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cache_file: default_cache_file(),
            archive_dir: default_archive_dir(),
            chunk_size: default_chunk_size(),
            discovery_interval_ms: default_discovery_interval(),
            forward_interval_ms: default_forward_interval(),
            chapter_interval_ms: default_chapter_interval(),
            title_interval_ms: default_title_interval(),
            mangadex_page_size: default_mangadex_page_size(),
            excluded_sources: default_excluded(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            enable_cookies: true,
            enable_compression: true,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_secs: default_timeout(),
            network_idle_ms: default_network_idle(),
            disable_images: true,
        }
    }
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            mangadex_api: default_mangadex_api(),
            weebcentral: default_weebcentral(),
            batoto: default_batoto(),
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, defaults otherwise
    pub fn load() -> Self {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(content) => match toml::from_str::<Config>(&content) {
                    Ok(cfg) => return cfg,
                    Err(e) => log::warn!("Ignoring invalid {}: {}", path.display(), e),
                },
                Err(e) => log::warn!("Could not read {}: {}", path.display(), e),
            }
        }
        Self::default()
    }
}

impl PipelineConfig {
    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }

    pub fn forward_interval(&self) -> Duration {
        Duration::from_millis(self.forward_interval_ms)
    }

    pub fn chapter_interval(&self) -> Duration {
        Duration::from_millis(self.chapter_interval_ms)
    }

    pub fn title_interval(&self) -> Duration {
        Duration::from_millis(self.title_interval_ms)
    }
}

impl HttpConfig {
    /// Create the upstream/proxy HTTP client from this configuration
    pub fn create_http_client(&self) -> Result<crate::http_client::EnhancedHttpClient, reqwest::Error> {
        use crate::http_client::{EnhancedHttpClient, HttpClientConfig};

        EnhancedHttpClient::with_config(HttpClientConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            enable_cookies: self.enable_cookies,
            enable_gzip: self.enable_compression,
        })
    }
}

impl BrowserSettings {
    pub fn to_browser_config(&self) -> crate::browser::BrowserConfig {
        let mut config = crate::browser::BrowserConfig::stealth_mode();
        config.headless = self.headless;
        config.timeout_seconds = self.timeout_secs;
        config.network_idle_ms = self.network_idle_ms;
        config.disable_images = self.disable_images;
        config
    }
}

impl ProxyConfig {
    /// Read `SITE` and `TOKEN`, after merging any `.env` file
    pub fn from_env() -> Result<Self, StartupError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(StartupError::MissingEnv(key))
        };
        Ok(Self {
            site: read("SITE")?.trim_end_matches('/').to_string(),
            token: read("TOKEN")?,
        })
    }
}

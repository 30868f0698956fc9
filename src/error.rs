//! Error taxonomy for the cache-warming run.
//!
//! Only `StartupError` is fatal. Everything else is caught at the title or
//! chapter boundary by the pipeline and turned into a log line plus a cache
//! outcome.

use std::path::PathBuf;

/// Transport-level failure talking to an upstream or to the proxy
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("unreadable response body from {url}: {message}")]
    Body { url: String, message: String },
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("no file matching 'paperbackarchive' found in {0}")]
    ArchiveNotFound(PathBuf),

    #[error("archive {0} has no 'sourcemanga' record")]
    ManifestNotFound(PathBuf),

    #[error("could not read archive {path}: {message}")]
    ArchiveUnreadable { path: PathBuf, message: String },

    #[error("manga list record is not valid JSON: {0}")]
    ManifestInvalid(#[from] serde_json::Error),

    #[error("required environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("HTTP client initialization failed: {0}")]
    HttpClient(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache file I/O on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Listing a title's chapters failed
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("unexpected response shape: {0}")]
    Shape(String),

    #[error("browser error: {0}")]
    Browser(String),
}

/// Extracting a chapter's page URLs failed
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("missing markup: {0}")]
    MissingMarkup(String),

    #[error("image element {index} has neither src nor data-src")]
    MissingImageSource { index: usize },

    #[error("script constant '{0}' not found")]
    MissingConstant(&'static str),

    #[error("passphrase expression rejected: {0}")]
    Passphrase(String),

    #[error("payload decryption failed: {0}")]
    Decrypt(String),

    #[error("{tokens} access tokens for {images} images")]
    TokenMismatch { tokens: usize, images: usize },

    #[error("browser error: {0}")]
    Browser(String),
}

/// A proxy call failed outright (network or non-2xx)
#[derive(Debug, thiserror::Error)]
pub enum ForwardingError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("proxy response missing failedImages: {0}")]
    Response(String),
}

impl From<crate::browser::BrowserError> for DiscoveryError {
    fn from(e: crate::browser::BrowserError) -> Self {
        DiscoveryError::Browser(e.to_string())
    }
}

impl From<crate::browser::BrowserError> for ResolutionError {
    fn from(e: crate::browser::BrowserError) -> Self {
        ResolutionError::Browser(e.to_string())
    }
}

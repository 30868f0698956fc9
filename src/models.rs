use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregator sites chapters can be discovered on
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Source {
    MangaDex,
    WeebCentral,
    Manganato,
    Batoto,
}

impl Source {
    /// Short lowercase tag used in log lines
    pub fn tag(&self) -> &'static str {
        match self {
            Source::MangaDex => "mangadex",
            Source::WeebCentral => "weebcentral",
            Source::Manganato => "manganato",
            Source::Batoto => "batoto",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One title from the library backup.
///
/// Only the two fields the pipeline needs are typed; everything else the
/// backup carries is kept as opaque metadata.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LibraryEntry {
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub manga_id: String,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Source-defined chapter identifier (bare id or absolute URL)
pub type ChapterRef = String;

/// A resolved image location, optionally carrying a signed access token
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PageUrl {
    pub url: String,
    pub token: Option<String>,
}

impl PageUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), token: None }
    }

    pub fn with_token(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: Some(token.into()),
        }
    }

    /// The URL handed to the proxy: `url?token` when a token is present
    pub fn to_request_url(&self) -> String {
        match &self.token {
            Some(token) => format!("{}?{}", self.url, token),
            None => self.url.clone(),
        }
    }
}

/// What an adapter hands to the forwarder for one chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Page URLs that go through the generic bulk endpoint
    Pages(Vec<PageUrl>),
    /// The proxy resolves and fetches the chapter itself (MangaDex)
    ProxyChapter(String),
}

/// Terminal state of a chapter in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterOutcome {
    Skipped,
    Completed,
    PartiallyFailed,
    ForwardingFailed,
    ResolutionFailed,
}

impl ChapterOutcome {
    /// Value written to the completion cache, `None` leaves the entry untouched
    pub fn cache_value(&self) -> Option<bool> {
        match self {
            ChapterOutcome::Completed => Some(true),
            ChapterOutcome::PartiallyFailed | ChapterOutcome::ForwardingFailed => Some(false),
            ChapterOutcome::Skipped | ChapterOutcome::ResolutionFailed => None,
        }
    }
}

//! Small string and markup helpers shared by the sources and the pipeline
//!
//! # Examples
//!
//! ```
//! use paperback_cache_warmer::helpers::{sanitize_name, last_path_segment};
//!
//! assert_eq!(sanitize_name(" Weeb-Central "), "weebcentral");
//! assert_eq!(last_path_segment("https://weebcentral.com/chapters/01J76/"), "01J76");
//! ```

use crate::models::Source;
use scraper::ElementRef;

/// Lowercase, trim and drop spaces, dashes and underscores
pub fn sanitize_name(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

/// Map a sanitized source id onto a supported source
pub fn parse_source(sanitized: &str) -> Option<Source> {
    match sanitized {
        "mangadex" => Some(Source::MangaDex),
        "weebcentral" => Some(Source::WeebCentral),
        "manganato" | "mangakakalot" | "natomanga" => Some(Source::Manganato),
        "batoto" | "bato" => Some(Source::Batoto),
        _ => None,
    }
}

/// Last path segment of an href, ignoring query, fragment and trailing slashes
pub fn last_path_segment(href: &str) -> &str {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    let path = path.trim_end_matches('/');
    path.rsplit('/').next().unwrap_or(path)
}

/// Some lazy-loaded images carry a bogus `?undefined` query
pub fn strip_undefined_suffix(src: &str) -> &str {
    let src = src.trim();
    src.strip_suffix("?undefined").unwrap_or(src)
}

/// Image URL from `src`, falling back to the lazy-load `data-src`
pub fn image_source(element: &ElementRef) -> Option<String> {
    let value = element.value();
    value
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| value.attr("data-src").map(str::trim).filter(|s| !s.is_empty()))
        .map(|s| strip_undefined_suffix(s).to_string())
}

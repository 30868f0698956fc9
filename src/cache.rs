//! Durable per-chapter completion ledger.
//!
//! `source -> manga -> chapter -> bool`, where `true` means forwarded with no
//! reported image failures and `false` means attempted but not clean. Absent
//! chapters have not been attempted yet. Both `false` and absent are retried.

use crate::error::CacheError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

type ChapterMap = BTreeMap<String, bool>;
type TitleMap = BTreeMap<String, ChapterMap>;

pub struct CompletionCache {
    path: PathBuf,
    entries: BTreeMap<String, TitleMap>,
}

impl CompletionCache {
    /// Read the cache file, an absent file is an empty cache
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = path.into();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| CacheError::Io {
                path: path.clone(),
                source,
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|source| CacheError::Json {
                    path: path.clone(),
                    source,
                })?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the title bucket if it does not exist yet
    pub fn ensure_bucket(&mut self, source: &str, manga: &str) {
        self.entries
            .entry(source.to_string())
            .or_default()
            .entry(manga.to_string())
            .or_default();
    }

    pub fn has_bucket(&self, source: &str, manga: &str) -> bool {
        self.entries
            .get(source)
            .is_some_and(|titles| titles.contains_key(manga))
    }

    pub fn get(&self, source: &str, manga: &str, chapter: &str) -> Option<bool> {
        self.entries.get(source)?.get(manga)?.get(chapter).copied()
    }

    pub fn is_complete(&self, source: &str, manga: &str, chapter: &str) -> bool {
        self.get(source, manga, chapter) == Some(true)
    }

    /// Chapters that still need forwarding, in listing order
    pub fn pending<'a>(&self, source: &str, manga: &str, chapters: &'a [String]) -> Vec<&'a String> {
        chapters
            .iter()
            .filter(|chapter| !self.is_complete(source, manga, chapter))
            .collect()
    }

    pub fn record(&mut self, source: &str, manga: &str, chapter: &str, complete: bool) {
        self.entries
            .entry(source.to_string())
            .or_default()
            .entry(manga.to_string())
            .or_default()
            .insert(chapter.to_string(), complete);
    }

    /// Rewrite the whole file, pretty-printed, via a temp file and rename
    pub fn flush(&self) -> Result<(), CacheError> {
        let io_err = |source| CacheError::Io {
            path: self.path.clone(),
            source,
        };
        let content = serde_json::to_string_pretty(&self.entries).map_err(|source| CacheError::Json {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, content).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }

    pub fn completed_count(&self) -> usize {
        self.count(true)
    }

    pub fn failed_count(&self) -> usize {
        self.count(false)
    }

    fn count(&self, value: bool) -> usize {
        self.entries
            .values()
            .flat_map(|titles| titles.values())
            .flat_map(|chapters| chapters.values())
            .filter(|v| **v == value)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_absent_file_is_empty() {
        let dir = tempdir().unwrap();
        let cache = CompletionCache::load(dir.path().join("cache.json")).unwrap();
        assert_eq!(cache.completed_count(), 0);
        assert!(!cache.has_bucket("mangadex", "abc"));
    }

    #[test]
    fn test_record_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let mut cache = CompletionCache::load(&path).unwrap();
        cache.ensure_bucket("mangadex", "abc");
        cache.record("mangadex", "abc", "ch1", true);
        cache.record("mangadex", "abc", "ch2", false);
        cache.flush().unwrap();

        let reloaded = CompletionCache::load(&path).unwrap();
        assert!(reloaded.is_complete("mangadex", "abc", "ch1"));
        assert_eq!(reloaded.get("mangadex", "abc", "ch2"), Some(false));
        assert_eq!(reloaded.get("mangadex", "abc", "ch3"), None);
        assert_eq!(reloaded.completed_count(), 1);
        assert_eq!(reloaded.failed_count(), 1);

        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\n  \"mangadex\": {"), "cache file should be pretty-printed");
        assert!(!dir.path().join("cache.json.tmp").exists());
    }

    #[test]
    fn test_pending_skips_only_completed() {
        let mut cache = CompletionCache::load("unused.json").unwrap();
        cache.record("batoto", "t", "1", true);
        cache.record("batoto", "t", "2", false);
        let chapters = vec!["1".to_string(), "2".to_string(), "3".to_string()];
        let pending = cache.pending("batoto", "t", &chapters);
        assert_eq!(pending, vec!["2", "3"]);
    }

    #[test]
    fn test_later_record_overwrites() {
        let mut cache = CompletionCache::load("unused.json").unwrap();
        cache.record("weebcentral", "t", "c", false);
        cache.record("weebcentral", "t", "c", true);
        assert!(cache.is_complete("weebcentral", "t", "c"));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(CompletionCache::load(&path), Err(CacheError::Json { .. })));
    }
}

//! Response cache for fetched pages.
//!
//! Scholar rate-limits aggressively, so every page that came back fine is
//! kept locally and served again for the same request.
//!
//! # Cache Structure
//!
//! ```text
//! ~/.cache/citecrawl/responses/
//!   <md5 of url>.json
//! ```
//!
//! Each file holds the page plus the time it was stored.

use crate::error::{CrawlError, Result};
use crate::transport::FetchedPage;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Storage contract used by `CachedTransport`
pub trait ResponseCache: Send + Sync {
    /// Stored page for `key`, or `None` on a miss
    fn get(&self, key: &str) -> Result<Option<FetchedPage>>;

    fn put(&self, key: &str, page: &FetchedPage) -> Result<()>;

    /// Drop one entry; missing entries are not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Drop every entry
    fn clear(&self) -> Result<()>;
}

/// Cache key for a request: the md5 of its full URL.
///
/// The session cookie is not part of the key, so a page stays cached across
/// re-authentication.
pub fn cache_key(url: &str) -> String {
    format!("{:x}", md5::compute(url.as_bytes()))
}

/// Default cache directory: `<platform cache dir>/citecrawl/responses`
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("citecrawl")
        .join("responses")
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    cached_at: DateTime<Utc>,
    page: FetchedPage,
}

/// One JSON file per cached page
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl FileCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, ttl: None }
    }

    /// Entries older than `ttl` are treated as misses.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    fn is_expired(&self, cached_at: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = Utc::now().signed_duration_since(cached_at);
        age.to_std().map(|age| age >= ttl).unwrap_or(false)
    }
}

impl ResponseCache for FileCache {
    fn get(&self, key: &str) -> Result<Option<FetchedPage>> {
        let path = self.entry_path(key);
        if !path.exists() {
            debug!("Cache MISS: {}", key);
            return Ok(None);
        }

        let content = fs::read_to_string(&path)?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding unreadable cache entry {:?}: {}", path, e);
                fs::remove_file(&path)?;
                return Ok(None);
            }
        };

        if self.is_expired(entry.cached_at) {
            debug!("Cache expired: {}", key);
            return Ok(None);
        }

        debug!("Cache HIT: {}", key);
        Ok(Some(entry.page))
    }

    fn put(&self, key: &str, page: &FetchedPage) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let entry = CacheEntry {
            cached_at: Utc::now(),
            page: page.clone(),
        };

        // Write beside the entry and rename so readers never see half a file
        let path = self.entry_path(key);
        let tmp = self.dir.join(format!("{}.json.tmp", key));
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)?;
        debug!("Cached {} as {}", page.url, key);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        if path.exists() {
            fs::remove_file(&path)?;
            debug!("Evicted {}", key);
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
        }
        info!("Cleared response cache at {}", self.dir.display());
        Ok(())
    }
}

/// In-process cache, mostly for tests and `--no-cache` style runs
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, FetchedPage>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, FetchedPage>>> {
        self.entries
            .lock()
            .map_err(|_| CrawlError::Config("response cache lock poisoned".to_string()))
    }
}

impl ResponseCache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<FetchedPage>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, page: &FetchedPage) -> Result<()> {
        self.lock()?.insert(key.to_string(), page.clone());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}

/// Cache that stores nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl ResponseCache for NoCache {
    fn get(&self, _key: &str) -> Result<Option<FetchedPage>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _page: &FetchedPage) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn page(url: &str) -> FetchedPage {
        FetchedPage::new(url, 200, "<html></html>")
    }

    #[test]
    fn test_cache_key_is_stable() {
        let a = cache_key("https://scholar.google.com/scholar?q=x");
        assert_eq!(a, cache_key("https://scholar.google.com/scholar?q=x"));
        assert_ne!(a, cache_key("https://scholar.google.com/scholar?q=y"));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_file_cache_roundtrip_and_clear() -> Result<()> {
        let dir = tempdir()?;
        let cache = FileCache::new(dir.path().join("responses"));
        let key = cache_key("u1");

        assert!(cache.get(&key)?.is_none());
        cache.put(&key, &page("u1"))?;
        assert_eq!(cache.get(&key)?.map(|p| p.url), Some("u1".to_string()));

        cache.clear()?;
        assert!(cache.get(&key)?.is_none());
        Ok(())
    }

    #[test]
    fn test_file_cache_ttl() -> Result<()> {
        let dir = tempdir()?;
        let cache = FileCache::new(dir.path().to_path_buf()).with_ttl(Some(Duration::ZERO));
        let key = cache_key("u1");

        cache.put(&key, &page("u1"))?;
        assert!(cache.get(&key)?.is_none());
        Ok(())
    }

    #[test]
    fn test_corrupt_entry_is_a_miss() -> Result<()> {
        let dir = tempdir()?;
        let cache = FileCache::new(dir.path().to_path_buf());
        let key = cache_key("u1");
        fs::write(dir.path().join(format!("{}.json", key)), "{not json")?;

        assert!(cache.get(&key)?.is_none());
        assert!(!dir.path().join(format!("{}.json", key)).exists());
        Ok(())
    }

    #[test]
    fn test_memory_cache_remove() -> Result<()> {
        let cache = MemoryCache::new();
        cache.put("a", &page("a"))?;
        cache.put("b", &page("b"))?;
        cache.remove("a")?;
        assert!(cache.get("a")?.is_none());
        assert_eq!(cache.len(), 1);
        Ok(())
    }
}

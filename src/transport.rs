//! HTTP transport and its caching wrapper.

use crate::cache::{cache_key, ResponseCache};
use crate::config::CrawlConfig;
use crate::error::{CrawlError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Raw result of one GET
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedPage {
    /// Requested URL
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
    /// Served from the response cache
    #[serde(skip)]
    pub from_cache: bool,
}

impl FetchedPage {
    pub fn new(url: &str, status: u16, body: &str) -> Self {
        Self {
            url: url.to_string(),
            status,
            body: body.to_string(),
            from_cache: false,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One GET with an optional `Cookie` header. Non-success statuses are
/// returned as pages; only transport failures are errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url, cookie: Option<&str>) -> Result<FetchedPage>;
}

/// reqwest-backed transport with browser-like headers
pub struct HttpTransport {
    client: reqwest::Client,
    max_delay_ms: u64,
}

impl HttpTransport {
    pub fn new(config: &CrawlConfig, proxy: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config, proxy)?,
            max_delay_ms: config.request_delay_ms,
        })
    }
}

/// Build HTTP client with optional proxy
fn build_http_client(config: &CrawlConfig, proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.request_timeout())
        .cookie_store(true);

    if let Some(proxy_url) = proxy {
        let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
            CrawlError::Config(format!("Invalid proxy URL '{}': {}", proxy_url, e))
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| CrawlError::Config(format!("Failed to build HTTP client: {}", e)))
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, cookie: Option<&str>) -> Result<FetchedPage> {
        // Random delay to avoid detection
        if self.max_delay_ms > 0 {
            let delay = rand::random::<u64>() % self.max_delay_ms + self.max_delay_ms / 3;
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut request = self
            .client
            .get(url.as_str())
            .header("Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Sec-Fetch-Dest", "document")
            .header("Sec-Fetch-Mode", "navigate")
            .header("Sec-Fetch-Site", "none")
            .header("Upgrade-Insecure-Requests", "1");

        if let Some(cookie) = cookie {
            request = request.header("Cookie", cookie);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(url = %url, status, bytes = body.len(), "Fetched page");

        Ok(FetchedPage::new(url.as_str(), status, &body))
    }
}

/// Transport that consults a `ResponseCache` first.
///
/// Only successful responses are stored.
pub struct CachedTransport {
    inner: Box<dyn Transport>,
    cache: Box<dyn ResponseCache>,
}

impl CachedTransport {
    pub fn new(inner: Box<dyn Transport>, cache: Box<dyn ResponseCache>) -> Self {
        Self { inner, cache }
    }

    pub async fn get(&self, url: &Url, cookie: Option<&str>) -> Result<FetchedPage> {
        let key = cache_key(url.as_str());
        match self.cache.get(&key) {
            Ok(Some(mut page)) => {
                debug!(url = %url, "Serving cached page");
                page.from_cache = true;
                return Ok(page);
            }
            Ok(None) => {}
            Err(e) => warn!(url = %url, error = %e, "Cache read failed"),
        }

        let page = self.inner.fetch(url, cookie).await?;
        if page.is_success() {
            if let Err(e) = self.cache.put(&key, &page) {
                warn!(url = %url, error = %e, "Cache write failed");
            }
        }
        Ok(page)
    }

    /// Forget the cached copy of `url`
    pub fn evict(&self, url: &Url) -> Result<()> {
        self.cache.remove(&cache_key(url.as_str()))
    }

    pub fn clear(&self) -> Result<()> {
        self.cache.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::mock::MockTransport;

    fn url(s: &str) -> Url {
        Url::parse(s).expect("valid test url")
    }

    #[tokio::test]
    async fn test_second_get_is_cached() -> Result<()> {
        let mock = MockTransport::new();
        mock.push_ok("<html>one</html>");
        let transport = CachedTransport::new(Box::new(mock.clone()), Box::new(MemoryCache::new()));
        let target = url("https://scholar.google.com/scholar?q=a");

        let first = transport.get(&target, None).await?;
        let second = transport.get(&target, None).await?;

        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(second.body, "<html>one</html>");
        assert_eq!(mock.calls(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_clear_forces_network_fetch() -> Result<()> {
        let mock = MockTransport::new();
        mock.push_ok("<html>one</html>");
        mock.push_ok("<html>two</html>");
        let transport = CachedTransport::new(Box::new(mock.clone()), Box::new(MemoryCache::new()));
        let target = url("https://scholar.google.com/scholar?q=a");

        transport.get(&target, None).await?;
        assert_eq!(mock.calls(), 1);

        transport.get(&target, None).await?;
        assert_eq!(mock.calls(), 1);

        transport.clear()?;
        let page = transport.get(&target, None).await?;
        assert_eq!(mock.calls(), 2);
        assert_eq!(page.body, "<html>two</html>");
        Ok(())
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() -> Result<()> {
        let mock = MockTransport::new();
        mock.push(503, "unavailable");
        mock.push_ok("<html>ok</html>");
        let transport = CachedTransport::new(Box::new(mock.clone()), Box::new(MemoryCache::new()));
        let target = url("https://scholar.google.com/scholar?q=a");

        assert_eq!(transport.get(&target, None).await?.status, 503);
        assert_eq!(transport.get(&target, None).await?.status, 200);
        assert_eq!(mock.calls(), 2);
        Ok(())
    }
}

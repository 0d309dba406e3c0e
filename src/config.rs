//! Crawler configuration.
//!
//! Defaults match Google Scholar. A JSON file can override any field; the
//! binary then applies command-line flags on top.

use crate::error::{CrawlError, Result};
use crate::model::SortOrder;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default Google Scholar URL
pub const DEFAULT_SCHOLAR_URL: &str = "https://scholar.google.com";

/// User agent string for requests
pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// What to do when the seed article has no citation count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownTotalPolicy {
    /// Fetch page 0 only
    SinglePage,
    /// Keep going until `max_pages` or an empty page
    #[default]
    CrawlToCap,
}

/// Settings shared by the session, transport and crawl controller
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Scholar base URL (mirror sites allowed)
    pub base_url: String,
    pub user_agent: String,
    /// Name of the session cookie carrying the challenge token
    pub cookie_name: String,
    /// Body substrings that mark a robot-check page
    pub block_markers: Vec<String>,
    /// Results per citation page
    pub page_size: usize,
    /// Hard cap on pages fetched per crawl
    pub max_pages: usize,
    pub sort_order: SortOrder,
    pub unknown_total: UnknownTotalPolicy,
    pub challenge_timeout_secs: u64,
    /// Upper bound of the random delay before each network fetch, 0 disables
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Response cache directory, `None` uses the platform cache dir
    pub cache_dir: Option<PathBuf>,
    /// Cache entry lifetime, `None` keeps entries until cleared
    pub cache_ttl_secs: Option<u64>,
    /// Directory for CSV exports
    pub output_dir: PathBuf,
    /// Where a page that parsed to zero records is written
    pub debug_dump: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_SCHOLAR_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            cookie_name: "GSP".to_string(),
            block_markers: vec!["not a robot".to_string(), "unusual traffic".to_string()],
            page_size: 10,
            max_pages: 50,
            sort_order: SortOrder::Descending,
            unknown_total: UnknownTotalPolicy::CrawlToCap,
            challenge_timeout_secs: 300,
            request_delay_ms: 1500,
            request_timeout_secs: 30,
            cache_dir: None,
            cache_ttl_secs: None,
            output_dir: PathBuf::from("./output"),
            debug_dump: Some(PathBuf::from("debug_citecrawl.html")),
        }
    }
}

impl CrawlConfig {
    /// Load a config file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CrawlConfig = serde_json::from_str(&content)?;
        config.validate()?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the crawl loop cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(CrawlError::Config("page_size must be positive".to_string()));
        }
        if self.max_pages == 0 {
            return Err(CrawlError::Config("max_pages must be positive".to_string()));
        }
        if self.cookie_name.trim().is_empty() {
            return Err(CrawlError::Config("cookie_name must not be empty".to_string()));
        }
        url::Url::parse(&self.base_url)
            .map_err(|e| CrawlError::Config(format!("Invalid base URL '{}': {}", self.base_url, e)))?;
        Ok(())
    }

    pub fn challenge_timeout(&self) -> Duration {
        Duration::from_secs(self.challenge_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        self.cache_ttl_secs.map(Duration::from_secs)
    }

    /// Base URL without a trailing slash
    pub fn scholar_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_are_valid() -> Result<()> {
        let config = CrawlConfig::default();
        config.validate()?;
        assert_eq!(config.page_size, 10);
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.sort_order, SortOrder::Descending);
        Ok(())
    }

    #[test]
    fn test_partial_file_keeps_defaults() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"max_pages": 5, "sort_order": "ascending", "unknown_total": "single_page"}}"#
        )?;

        let config = CrawlConfig::from_file(file.path())?;
        assert_eq!(config.max_pages, 5);
        assert_eq!(config.sort_order, SortOrder::Ascending);
        assert_eq!(config.unknown_total, UnknownTotalPolicy::SinglePage);
        assert_eq!(config.cookie_name, "GSP");
        Ok(())
    }

    #[test]
    fn test_rejects_zero_page_size() {
        let config = CrawlConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(CrawlError::Config(_))));
    }
}

//! Cookie jar for challenge tokens.
//!
//! A solved challenge yields a session cookie. It is kept in a small JSON
//! file so the next run can reuse it until Scholar rejects it again.

use crate::error::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Domain recorded for cookies entered by hand
pub const SCHOLAR_DOMAIN: &str = ".scholar.google.com";

/// Default cookie file path: `~/.citecrawl_cookies.json`
fn default_cookie_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".citecrawl_cookies.json"))
        .ok_or_else(|| CrawlError::Config("Cannot determine home directory".to_string()))
}

/// Cookie entry in the browser export format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub expires: Option<f64>,
}

impl Cookie {
    /// Session cookie for the Scholar domain
    pub fn session(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            domain: SCHOLAR_DOMAIN.to_string(),
            path: "/".to_string(),
            secure: true,
            http_only: false,
            expires: None,
        }
    }
}

/// Loads and saves the cookie jar
#[derive(Debug, Clone)]
pub struct CookieManager {
    path: PathBuf,
}

impl CookieManager {
    /// Create a new CookieManager with default path
    pub fn new() -> Result<Self> {
        Ok(Self {
            path: default_cookie_path()?,
        })
    }

    /// Create a new CookieManager with custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the cookie file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load cookies from file
    ///
    /// Returns empty vec if file doesn't exist or is invalid
    pub fn load(&self) -> Vec<Cookie> {
        if !self.path.exists() {
            debug!("Cookie file not found: {:?}", self.path);
            return Vec::new();
        }

        match std::fs::read_to_string(&self.path) {
            Ok(content) => match serde_json::from_str::<Vec<Cookie>>(&content) {
                Ok(cookies) => {
                    debug!("Loaded {} cookies from {:?}", cookies.len(), self.path);
                    cookies
                }
                Err(e) => {
                    warn!("Failed to parse cookies: {}", e);
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Failed to read cookie file: {}", e);
                Vec::new()
            }
        }
    }

    /// Value of the first stored cookie called `name`
    pub fn token(&self, name: &str) -> Option<String> {
        self.load()
            .into_iter()
            .find(|c| c.name == name && !c.value.is_empty())
            .map(|c| c.value)
    }

    /// Save cookies to file
    pub fn save(&self, cookies: &[Cookie]) -> Result<()> {
        let content = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&self.path, content)?;
        info!("Saved {} cookies to {:?}", cookies.len(), self.path);
        Ok(())
    }

    /// Replace (or add) one cookie, keeping the others.
    pub fn store(&self, cookie: Cookie) -> Result<()> {
        let mut cookies: Vec<Cookie> = self
            .load()
            .into_iter()
            .filter(|c| c.name != cookie.name)
            .collect();
        cookies.push(cookie);
        self.save(&cookies)
    }

    /// Clear stored cookies
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared cookies at {:?}", self.path);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_empty() {
        let manager = CookieManager::with_path(PathBuf::from("/nonexistent/path"));
        assert!(manager.load().is_empty());
        assert!(manager.token("GSP").is_none());
    }

    #[test]
    fn test_store_replaces_same_name() -> Result<()> {
        let dir = tempdir()?;
        let manager = CookieManager::with_path(dir.path().join("cookies.json"));

        manager.save(&[Cookie::session("NID", "nid-value")])?;
        manager.store(Cookie::session("GSP", "first"))?;
        manager.store(Cookie::session("GSP", "second"))?;

        let loaded = manager.load();
        assert_eq!(loaded.len(), 2);
        assert_eq!(manager.token("GSP").as_deref(), Some("second"));
        assert_eq!(manager.token("NID").as_deref(), Some("nid-value"));
        Ok(())
    }

    #[test]
    fn test_browser_export_format() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("cookies.json");
        std::fs::write(
            &path,
            r#"[{"name":"GSP","value":"LM=1:S=abc","domain":".scholar.google.com"}]"#,
        )?;

        let manager = CookieManager::with_path(path);
        assert_eq!(manager.token("GSP").as_deref(), Some("LM=1:S=abc"));

        manager.clear()?;
        assert!(manager.load().is_empty());
        Ok(())
    }
}

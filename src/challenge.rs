//! Challenge-token providers.
//!
//! Scholar only serves result pages to sessions that passed its robot check.
//! The check itself is solved by a human in a real browser; a solver hands
//! back the resulting session cookie value.

use crate::cookies::{Cookie, CookieManager};
use crate::error::{CrawlError, Result};
use crate::prompt;
use async_trait::async_trait;
use tracing::{info, warn};

/// Produces a session token after a human passes the challenge.
#[async_trait]
pub trait ChallengeSolver: Send {
    /// Block until a token is available. Fails with `NoToken` when the
    /// interaction finished without a usable cookie.
    async fn solve(&mut self) -> Result<String>;
}

/// Reads the token from the cookie jar only.
pub struct StoredCookieSolver {
    cookies: CookieManager,
    cookie_name: String,
}

impl StoredCookieSolver {
    pub fn new(cookies: CookieManager, cookie_name: &str) -> Self {
        Self {
            cookies,
            cookie_name: cookie_name.to_string(),
        }
    }
}

#[async_trait]
impl ChallengeSolver for StoredCookieSolver {
    async fn solve(&mut self) -> Result<String> {
        self.cookies
            .token(&self.cookie_name)
            .ok_or_else(|| CrawlError::NoToken(self.cookie_name.clone()))
    }
}

/// Asks the user to pass the check in their browser and paste the cookie.
///
/// The first call reuses a stored cookie when there is one. Later calls mean
/// Scholar rejected the token, so they always go back to the user.
pub struct InteractiveSolver {
    cookies: CookieManager,
    cookie_name: String,
    scholar_url: String,
    reuse_stored: bool,
}

impl InteractiveSolver {
    pub fn new(cookies: CookieManager, cookie_name: &str, scholar_url: &str) -> Self {
        Self {
            cookies,
            cookie_name: cookie_name.to_string(),
            scholar_url: scholar_url.to_string(),
            reuse_stored: true,
        }
    }

    fn print_instructions(&self) {
        println!();
        println!("=== Robot check required ===");
        println!("1. Open {}/scholar?q=quasi-newton+optimization in your browser", self.scholar_url);
        println!("2. Complete the \"I'm not a robot\" check");
        println!("3. Open Developer Tools -> Application -> Cookies -> {}", self.scholar_url);
        println!("4. Copy the value of the '{}' cookie", self.cookie_name);
        println!();
        println!("Paste the value, '{}=<value>', or a JSON cookie export below:", self.cookie_name);
    }
}

#[async_trait]
impl ChallengeSolver for InteractiveSolver {
    async fn solve(&mut self) -> Result<String> {
        if self.reuse_stored {
            self.reuse_stored = false;
            if let Some(token) = self.cookies.token(&self.cookie_name) {
                info!("Using stored {} cookie from {:?}", self.cookie_name, self.cookies.path());
                return Ok(token);
            }
        }

        self.print_instructions();
        let input = prompt::read_line("> ")
            .await?
            .ok_or(CrawlError::Interrupted)?;

        let token = extract_token(&input, &self.cookie_name)
            .ok_or_else(|| CrawlError::NoToken(self.cookie_name.clone()))?;

        info!("Found {} cookie", self.cookie_name);
        if let Err(e) = self.cookies.store(Cookie::session(&self.cookie_name, &token)) {
            warn!("Failed to save cookie: {}", e);
        }
        Ok(token)
    }
}

/// Pull the named cookie out of pasted text.
///
/// Accepts a bare value, `NAME=value` (optionally inside a full `Cookie:`
/// header), or a JSON array in the browser export format.
pub fn extract_token(input: &str, cookie_name: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if input.starts_with('[') {
        return serde_json::from_str::<Vec<Cookie>>(input)
            .ok()?
            .into_iter()
            .find(|c| c.name == cookie_name && !c.value.is_empty())
            .map(|c| c.value);
    }

    let header = input.strip_prefix("Cookie:").unwrap_or(input).trim();
    let prefix = format!("{}=", cookie_name);
    for pair in header.split(';').map(str::trim) {
        if let Some(value) = pair.strip_prefix(&prefix) {
            return Some(value.to_string()).filter(|v| !v.is_empty());
        }
    }

    // A cookie header without the one we need
    if header.contains(';') {
        return None;
    }

    Some(header.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_extract_bare_value() {
        assert_eq!(extract_token("  LM=1700000000:S=abc  ", "GSP").as_deref(), Some("LM=1700000000:S=abc"));
        assert_eq!(extract_token("", "GSP"), None);
    }

    #[test]
    fn test_extract_named_pair() {
        assert_eq!(extract_token("GSP=xyz", "GSP").as_deref(), Some("xyz"));
        assert_eq!(
            extract_token("Cookie: NID=1; GSP=LM=1:S=q; SID=2", "GSP").as_deref(),
            Some("LM=1:S=q")
        );
        assert_eq!(extract_token("NID=1; SID=2", "GSP"), None);
    }

    #[test]
    fn test_extract_json_export() {
        let json = r#"[{"name":"NID","value":"n"},{"name":"GSP","value":"tok"}]"#;
        assert_eq!(extract_token(json, "GSP").as_deref(), Some("tok"));
        assert_eq!(extract_token(r#"[{"name":"NID","value":"n"}]"#, "GSP"), None);
    }

    #[tokio::test]
    async fn test_stored_solver() -> Result<()> {
        let dir = tempdir()?;
        let jar = CookieManager::with_path(dir.path().join("cookies.json"));
        let mut solver = StoredCookieSolver::new(jar.clone(), "GSP");

        assert!(matches!(solver.solve().await, Err(CrawlError::NoToken(_))));

        jar.store(Cookie::session("GSP", "saved"))?;
        assert_eq!(solver.solve().await?, "saved");
        Ok(())
    }

    #[tokio::test]
    async fn test_interactive_solver_reuses_stored_once() -> Result<()> {
        let dir = tempdir()?;
        let jar = CookieManager::with_path(dir.path().join("cookies.json"));
        jar.store(Cookie::session("GSP", "saved"))?;

        let mut solver = InteractiveSolver::new(jar, "GSP", "https://scholar.google.com");
        assert_eq!(solver.solve().await?, "saved");
        assert!(!solver.reuse_stored);
        Ok(())
    }
}

//! Authenticated session handling.
//!
//! The session owns the current challenge token and sends it as a cookie on
//! every request. When Scholar answers with its robot check the token is
//! replaced and the request retried once.

use crate::challenge::ChallengeSolver;
use crate::config::CrawlConfig;
use crate::error::{CrawlError, Result};
use crate::parser::{selector, RESULT_CARD};
use crate::transport::{CachedTransport, FetchedPage};
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Challenge token plus the moment it was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    value: String,
    acquired_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(value: String) -> Self {
        Self {
            value,
            acquired_at: Utc::now(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

/// Issues authenticated GETs and re-authenticates on block pages
pub struct SessionManager {
    solver: Box<dyn ChallengeSolver>,
    transport: CachedTransport,
    token: Option<SessionToken>,
    cookie_name: String,
    block_markers: Vec<String>,
    result_card: Selector,
    challenge_timeout: Duration,
}

impl SessionManager {
    pub fn new(solver: Box<dyn ChallengeSolver>, transport: CachedTransport, config: &CrawlConfig) -> Result<Self> {
        Ok(Self {
            solver,
            transport,
            token: None,
            cookie_name: config.cookie_name.clone(),
            block_markers: config.block_markers.clone(),
            result_card: selector(RESULT_CARD)?,
            challenge_timeout: config.challenge_timeout(),
        })
    }

    /// Override the challenge timeout from the config.
    pub fn with_challenge_timeout(mut self, timeout: Duration) -> Self {
        self.challenge_timeout = timeout;
        self
    }

    /// Currently held token, if any
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Run the challenge and replace the held token.
    ///
    /// # Errors
    ///
    /// `Authentication` if no token came back or the challenge did not finish
    /// in time, `Interrupted` if the user gave up.
    pub async fn acquire(&mut self) -> Result<&SessionToken> {
        info!(cookie = %self.cookie_name, "Acquiring session token");

        let value = match tokio::time::timeout(self.challenge_timeout, self.solver.solve()).await {
            Ok(Ok(value)) => value,
            Ok(Err(CrawlError::NoToken(name))) => {
                return Err(CrawlError::Authentication(format!(
                    "no '{}' cookie found after the challenge",
                    name
                )));
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                return Err(CrawlError::Authentication(format!(
                    "challenge was not solved within {}s",
                    self.challenge_timeout.as_secs()
                )));
            }
        };

        let value = value.trim().to_string();
        if value.is_empty() {
            return Err(CrawlError::Authentication("challenge returned an empty token".to_string()));
        }

        info!("Session token acquired");
        let token = self.token.insert(SessionToken::new(value));
        Ok(&*token)
    }

    /// Whether `page` is Scholar's robot check rather than real results.
    ///
    /// A marker only counts on a page without result cards; titles and
    /// snippets can mention "unusual traffic" too.
    pub fn is_blocked(&self, page: &FetchedPage) -> bool {
        let marked = self
            .block_markers
            .iter()
            .any(|marker| page.body.contains(marker.as_str()));
        marked
            && Html::parse_document(&page.body)
                .select(&self.result_card)
                .next()
                .is_none()
    }

    /// Authenticated GET with one re-authentication retry.
    ///
    /// At most two fetches are issued. A page that is still blocked after the
    /// retry is returned as-is; callers that care must inspect it.
    pub async fn get(&mut self, url: &Url) -> Result<FetchedPage> {
        if self.token.is_none() {
            self.acquire().await?;
        }

        let page = self.transport.get(url, self.cookie_header().as_deref()).await?;
        if !self.is_blocked(&page) {
            return Ok(page);
        }

        warn!(url = %url, cached = page.from_cache, "Robot check detected, refreshing token");
        self.transport.evict(url)?;
        self.acquire().await?;

        let retry = self.transport.get(url, self.cookie_header().as_deref()).await?;
        if self.is_blocked(&retry) {
            warn!(url = %url, "Still blocked after re-authentication");
            self.transport.evict(url)?;
        } else {
            debug!(url = %url, "Retry succeeded");
        }
        Ok(retry)
    }

    /// Drop every cached response
    pub fn clear_cache(&self) -> Result<()> {
        self.transport.clear()
    }

    fn cookie_header(&self) -> Option<String> {
        self.token
            .as_ref()
            .map(|t| format!("{}={}", self.cookie_name, t.value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::mock::{MockTransport, PendingSolver, StaticSolver};

    const BLOCKED: &str = "<html>Please show you're not a robot</html>";

    fn target() -> Url {
        Url::parse("https://scholar.google.com/scholar?cites=1&start=0").expect("valid test url")
    }

    fn session(mock: &MockTransport, solver: StaticSolver) -> SessionManager {
        let transport = CachedTransport::new(Box::new(mock.clone()), Box::new(MemoryCache::new()));
        SessionManager::new(Box::new(solver), transport, &CrawlConfig::default()).expect("valid session")
    }

    #[tokio::test]
    async fn test_acquires_token_lazily() -> Result<()> {
        let mock = MockTransport::new();
        mock.push_ok("<html>results</html>");
        let solver = StaticSolver::new(["tok1"]);
        let mut session = session(&mock, solver.clone());

        assert!(session.token().is_none());
        let page = session.get(&target()).await?;

        assert_eq!(page.body, "<html>results</html>");
        assert_eq!(solver.calls(), 1);
        assert_eq!(mock.calls(), 1);
        assert_eq!(mock.cookies(), vec![Some("GSP=tok1".to_string())]);
        Ok(())
    }

    #[tokio::test]
    async fn test_block_triggers_one_retry_with_new_token() -> Result<()> {
        let mock = MockTransport::new();
        mock.push_ok(BLOCKED);
        mock.push_ok("<html>results</html>");
        let solver = StaticSolver::new(["old", "new"]);
        let mut session = session(&mock, solver.clone());

        let page = session.get(&target()).await?;

        assert_eq!(page.body, "<html>results</html>");
        assert_eq!(mock.calls(), 2);
        assert_eq!(solver.calls(), 2);
        assert_eq!(
            mock.cookies(),
            vec![Some("GSP=old".to_string()), Some("GSP=new".to_string())]
        );
        assert_eq!(session.token().map(SessionToken::value), Some("new"));

        // The good page is what stays cached
        let again = session.get(&target()).await?;
        assert!(again.from_cache);
        assert_eq!(mock.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_persistent_block_is_returned_after_two_fetches() -> Result<()> {
        let mock = MockTransport::new();
        mock.push_ok(BLOCKED);
        mock.push_ok(BLOCKED);
        mock.push_ok("<html>never fetched</html>");
        let solver = StaticSolver::new(["a", "b", "c"]);
        let mut session = session(&mock, solver.clone());

        let page = session.get(&target()).await?;

        assert!(session.is_blocked(&page));
        assert_eq!(mock.calls(), 2);
        assert_eq!(solver.calls(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_token_is_authentication_error() {
        let mock = MockTransport::new();
        let mut session = session(&mock, StaticSolver::new(Vec::<String>::new()));

        let result = session.get(&target()).await;
        assert!(matches!(result, Err(CrawlError::Authentication(_))));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_token_is_rejected() {
        let mock = MockTransport::new();
        let mut session = session(&mock, StaticSolver::new(["   "]));
        assert!(matches!(session.acquire().await, Err(CrawlError::Authentication(_))));
    }

    #[tokio::test]
    async fn test_challenge_timeout() {
        let mock = MockTransport::new();
        let transport = CachedTransport::new(Box::new(mock), Box::new(MemoryCache::new()));
        let mut session = SessionManager::new(Box::new(PendingSolver), transport, &CrawlConfig::default())
            .expect("valid session")
            .with_challenge_timeout(Duration::from_millis(20));

        match session.acquire().await {
            Err(CrawlError::Authentication(msg)) => assert!(msg.contains("not solved")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_marker_in_result_card_is_not_a_block() -> Result<()> {
        let page = crate::mock::results_page(&[(
            "Detecting unusual traffic in backbone networks",
            "A Author - 2019",
            Some(("/scholar?cites=77", 4)),
        )]);
        let mock = MockTransport::new();
        mock.push_ok(&page);
        let solver = StaticSolver::new(["tok"]);
        let mut session = session(&mock, solver.clone());

        let first = session.get(&target()).await?;
        assert!(!session.is_blocked(&first));

        let again = session.get(&target()).await?;
        assert!(again.from_cache);
        assert_eq!(mock.calls(), 1);
        assert_eq!(solver.calls(), 1);
        Ok(())
    }
}

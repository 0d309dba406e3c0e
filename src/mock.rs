//! Scripted transport and solver for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use url::Url;

use crate::challenge::ChallengeSolver;
use crate::error::{CrawlError, Result};
use crate::transport::{FetchedPage, Transport};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct TransportState {
    responses: VecDeque<(u16, String)>,
    requests: Vec<(String, Option<String>)>,
}

/// A transport that replays queued responses in order and records each request.
///
/// Clones share state, so a test can keep a handle after boxing one copy.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response with the given status.
    pub fn push(&self, status: u16, body: &str) {
        lock(&self.state).responses.push_back((status, body.to_string()));
    }

    /// Queue a 200 response.
    pub fn push_ok(&self, body: &str) {
        self.push(200, body);
    }

    /// Number of fetches issued so far
    pub fn calls(&self) -> usize {
        lock(&self.state).requests.len()
    }

    /// Requested URLs in order
    pub fn urls(&self) -> Vec<String> {
        lock(&self.state).requests.iter().map(|(u, _)| u.clone()).collect()
    }

    /// Cookie header sent with each request
    pub fn cookies(&self) -> Vec<Option<String>> {
        lock(&self.state).requests.iter().map(|(_, c)| c.clone()).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn fetch(&self, url: &Url, cookie: Option<&str>) -> Result<FetchedPage> {
        let mut state = lock(&self.state);
        state
            .requests
            .push((url.to_string(), cookie.map(str::to_string)));
        let (status, body) = state
            .responses
            .pop_front()
            .unwrap_or_else(|| (404, "no scripted response".to_string()));
        Ok(FetchedPage::new(url.as_str(), status, &body))
    }
}

#[derive(Debug, Default)]
struct SolverState {
    tokens: VecDeque<String>,
    calls: usize,
}

/// A solver that hands out queued tokens, then fails with `NoToken`.
#[derive(Debug, Clone, Default)]
pub struct StaticSolver {
    state: Arc<Mutex<SolverState>>,
}

impl StaticSolver {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let solver = Self::default();
        lock(&solver.state).tokens = tokens.into_iter().map(Into::into).collect();
        solver
    }

    /// Number of `solve` calls so far
    pub fn calls(&self) -> usize {
        lock(&self.state).calls
    }
}

#[async_trait]
impl ChallengeSolver for StaticSolver {
    async fn solve(&mut self) -> Result<String> {
        let mut state = lock(&self.state);
        state.calls += 1;
        state
            .tokens
            .pop_front()
            .ok_or_else(|| CrawlError::NoToken("GSP".to_string()))
    }
}

/// A solver that never finishes, for timeout tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingSolver;

#[async_trait]
impl ChallengeSolver for PendingSolver {
    async fn solve(&mut self) -> Result<String> {
        std::future::pending::<()>().await;
        Err(CrawlError::Interrupted)
    }
}

/// Result-page HTML with one card per `(title, author, cited_by)` entry.
///
/// `cited_by` is `(href, count)`; `None` leaves the card without a "Cited by" link.
pub fn results_page(cards: &[(&str, &str, Option<(&str, u32)>)]) -> String {
    let mut html = String::from("<html><body><div id=\"gs_res_ccl_mid\">");
    for (title, author, cited_by) in cards {
        html.push_str("<div class=\"gs_r gs_or gs_scl\"><div class=\"gs_ri\">");
        html.push_str(&format!(
            "<h3 class=\"gs_rt\"><span class=\"gs_ctg2\">[PDF]</span> <a href=\"https://example.org/{0}\">{0}</a></h3>",
            title
        ));
        html.push_str(&format!("<div class=\"gs_a\">{}</div>", author));
        html.push_str("<div class=\"gs_fl gs_flb\"><a href=\"#\">Save</a> <a href=\"#\">Cite</a> ");
        if let Some((href, count)) = cited_by {
            html.push_str(&format!("<a href=\"{}\">Cited by {}</a> ", href.replace('&', "&amp;"), count));
        }
        html.push_str("<a href=\"/scholar?q=related:x\">Related articles</a></div>");
        html.push_str("</div></div>");
    }
    html.push_str("</div></body></html>");
    html
}

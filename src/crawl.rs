//! Citation-graph crawl controller.
//!
//! Drives search → select → paginate → export. A `Crawl` holds the state of
//! one traversal; the controller fetches and parses pages into it and decides
//! when the citation count says there is nothing left to fetch.

use crate::config::{CrawlConfig, UnknownTotalPolicy};
use crate::error::{CrawlError, Result};
use crate::export;
use crate::model::{Article, CitationCount};
use crate::parser::ResultPageParser;
use crate::session::SessionManager;
use crate::transport::FetchedPage;
use std::path::Path;
use tracing::{debug, info, warn};
use url::Url;

/// What the user typed at the search prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Free-text search
    Search(String),
    /// An already-known "Cited by" reference; skips search and selection
    Citations(String),
}

impl Query {
    /// Classify user input. Blank input gives `None`.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if is_citation_reference(input) {
            Some(Query::Citations(input.to_string()))
        } else {
            Some(Query::Search(input.to_string()))
        }
    }
}

/// `/scholar?cites=...` or a full URL carrying `cites=`
fn is_citation_reference(input: &str) -> bool {
    input.contains("cites=")
        && (input.starts_with('/') || input.starts_with("http://") || input.starts_with("https://"))
}

/// Where the controller is in the search → crawl flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Searching,
    Selecting,
    Crawling,
    Exporting,
    Done,
}

/// State of one citation traversal
#[derive(Debug, Clone)]
pub struct Crawl {
    seed: Article,
    reference: String,
    expected_total: CitationCount,
    next_page: usize,
    accumulated: Vec<Article>,
    finished: bool,
}

impl Crawl {
    fn new(seed: Article, reference: String) -> Self {
        Self {
            expected_total: seed.citations,
            seed,
            reference,
            next_page: 0,
            accumulated: Vec::new(),
            finished: false,
        }
    }

    pub fn seed(&self) -> &Article {
        &self.seed
    }

    /// Reference being traversed
    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn expected_total(&self) -> CitationCount {
        self.expected_total
    }

    pub fn pages_fetched(&self) -> usize {
        self.next_page
    }

    /// Every citation collected so far, in the configured sort order
    pub fn accumulated(&self) -> &[Article] {
        &self.accumulated
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// Outcome of one `next_page` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageReport {
    /// Zero-based index of the page just fetched
    pub page: usize,
    /// Records found on that page
    pub fetched: usize,
    /// Records accumulated so far
    pub total: usize,
    /// Whether another page should exist
    pub more_pages: bool,
}

impl PageReport {
    /// The page parsed to zero records
    pub fn is_empty(&self) -> bool {
        self.fetched == 0
    }
}

/// Runs searches and citation crawls over an authenticated session
pub struct CrawlController {
    session: SessionManager,
    parser: ResultPageParser,
    config: CrawlConfig,
    phase: Phase,
}

impl CrawlController {
    pub fn new(session: SessionManager, config: CrawlConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            session,
            parser: ResultPageParser::new()?,
            config,
            phase: Phase::Idle,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Drop cached responses
    pub fn clear_cache(&self) -> Result<()> {
        self.session.clear_cache()
    }

    /// Back to `Idle`, ready for the next query
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
    }

    /// Search URL: `/scholar?q=<query>&hl=en&as_vis=1`
    pub fn search_url(&self, query: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/scholar", self.config.scholar_url()))?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("hl", "en")
            .append_pair("as_vis", "1");
        Ok(url)
    }

    /// URL of citation page `page` for `reference`.
    ///
    /// A reference that already carries `start` is used verbatim for page 0
    /// and has its offset advanced for later pages.
    pub fn citation_url(&self, reference: &str, page: usize) -> Result<Url> {
        let base = Url::parse(&format!("{}/", self.config.scholar_url()))?;
        let mut url = base.join(reference)?;
        let offset = page * self.config.page_size;

        let existing_start = url
            .query_pairs()
            .find(|(k, _)| k == "start")
            .map(|(_, v)| v.parse::<usize>().unwrap_or(0));

        match existing_start {
            Some(_) if page == 0 => {}
            Some(start) => {
                // Rewrite only the start pair; the rest keeps its original encoding
                let query: Vec<String> = url
                    .query()
                    .unwrap_or_default()
                    .split('&')
                    .map(|pair| {
                        if pair.split('=').next() == Some("start") {
                            format!("start={}", start + offset)
                        } else {
                            pair.to_string()
                        }
                    })
                    .collect();
                url.set_query(Some(&query.join("&")));
            }
            None => {
                url.query_pairs_mut().append_pair("start", &offset.to_string());
            }
        }
        Ok(url)
    }

    /// Fetch and parse one search page.
    ///
    /// # Errors
    ///
    /// `Search` on a non-success status, `EmptyResult` when no cards were
    /// found, `Authentication` when Scholar is still showing its robot check.
    pub async fn search(&mut self, query: &str) -> Result<Vec<Article>> {
        self.phase = Phase::Searching;
        let url = self.search_url(query)?;
        info!(query, url = %url, "Searching");

        let result = self.fetch_search(query, &url).await;
        self.phase = if result.is_ok() { Phase::Selecting } else { Phase::Idle };
        result
    }

    async fn fetch_search(&mut self, query: &str, url: &Url) -> Result<Vec<Article>> {
        let page = self.session.get(url).await?;
        if !page.is_success() {
            return Err(CrawlError::Search {
                query: query.to_string(),
                status: page.status,
            });
        }

        let articles = self.parser.parse(&page.body);
        if articles.is_empty() {
            self.inspect_empty(&page)?;
            return Err(CrawlError::EmptyResult { url: url.to_string() });
        }

        info!(count = articles.len(), "Search complete");
        Ok(articles)
    }

    /// Start crawling the citations of `candidates[index]`.
    pub fn select(&mut self, candidates: &[Article], index: usize) -> Result<Crawl> {
        let article = candidates.get(index).ok_or_else(|| {
            CrawlError::Selection(format!(
                "{} is out of range (0-{})",
                index,
                candidates.len().saturating_sub(1)
            ))
        })?;

        let reference = article.cited_by.clone().ok_or_else(|| {
            CrawlError::Selection(format!("\"{}\" has no citations to follow", article.title))
        })?;

        info!(title = %article.title, reference = %reference, "Selected article");
        self.phase = Phase::Crawling;
        Ok(Crawl::new(article.clone(), reference))
    }

    /// Start crawling from a known reference, skipping search.
    pub fn seed(&mut self, reference: &str) -> Crawl {
        info!(reference, "Seeding crawl from reference");
        self.phase = Phase::Crawling;
        Crawl::new(Article::seeded(reference), reference.to_string())
    }

    /// Fetch the next citation page into `crawl`.
    ///
    /// A fetch failure finishes the crawl and is returned. An empty page is
    /// reported through `PageReport::is_empty` and dumped for inspection.
    pub async fn next_page(&mut self, crawl: &mut Crawl) -> Result<PageReport> {
        if crawl.finished {
            return Err(CrawlError::CrawlFinished);
        }

        let page_index = crawl.next_page;
        let url = self.citation_url(&crawl.reference, page_index)?;
        debug!(page = page_index, url = %url, "Fetching citation page");

        let records = match self.fetch_citations(&url).await {
            Ok(records) => records,
            Err(e) => {
                self.finish(crawl);
                return Err(e);
            }
        };

        let fetched = records.len();
        crawl.accumulated.extend(records);
        self.config.sort_order.sort(&mut crawl.accumulated);
        crawl.next_page += 1;

        let more_pages = !self.is_last_page(crawl.expected_total, page_index, fetched == 0);
        if !more_pages {
            info!(pages = crawl.next_page, total = crawl.accumulated.len(), "No more pages");
            crawl.finished = true;
        }

        Ok(PageReport {
            page: page_index,
            fetched,
            total: crawl.accumulated.len(),
            more_pages,
        })
    }

    async fn fetch_citations(&mut self, url: &Url) -> Result<Vec<Article>> {
        let page = self.session.get(url).await?;
        if !page.is_success() {
            return Err(CrawlError::Fetch {
                status: page.status,
                url: url.to_string(),
            });
        }

        let records = self.parser.parse(&page.body);
        if records.is_empty() {
            self.inspect_empty(&page)?;
        }
        Ok(records)
    }

    /// Termination rule for the page just fetched.
    fn is_last_page(&self, expected: CitationCount, page: usize, empty: bool) -> bool {
        if page + 1 >= self.config.max_pages {
            return true;
        }
        match expected {
            CitationCount::Known(n) => page >= n as usize / self.config.page_size,
            CitationCount::Unknown => match self.config.unknown_total {
                UnknownTotalPolicy::SinglePage => true,
                UnknownTotalPolicy::CrawlToCap => empty,
            },
        }
    }

    /// Write the top `limit` citations (0 = all) to `path` and end the crawl.
    pub fn export(&mut self, crawl: &mut Crawl, limit: usize, path: &Path) -> Result<usize> {
        self.phase = Phase::Exporting;
        let result = export::write_csv(path, &crawl.accumulated, limit);
        self.finish(crawl);
        result
    }

    /// End the crawl without exporting.
    pub fn finish(&mut self, crawl: &mut Crawl) {
        crawl.finished = true;
        self.phase = Phase::Done;
    }

    /// Log a zero-record page and keep a copy for diagnosis. A page that is
    /// still the robot check becomes an authentication error.
    fn inspect_empty(&self, page: &FetchedPage) -> Result<()> {
        warn!(url = %page.url, cached = page.from_cache, "Page contained no results");

        if let Some(path) = &self.config.debug_dump {
            match std::fs::write(path, &page.body) {
                Ok(()) => info!("Debug HTML saved to: {:?}", path),
                Err(e) => warn!("Failed to write debug HTML: {}", e),
            }
        }

        if self.session.is_blocked(page) {
            return Err(CrawlError::Authentication(
                "Scholar is still showing a robot check".to_string(),
            ));
        }
        Ok(())
    }
}

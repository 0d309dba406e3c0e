//! # citecrawl
//!
//! Google Scholar citation-graph crawler.
//!
//! ## Modules
//!
//! - [`session`] - Challenge-token session with block detection and one retry
//! - [`parser`] - Result-page parsing into [`model::Article`] records
//! - [`crawl`] - Search, selection, pagination and termination
//! - [`transport`] / [`cache`] - HTTP fetching behind a response cache
//! - [`challenge`] / [`cookies`] - Token providers and the cookie jar
//! - [`export`] - CSV export
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use citecrawl::cache::{default_cache_dir, FileCache};
//! use citecrawl::challenge::StoredCookieSolver;
//! use citecrawl::config::CrawlConfig;
//! use citecrawl::cookies::CookieManager;
//! use citecrawl::crawl::CrawlController;
//! use citecrawl::session::SessionManager;
//! use citecrawl::transport::{CachedTransport, HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = CrawlConfig::default();
//!     let transport = CachedTransport::new(
//!         Box::new(HttpTransport::new(&config, None)?),
//!         Box::new(FileCache::new(default_cache_dir())),
//!     );
//!     let solver = StoredCookieSolver::new(CookieManager::new()?, &config.cookie_name);
//!     let session = SessionManager::new(Box::new(solver), transport, &config)?;
//!     let mut controller = CrawlController::new(session, config)?;
//!
//!     let results = controller.search("quasi-newton optimization").await?;
//!     let mut crawl = controller.select(&results, 0)?;
//!     while !crawl.is_finished() {
//!         controller.next_page(&mut crawl).await?;
//!     }
//!     println!("Collected {} citations", crawl.accumulated().len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod challenge;
pub mod config;
pub mod cookies;
pub mod crawl;
pub mod display;
pub mod error;
pub mod export;
pub mod mock;
pub mod model;
pub mod parser;
pub mod prompt;
pub mod session;
pub mod transport;

pub use error::{CrawlError, Result};

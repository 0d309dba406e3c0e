//! Custom error types for citecrawl.
//!
//! This module defines all error types used throughout the crawler.
//! All functions return `Result<T, CrawlError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for citecrawl operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Token acquisition failed, including a challenge that was not solved in time
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The challenge finished but the session cookie was not present
    #[error("No '{0}' cookie found after the challenge")]
    NoToken(String),

    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A page fetch returned a non-success status
    #[error("Failed to fetch {url}: HTTP {status}")]
    Fetch {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The search request returned a non-success status
    #[error("Failed to fetch results for query '{query}': HTTP {status}")]
    Search {
        /// Search query as typed
        query: String,
        /// HTTP status code
        status: u16,
    },

    /// A page parsed into zero records
    #[error("No results found on {url}")]
    EmptyResult {
        /// Requested URL
        url: String,
    },

    /// User-supplied index or count is out of range or not a number
    #[error("Invalid selection: {0}")]
    Selection(String),

    /// User cancelled the operation
    #[error("Interrupted")]
    Interrupted,

    /// `next_page` was called on a crawl that already terminated
    #[error("Crawl has already finished")]
    CrawlFinished,

    /// HTML parsing error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid URL or reference
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),
}

impl CrawlError {
    /// Whether the error ends the current user action but leaves the process usable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CrawlError::Interrupted)
    }
}

/// Result type alias using `CrawlError`
pub type Result<T> = std::result::Result<T, CrawlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_message() {
        let err = CrawlError::Fetch {
            status: 503,
            url: "https://scholar.google.com/scholar?cites=1".to_string(),
        };
        assert!(err.to_string().contains("HTTP 503"));
        assert!(err.is_recoverable());
        assert!(!CrawlError::Interrupted.is_recoverable());
    }
}

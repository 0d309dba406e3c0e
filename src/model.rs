//! Article records and citation ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Citation count as reported on a result card.
///
/// `Unknown` means the card had no "Cited by" link. It is ordered below every
/// known count, so descending sorts put it last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CitationCount {
    Known(u32),
    #[default]
    Unknown,
}

impl CitationCount {
    /// Known count, if any
    pub fn known(self) -> Option<u32> {
        match self {
            CitationCount::Known(n) => Some(n),
            CitationCount::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, CitationCount::Unknown)
    }
}

impl Ord for CitationCount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.known().cmp(&other.known())
    }
}

impl PartialOrd for CitationCount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for CitationCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CitationCount::Known(n) => write!(f, "{}", n),
            CitationCount::Unknown => f.write_str("unknown"),
        }
    }
}

/// A single search or citation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Article title
    pub title: String,
    /// Author and venue line
    pub author: String,
    /// Number of citations
    pub citations: CitationCount,
    /// Link that lists the works citing this article
    pub cited_by: Option<String>,
}

impl Article {
    /// Placeholder for a crawl that starts from a known cited-by reference.
    pub fn seeded(reference: &str) -> Self {
        Self {
            title: reference.to_string(),
            author: "(citation query)".to_string(),
            citations: CitationCount::Unknown,
            cited_by: Some(reference.to_string()),
        }
    }
}

/// Direction used when re-sorting accumulated citations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Stable sort by citation count in this direction.
    pub fn sort(self, articles: &mut [Article]) {
        match self {
            SortOrder::Ascending => articles.sort_by(|a, b| a.citations.cmp(&b.citations)),
            SortOrder::Descending => articles.sort_by(|a, b| b.citations.cmp(&a.citations)),
        }
    }
}

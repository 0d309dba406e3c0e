//! Result-page parsing.
//!
//! Search pages and "Cited by" pages share the same card layout, so one
//! parser serves both.

use crate::error::{CrawlError, Result};
use crate::model::{Article, CitationCount};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Turns Scholar result HTML into `Article` records
pub struct ResultPageParser {
    card: Selector,
    heading: Selector,
    heading_children: Selector,
    byline: Selector,
    link: Selector,
    trailing_count: Regex,
}

/// Selector for one result card
pub const RESULT_CARD: &str = "div.gs_r.gs_or.gs_scl";

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| CrawlError::Parse(format!("bad selector '{}': {}", css, e)))
}

impl ResultPageParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            card: selector(RESULT_CARD)?,
            heading: selector("h3")?,
            heading_children: selector("h3 > *")?,
            byline: selector(".gs_a")?,
            link: selector("a")?,
            trailing_count: Regex::new(r"(\d+)\s*$").map_err(|e| CrawlError::Parse(e.to_string()))?,
        })
    }

    /// Parse every result card, in document order.
    ///
    /// Zero records is not an error here; callers decide whether an empty
    /// page means "no results" or "something went wrong".
    pub fn parse(&self, html: &str) -> Vec<Article> {
        let document = Html::parse_document(html);
        let articles: Vec<Article> = document
            .select(&self.card)
            .map(|card| self.parse_card(card))
            .collect();
        debug!(count = articles.len(), "Parsed result cards");
        articles
    }

    fn parse_card(&self, card: ElementRef<'_>) -> Article {
        let (citations, cited_by) = self.cited_by(card);
        Article {
            title: self.title(card),
            author: self.author(card),
            citations,
            cited_by,
        }
    }

    /// Text of the last non-empty element inside the heading, so "[PDF]"
    /// and "[CITATION]" markers are skipped.
    fn title(&self, card: ElementRef<'_>) -> String {
        let from_children = card
            .select(&self.heading_children)
            .map(|el| normalize(&el.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .last();

        from_children
            .or_else(|| {
                card.select(&self.heading)
                    .next()
                    .map(|h| normalize(&h.text().collect::<String>()))
            })
            .unwrap_or_default()
    }

    fn author(&self, card: ElementRef<'_>) -> String {
        card.select(&self.byline)
            .next()
            .map(|el| normalize(&el.text().collect::<String>()))
            .unwrap_or_default()
    }

    /// First link whose text mentions "Cited by"
    fn cited_by(&self, card: ElementRef<'_>) -> (CitationCount, Option<String>) {
        for link in card.select(&self.link) {
            let text = normalize(&link.text().collect::<String>());
            if !text.contains("Cited by") {
                continue;
            }

            let href = link.value().attr("href").map(str::to_string);
            let count = self
                .trailing_count
                .captures(&text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .map(CitationCount::Known)
                .unwrap_or(CitationCount::Unknown);
            return (count, href);
        }
        (CitationCount::Unknown, None)
    }
}

/// Replace non-breaking spaces (decoded or left as a literal `\xa0`
/// escape) and collapse whitespace.
fn normalize(text: &str) -> String {
    text.replace("\\xa0", " ")
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

//! Terminal rendering for the interactive shell.

use crate::model::{Article, CitationCount};
use owo_colors::OwoColorize;

pub const BANNER: &str = r"
 ▗▄▄▖▗▄▄▄▖▗▄▄▄▖▗▄▄▄▖
▐▌     █    █  ▐▌
▐▌     █    █  ▐▛▀▀▘
▝▚▄▄▖▗▄█▄▖  █  ▐▙▄▄▖
";

/// Numbered title, green author line, then a yellow count or a red
/// "No citations reported".
pub fn render_article(index: usize, article: &Article) -> String {
    let citations = match article.citations {
        CitationCount::Known(n) => format!("{} citations", n).yellow().to_string(),
        CitationCount::Unknown => "No citations reported".red().to_string(),
    };
    format!(
        " {}. {}\n    {}\n    {}",
        index,
        article.title,
        article.author.green(),
        citations
    )
}

pub fn render_list(articles: &[Article]) -> String {
    articles
        .iter()
        .enumerate()
        .map(|(i, a)| render_article(i, a))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Summary printed after an article is chosen
pub fn render_selected(article: &Article) -> String {
    format!(
        "[Selected] \"{}\"\n\n-- Author: {}\n-- Cited by: {}\n-- Citations: {}",
        article.title,
        article.author,
        article.cited_by.as_deref().unwrap_or("-"),
        article.citations
    )
}

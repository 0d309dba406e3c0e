//! CSV export of accumulated citations.

use crate::error::Result;
use crate::model::{Article, SortOrder};
use chrono::Local;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// One exported row
#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    #[serde(rename = "Title")]
    title: &'a str,
    #[serde(rename = "Author")]
    author: &'a str,
    #[serde(rename = "Cited by")]
    cited_by: &'a str,
    #[serde(rename = "Citations")]
    citations: Option<u32>,
}

/// The `limit` most-cited articles, most-cited first. A limit of 0 keeps all.
pub fn top_cited(articles: &[Article], limit: usize) -> Vec<Article> {
    let mut sorted = articles.to_vec();
    SortOrder::Descending.sort(&mut sorted);
    if limit > 0 {
        sorted.truncate(limit);
    }
    sorted
}

/// Write the top `limit` articles to `path` as CSV and return the row count.
///
/// Rows go to a sibling temp file that is renamed into place, so an
/// interrupted export never leaves a partial file behind.
pub fn write_csv(path: &Path, articles: &[Article], limit: usize) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let rows = top_cited(articles, limit);
    let tmp = path.with_extension("csv.part");

    let written = (|| -> Result<()> {
        let mut wtr = csv::WriterBuilder::new().has_headers(true).from_path(&tmp)?;
        if rows.is_empty() {
            wtr.write_record(["Title", "Author", "Cited by", "Citations"])?;
        }
        for article in &rows {
            wtr.serialize(ExportRow {
                title: &article.title,
                author: &article.author,
                cited_by: article.cited_by.as_deref().unwrap_or(""),
                citations: article.citations.known(),
            })?;
        }
        wtr.flush()?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path)?;
    info!(path = %path.display(), rows = rows.len(), "Exported citations");
    Ok(rows.len())
}

/// `<output_dir>/<timestamp>_<slug>.csv` for an export of `title`'s citations
pub fn export_path(output_dir: &Path, title: &str) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let slug: String = title
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .take(60)
        .collect::<String>()
        .trim()
        .replace(' ', "_");
    let slug = if slug.is_empty() { "citations".to_string() } else { slug };
    output_dir.join(format!("{}_{}.csv", timestamp, slug))
}

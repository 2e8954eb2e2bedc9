// src/models/record.rs

//! Saved-article records read from a CSV export.

use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One saved article from the export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRecord {
    /// Article title; exports often leave it empty
    pub title: Option<String>,

    /// Saved URL
    pub url: String,

    /// When the article was saved (epoch seconds)
    pub time_added: i64,

    /// Tags, split from the comma-joined export field
    pub tags: Vec<String>,

    /// Export status label (e.g. "unread", "archive")
    pub status: String,
}

impl SourceRecord {
    /// Title to show for this record, falling back to the URL.
    pub fn display_title(&self) -> &str {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title,
            _ => &self.url,
        }
    }
}

/// Raw CSV row; every column is optional so sparse exports still load.
#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    time_added: Option<String>,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

impl CsvRow {
    fn into_record(self) -> Option<SourceRecord> {
        let url = self.url?.trim().to_string();
        if url.is_empty() {
            return None;
        }

        let title = self
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let time_added = self
            .time_added
            .as_deref()
            .and_then(parse_epoch)
            .unwrap_or(0);

        Some(SourceRecord {
            title,
            url,
            time_added,
            tags: self.tags.as_deref().map(split_tags).unwrap_or_default(),
            status: self.status.unwrap_or_default().trim().to_string(),
        })
    }
}

/// Parse an epoch timestamp that may be written as an integer or a float.
fn parse_epoch(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|f| f as i64))
}

/// Split a tag field on `,` or `|`, dropping blanks and duplicates.
pub fn split_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split([',', '|']).map(str::trim) {
        if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Read records from any CSV source with a header row.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<SourceRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let mut records = Vec::new();
    for (line, row) in csv_reader.deserialize::<CsvRow>().enumerate() {
        match row?.into_record() {
            Some(record) => records.push(record),
            None => log::warn!("Skipping CSV row {}: missing url", line + 2),
        }
    }
    Ok(records)
}

/// Load records from a CSV file.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<SourceRecord>> {
    let file = std::fs::File::open(path)?;
    read_records(file)
}

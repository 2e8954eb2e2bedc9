// src/models/note.rs

//! Output notes built from source records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::SourceRecord;

/// Longest title the ENEX format accepts.
pub const MAX_TITLE_GRAPHEMES: usize = 255;

/// Which extractor produced a note's body text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Lightweight,
    Browser,
}

/// Label embedded at the end of every scraped note body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MethodLabel {
    Lightweight,
    Browser,
    Failed,
}

impl MethodLabel {
    /// All labels, in marker order.
    pub const ALL: [MethodLabel; 3] = [Self::Lightweight, Self::Browser, Self::Failed];

    /// Marker text written into the note body.
    pub const fn marker(self) -> &'static str {
        match self {
            Self::Lightweight => "Content extracted via HTTP fetch",
            Self::Browser => "Content extracted via headless browser",
            Self::Failed => "Content could not be extracted",
        }
    }
}

impl From<ExtractionMethod> for MethodLabel {
    fn from(method: ExtractionMethod) -> Self {
        match method {
            ExtractionMethod::Lightweight => Self::Lightweight,
            ExtractionMethod::Browser => Self::Browser,
        }
    }
}

/// Body text handed to note construction after extraction ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledText {
    /// ENML fragment (already escaped)
    pub html: String,
    pub label: MethodLabel,
}

/// One archive entry; never changed after it is built.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutputNote {
    pub title: String,

    /// Inner ENML of the `<en-note>` element
    pub content: String,

    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub tags: Vec<String>,
    pub source_url: String,
    pub author: String,

    /// Set whenever scraping was attempted for the record
    #[serde(default)]
    pub method: Option<MethodLabel>,
}

impl OutputNote {
    /// Build a note carrying extracted (or failure) text.
    pub fn build(record: &SourceRecord, text: &LabeledText, author: &str) -> Result<Self> {
        let url = Url::parse(record.url.trim())
            .map_err(|e| AppError::note(&record.url, format!("invalid url: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::note(
                &record.url,
                format!("unsupported scheme '{}'", url.scheme()),
            ));
        }

        let created = DateTime::from_timestamp(record.time_added, 0).ok_or_else(|| {
            AppError::note(&record.url, format!("bad timestamp {}", record.time_added))
        })?;

        let mut content = link_block(record);
        content.push_str(&text.html);
        content.push_str(&marker_block(text.label));

        Ok(Self {
            title: truncate_title(record.display_title()),
            content,
            created,
            updated: created,
            tags: record.tags.clone(),
            source_url: record.url.clone(),
            author: author.to_string(),
            method: Some(text.label),
        })
    }

    /// Build a note holding only the link. Never fails.
    pub fn link_only(record: &SourceRecord, author: &str, label: Option<MethodLabel>) -> Self {
        let created = DateTime::from_timestamp(record.time_added, 0).unwrap_or_default();

        let mut content = link_block(record);
        if let Some(label) = label {
            content.push_str(&marker_block(label));
        }

        Self {
            title: truncate_title(record.display_title()),
            content,
            created,
            updated: created,
            tags: record.tags.clone(),
            source_url: record.url.clone(),
            author: author.to_string(),
            method: label,
        }
    }

    /// Labels of the marker block closing the body. Marker wording inside
    /// the article text itself is not counted.
    pub fn markers(&self) -> Vec<MethodLabel> {
        MethodLabel::ALL
            .into_iter()
            .filter(|label| self.content.ends_with(&marker_block(*label)))
            .collect()
    }
}

fn link_block(record: &SourceRecord) -> String {
    format!(
        "<div><a href=\"{}\">{}</a></div><div><br/></div>",
        html_escape::encode_double_quoted_attribute(&record.url),
        html_escape::encode_text(record.display_title()),
    )
}

fn marker_block(label: MethodLabel) -> String {
    format!("<hr/><div><i>{}</i></div>", label.marker())
}

/// Cut a title to the ENEX limit without splitting a grapheme.
pub fn truncate_title(title: &str) -> String {
    let title = title.trim();
    if title.graphemes(true).count() <= MAX_TITLE_GRAPHEMES {
        return title.to_string();
    }
    title.graphemes(true).take(MAX_TITLE_GRAPHEMES).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> SourceRecord {
        SourceRecord {
            title: Some("Fish & Chips".to_string()),
            url: "https://example.com/article?a=1&b=2".to_string(),
            time_added: 1_700_000_000,
            tags: vec!["food".to_string()],
            status: "unread".to_string(),
        }
    }

    #[test]
    fn test_build_embeds_single_marker() {
        let text = LabeledText {
            html: "<p>Body</p>".to_string(),
            label: MethodLabel::Browser,
        };
        let note = OutputNote::build(&sample_record(), &text, "me").unwrap();

        assert_eq!(note.markers(), vec![MethodLabel::Browser]);
        assert_eq!(note.method, Some(MethodLabel::Browser));
        assert!(note.content.contains("Fish &amp; Chips"));
        assert!(note.content.contains("a=1&amp;b=2"));
        assert_eq!(note.created.timestamp(), 1_700_000_000);
        assert_eq!(note.created, note.updated);
    }

    #[test]
    fn test_build_rejects_bad_url() {
        let mut record = sample_record();
        record.url = "not a url".to_string();
        let text = LabeledText {
            html: String::new(),
            label: MethodLabel::Failed,
        };

        assert!(matches!(
            OutputNote::build(&record, &text, "me"),
            Err(AppError::Note { .. })
        ));
    }

    #[test]
    fn test_build_keeps_url_as_given() {
        let mut record = sample_record();
        record.url = "https://Example.com".to_string();
        let text = LabeledText {
            html: "<p>Body</p>".to_string(),
            label: MethodLabel::Lightweight,
        };
        let note = OutputNote::build(&record, &text, "me").unwrap();

        assert_eq!(note.source_url, "https://Example.com");
    }

    #[test]
    fn test_marker_wording_in_body_is_not_a_marker() {
        let text = LabeledText {
            html: format!(
                "<p>The banner read: {}</p>",
                MethodLabel::Failed.marker()
            ),
            label: MethodLabel::Lightweight,
        };
        let note = OutputNote::build(&sample_record(), &text, "me").unwrap();

        assert_eq!(note.markers(), vec![MethodLabel::Lightweight]);
    }

    #[test]
    fn test_link_only_has_no_marker() {
        let note = OutputNote::link_only(&sample_record(), "me", None);
        assert!(note.markers().is_empty());
        assert_eq!(note.method, None);
        assert_eq!(note.source_url, "https://example.com/article?a=1&b=2");
    }

    #[test]
    fn test_title_falls_back_to_url() {
        let mut record = sample_record();
        record.title = None;
        let note = OutputNote::link_only(&record, "me", None);
        assert_eq!(note.title, record.url);
    }

    #[test]
    fn test_truncate_title() {
        let long = "é".repeat(300);
        assert_eq!(truncate_title(&long).chars().count(), MAX_TITLE_GRAPHEMES);
        assert_eq!(truncate_title("  short  "), "short");
    }
}

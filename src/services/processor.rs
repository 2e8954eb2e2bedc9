// src/services/processor.rs

//! Per-record processing: HTTP extraction, browser fallback, labeling and
//! note construction.

use std::sync::Arc;

use crate::models::{LabeledText, MethodLabel, OutputNote, SourceRecord};
use crate::services::extractor::{ContentExtractor, ExtractionResult};

/// Outcome for one record. A note is always present.
#[derive(Debug, Clone)]
pub struct ProcessedRecord {
    pub note: OutputNote,
    pub success: bool,
}

/// Options that shape record processing.
#[derive(Debug, Clone)]
pub struct ProcessOptions {
    pub scrape: bool,
    pub browser_fallback: bool,
    pub author: String,
}

/// Turns source records into notes.
pub struct RecordProcessor {
    http: Arc<dyn ContentExtractor>,
    browser: Option<Arc<dyn ContentExtractor>>,
    options: ProcessOptions,
}

impl RecordProcessor {
    pub fn new(
        http: Arc<dyn ContentExtractor>,
        browser: Option<Arc<dyn ContentExtractor>>,
        options: ProcessOptions,
    ) -> Self {
        Self {
            http,
            browser,
            options,
        }
    }

    /// Process one record. Never fails; problems become a fallback note.
    pub async fn process(&self, record: &SourceRecord) -> ProcessedRecord {
        if !self.options.scrape {
            return ProcessedRecord {
                note: OutputNote::link_only(record, &self.options.author, None),
                success: true,
            };
        }

        let mut result = self.http.extract(&record.url).await;

        if !result.is_success() && self.options.browser_fallback {
            if let Some(browser) = &self.browser {
                log::debug!("Retrying in browser: {}", record.url);
                let retried = browser.extract(&record.url).await;
                if retried.is_success() {
                    result = retried;
                }
            }
        }

        let success = result.is_success();
        let text = label(result);

        match OutputNote::build(record, &text, &self.options.author) {
            Ok(note) => ProcessedRecord { note, success },
            Err(e) => {
                log::warn!("Falling back to link-only note: {}", e);
                self.fallback(record)
            }
        }
    }

    /// Link-only note marked as failed; used when nothing better is possible.
    pub fn fallback(&self, record: &SourceRecord) -> ProcessedRecord {
        ProcessedRecord {
            note: OutputNote::link_only(record, &self.options.author, Some(MethodLabel::Failed)),
            success: false,
        }
    }
}

/// Attach the method label to an extraction outcome.
fn label(result: ExtractionResult) -> LabeledText {
    match result {
        ExtractionResult::Success { text, method } => LabeledText {
            html: text,
            label: method.into(),
        },
        ExtractionResult::Failure { reason } => LabeledText {
            html: format!(
                "<p>Failed to scrape content: {}</p>",
                html_escape::encode_text(&reason)
            ),
            label: MethodLabel::Failed,
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted extractors for processor and scheduler tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::models::ExtractionMethod;

    /// Returns canned results per URL, optionally after a delay.
    pub struct ScriptedExtractor {
        method: ExtractionMethod,
        pages: HashMap<String, String>,
        delays: HashMap<String, Duration>,
        panic_on: Option<String>,
        pub calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        pub fn new(method: ExtractionMethod) -> Self {
            Self {
                method,
                pages: HashMap::new(),
                delays: HashMap::new(),
                panic_on: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn page(mut self, url: &str, text: &str) -> Self {
            self.pages.insert(url.to_string(), text.to_string());
            self
        }

        pub fn delay(mut self, url: &str, delay: Duration) -> Self {
            self.delays.insert(url.to_string(), delay);
            self
        }

        pub fn panic_on(mut self, url: &str) -> Self {
            self.panic_on = Some(url.to_string());
            self
        }
    }

    #[async_trait]
    impl ContentExtractor for ScriptedExtractor {
        async fn extract(&self, url: &str) -> ExtractionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delays.get(url) {
                tokio::time::sleep(*delay).await;
            }
            if self.panic_on.as_deref() == Some(url) {
                panic!("extractor blew up on {url}");
            }
            match self.pages.get(url) {
                Some(text) => ExtractionResult::success(format!("<p>{text}</p>"), self.method),
                None => ExtractionResult::failure("insufficient content (40 characters, need 50)"),
            }
        }
    }
}

// src/services/extractor.rs

//! Extraction contract shared by the HTTP and browser extractors.

use async_trait::async_trait;

use crate::models::ExtractionMethod;

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionResult {
    /// Article text as escaped ENML paragraphs
    Success {
        text: String,
        method: ExtractionMethod,
    },
    /// Nothing usable; `reason` is shown in the fallback note
    Failure { reason: String },
}

impl ExtractionResult {
    pub fn success(text: impl Into<String>, method: ExtractionMethod) -> Self {
        Self::Success {
            text: text.into(),
            method,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Something that turns a URL into article text.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    /// Extract article text from `url`. Never errors; failures are values.
    async fn extract(&self, url: &str) -> ExtractionResult;
}

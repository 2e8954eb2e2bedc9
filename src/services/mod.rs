//! Service layer for the archiver.
//!
//! This module contains the business logic for:
//! - Article text extraction (`HttpExtractor`, `BrowserExtractor`)
//! - Browser page pooling (`PagePool`)
//! - Per-record processing (`RecordProcessor`)

pub mod browser;
mod browser_extractor;
pub mod content;
mod extractor;
mod http_extractor;
pub mod media;
mod processor;

pub use browser::{BrowserLauncher, BrowserSession, PagePool, PoolSettings, PoolState};
pub use browser_extractor::BrowserExtractor;
pub use extractor::{ContentExtractor, ExtractionResult};
pub use http_extractor::HttpExtractor;
pub use processor::{ProcessOptions, ProcessedRecord, RecordProcessor};

#[cfg(test)]
pub(crate) use processor::testing;

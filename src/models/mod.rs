// src/models/mod.rs

//! Domain models for the archiver.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod note;
mod progress;
mod record;

// Re-export all public types
pub use config::{BrowserConfig, Config, OutputConfig, PipelineConfig, ScraperConfig};
pub use note::{
    ExtractionMethod, LabeledText, MAX_TITLE_GRAPHEMES, MethodLabel, OutputNote, truncate_title,
};
pub use progress::{Progress, ProgressStats, fingerprint};
pub use record::{SourceRecord, load_records, read_records, split_tags};

// src/models/progress.rs

//! Cumulative pipeline progress, persisted in the checkpoint file.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::models::{OutputNote, SourceRecord};

/// Progress of one conversion run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub processed_count: usize,
    pub total_count: usize,

    /// Highest input index fully committed; `None` before the first record
    pub last_processed_index: Option<usize>,

    pub failed_urls: Vec<String>,

    /// Notes in input order
    pub processed_notes: Vec<OutputNote>,

    pub timestamp: DateTime<Utc>,
    pub start_time: DateTime<Utc>,

    /// Digest of the input URLs, used to refuse resuming a different export
    #[serde(default)]
    pub input_fingerprint: Option<String>,
}

impl Progress {
    /// Fresh progress for a run over `total_count` records.
    pub fn new(total_count: usize) -> Self {
        let now = Utc::now();
        Self {
            processed_count: 0,
            total_count,
            last_processed_index: None,
            failed_urls: Vec::new(),
            processed_notes: Vec::new(),
            timestamp: now,
            start_time: now,
            input_fingerprint: None,
        }
    }

    /// Attach the fingerprint of the records being processed.
    pub fn with_fingerprint(mut self, fingerprint: String) -> Self {
        self.input_fingerprint = Some(fingerprint);
        self
    }

    /// Input index the next run should start from.
    pub fn next_index(&self) -> usize {
        self.last_processed_index.map_or(0, |i| i + 1)
    }

    /// Whether a restored snapshot is internally consistent.
    pub fn is_consistent(&self) -> bool {
        self.processed_count == self.next_index()
            && self.processed_notes.len() <= self.processed_count
            && self.processed_count <= self.total_count
    }

    /// Throughput and success figures derived from this progress.
    pub fn stats(&self, now: DateTime<Utc>) -> ProgressStats {
        let elapsed = (now - self.start_time).to_std().unwrap_or_default();
        let secs = elapsed.as_secs_f64();
        let items_per_sec = if secs > 0.0 {
            self.processed_count as f64 / secs
        } else {
            0.0
        };
        let failed = self.failed_urls.len();
        let success_rate = if self.processed_count > 0 {
            self.processed_count.saturating_sub(failed) as f64 / self.processed_count as f64
        } else {
            0.0
        };

        ProgressStats {
            processed: self.processed_count,
            total: self.total_count,
            failed,
            elapsed,
            items_per_sec,
            success_rate,
        }
    }
}

/// Derived statistics; a pure read of [`Progress`].
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStats {
    pub processed: usize,
    pub total: usize,
    pub failed: usize,
    pub elapsed: Duration,
    pub items_per_sec: f64,
    /// Fraction in `0.0..=1.0`
    pub success_rate: f64,
}

/// SHA-256 over the record URLs, hex encoded.
pub fn fingerprint(records: &[SourceRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.url.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

// src/pipeline/checkpoint.rs

//! Durable progress snapshots.
//!
//! The store owns the run's [`Progress`] and is the only place it changes.
//! Every `interval` records the snapshot is written next to the output file
//! together with an intermediate archive holding the notes so far.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::Result;
use crate::models::{OutputNote, Progress, ProgressStats};
use crate::storage::{ArchiveMeta, LocalStorage, render_archive};
use crate::utils::{self, report};

/// Checkpoint file and partial archives for one output path.
pub struct CheckpointStore {
    storage: LocalStorage,
    stem: String,
    interval: usize,
    application: String,
    progress: Progress,
    partials: Vec<String>,
}

impl CheckpointStore {
    /// Store for the archive at `output`, saving every `interval` records.
    pub fn new(output: &Path, interval: usize, application: impl Into<String>) -> Result<Self> {
        Ok(Self {
            storage: LocalStorage::beside(output),
            stem: utils::file_stem(output)?,
            interval: interval.max(1),
            application: application.into(),
            progress: Progress::new(0),
            partials: Vec::new(),
        })
    }

    fn checkpoint_key(&self) -> String {
        format!("{}.checkpoint.json", self.stem)
    }

    fn partial_key(&self, count: usize) -> String {
        format!("{}_partial_{}.enex", self.stem, count)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.storage.path(&self.checkpoint_key())
    }

    pub fn partial_path(&self, count: usize) -> PathBuf {
        self.storage.path(&self.partial_key(count))
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Replace the tracked progress, fresh or restored.
    pub fn start(&mut self, progress: Progress) {
        self.progress = progress;
    }

    /// Hand the final progress back to the caller.
    pub fn into_progress(self) -> Progress {
        self.progress
    }

    pub async fn has_checkpoint(&self) -> bool {
        self.storage.exists(&self.checkpoint_key()).await
    }

    /// Read the snapshot; missing or unreadable files yield `None`.
    pub async fn load_checkpoint(&self) -> Option<Progress> {
        match self.storage.read_json::<Progress>(&self.checkpoint_key()).await {
            Ok(Some(progress)) => {
                log::info!(
                    "Loaded checkpoint: {}/{} records processed",
                    progress.processed_count,
                    progress.total_count
                );
                Some(progress)
            }
            Ok(None) => None,
            Err(e) => {
                log::warn!(
                    "Ignoring unreadable checkpoint {}: {}",
                    self.checkpoint_path().display(),
                    e
                );
                None
            }
        }
    }

    /// Write the snapshot. Failures are logged and reported as `false`.
    pub async fn save_checkpoint(&mut self) -> bool {
        self.progress.timestamp = Utc::now();
        match self
            .storage
            .write_json(&self.checkpoint_key(), &self.progress)
            .await
        {
            Ok(()) => {
                log::debug!(
                    "Checkpoint saved at {} records",
                    self.progress.processed_count
                );
                true
            }
            Err(e) => {
                log::warn!("Failed to save checkpoint: {}", e);
                false
            }
        }
    }

    /// Record one committed record.
    ///
    /// Returns `true` when `count` lands on the save interval and a save plus
    /// an intermediate archive flush were attempted.
    pub async fn update_progress(
        &mut self,
        count: usize,
        total: usize,
        last_index: usize,
        note: Option<OutputNote>,
        failed_url: Option<String>,
    ) -> bool {
        self.progress.processed_count = count;
        self.progress.total_count = total;
        self.progress.last_processed_index = Some(last_index);
        if let Some(note) = note {
            self.progress.processed_notes.push(note);
        }
        if let Some(url) = failed_url {
            self.progress.failed_urls.push(url);
        }
        self.progress.timestamp = Utc::now();

        if count % self.interval != 0 {
            return false;
        }

        self.save_checkpoint().await;
        if let Err(e) = self.flush_partial(count).await {
            log::debug!("Partial archive flush failed: {}", e);
        }
        true
    }

    async fn flush_partial(&mut self, count: usize) -> Result<()> {
        let meta = ArchiveMeta::new(self.application.as_str());
        let bytes = render_archive(&self.progress.processed_notes, &meta)?;
        let key = self.partial_key(count);
        self.storage.write_bytes(&key, &bytes).await?;
        self.partials.push(key);
        Ok(())
    }

    /// Remove the snapshot and the partial archives written by this store.
    pub async fn cleanup(&mut self) {
        if let Err(e) = self.storage.remove(&self.checkpoint_key()).await {
            log::warn!("Failed to remove checkpoint: {}", e);
        }
        for key in self.partials.drain(..) {
            if let Err(e) = self.storage.remove(&key).await {
                log::debug!("Failed to remove partial archive {}: {}", key, e);
            }
        }
    }

    pub fn stats(&self) -> ProgressStats {
        self.progress.stats(Utc::now())
    }

    pub fn show_stats(&self) {
        show_stats(&self.stats());
    }
}

/// Log a progress summary.
pub fn show_stats(stats: &ProgressStats) {
    report::summary(
        "Progress",
        &[
            ("Processed", format!("{}/{}", stats.processed, stats.total)),
            ("Failed", stats.failed.to_string()),
            ("Elapsed", report::format_duration(stats.elapsed)),
            ("Rate", format!("{:.2} items/sec", stats.items_per_sec)),
            ("Success rate", report::format_percent(stats.success_rate)),
        ],
    );
}

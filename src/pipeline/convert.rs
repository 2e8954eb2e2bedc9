// src/pipeline/convert.rs

//! Export-to-archive conversion pipeline.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::Result;
use crate::models::{Config, Progress, ProgressStats, SourceRecord, fingerprint, load_records};
use crate::pipeline::batch::BatchScheduler;
use crate::pipeline::checkpoint::{CheckpointStore, show_stats};
use crate::services::{ContentExtractor, HttpExtractor, ProcessOptions, RecordProcessor};
use crate::storage::{ArchiveMeta, LocalStorage, render_archive};
use crate::utils::{self, report};

/// Failed URLs listed in the run summary.
const FAILURE_SAMPLE: usize = 10;

/// Extractors used by a conversion run.
#[derive(Clone)]
pub struct Extractors {
    pub http: Arc<dyn ContentExtractor>,
    pub browser: Option<Arc<dyn ContentExtractor>>,
}

impl Extractors {
    /// HTTP extraction only.
    pub fn http_only(config: &Config) -> Result<Self> {
        Ok(Self {
            http: Arc::new(HttpExtractor::new(&config.scraper)?),
            browser: None,
        })
    }

    pub fn with_browser(mut self, browser: Arc<dyn ContentExtractor>) -> Self {
        self.browser = Some(browser);
        self
    }
}

/// Result of a completed conversion.
#[derive(Debug, Clone)]
pub struct ConvertSummary {
    pub output: PathBuf,
    pub total: usize,
    pub resumed_from: usize,
    pub failed: usize,
    /// First failed URLs, in input order
    pub failed_sample: Vec<String>,
    pub stats: ProgressStats,
}

/// Convert the CSV export at `input` into an archive at `output`.
pub async fn run_convert(
    config: &Config,
    extractors: Extractors,
    input: &Path,
    output: &Path,
) -> Result<ConvertSummary> {
    let records = load_records(input)?;
    log::info!("Loaded {} records from {}", records.len(), input.display());
    convert_records(config, extractors, records, output).await
}

/// Convert already-parsed records into an archive at `output`.
pub async fn convert_records(
    config: &Config,
    extractors: Extractors,
    mut records: Vec<SourceRecord>,
    output: &Path,
) -> Result<ConvertSummary> {
    report::header("Converting saved articles");

    if let Some(limit) = config.pipeline.limit {
        if records.len() > limit {
            log::info!("Limiting run to the first {} of {} records", limit, records.len());
            records.truncate(limit);
        }
    }

    let output_key = utils::file_name(output)?;
    let mut store = CheckpointStore::new(
        output,
        config.pipeline.checkpoint_interval,
        config.output.application.as_str(),
    )?;

    let input_fingerprint = fingerprint(&records);
    let progress = initial_progress(config, &store, &records, &input_fingerprint).await;
    let resumed_from = progress.processed_count;
    store.start(progress);

    let options = ProcessOptions {
        scrape: config.scraper.enabled,
        browser_fallback: config.browser.fallback,
        author: config.output.author.clone(),
    };
    if options.scrape && options.browser_fallback && extractors.browser.is_none() {
        log::warn!("Browser fallback requested but no browser is available");
    }
    report::sub_item(&format!(
        "Scraping: {}, browser fallback: {}, batch size: {}",
        on_off(options.scrape),
        on_off(options.browser_fallback && extractors.browser.is_some()),
        config.pipeline.batch_size
    ));

    let processor = Arc::new(RecordProcessor::new(
        extractors.http,
        extractors.browser,
        options,
    ));
    let scheduler = BatchScheduler::new(processor, &config.pipeline);
    let notes = scheduler.run(&records, &mut store).await;

    let meta = ArchiveMeta::new(config.output.application.as_str());
    let bytes = render_archive(&notes, &meta)?;
    LocalStorage::beside(output)
        .write_bytes(&output_key, &bytes)
        .await?;
    log::info!("Wrote {} notes to {}", notes.len(), output.display());

    let stats = store.stats();
    show_stats(&stats);
    store.cleanup().await;

    let failed_urls = store.into_progress().failed_urls;
    let failed_sample: Vec<String> = failed_urls.iter().take(FAILURE_SAMPLE).cloned().collect();
    if !failed_sample.is_empty() {
        log::warn!("{} records could not be scraped", failed_urls.len());
        for url in &failed_sample {
            report::sub_item(url);
        }
        if failed_urls.len() > FAILURE_SAMPLE {
            report::sub_item(&format!("... and {} more", failed_urls.len() - FAILURE_SAMPLE));
        }
    }

    Ok(ConvertSummary {
        output: output.to_path_buf(),
        total: records.len(),
        resumed_from,
        failed: failed_urls.len(),
        failed_sample,
        stats,
    })
}

/// Restored progress when resuming is allowed and valid, fresh otherwise.
async fn initial_progress(
    config: &Config,
    store: &CheckpointStore,
    records: &[SourceRecord],
    input_fingerprint: &str,
) -> Progress {
    let fresh = || Progress::new(records.len()).with_fingerprint(input_fingerprint.to_string());

    if !config.pipeline.resume {
        if store.has_checkpoint().await {
            log::info!(
                "Existing checkpoint at {} will be replaced (resume is off)",
                store.checkpoint_path().display()
            );
        }
        return fresh();
    }

    let Some(progress) = store.load_checkpoint().await else {
        log::info!("No checkpoint found, starting from the beginning");
        return fresh();
    };

    if progress.input_fingerprint.as_deref() != Some(input_fingerprint) {
        log::warn!("Checkpoint belongs to a different input, starting fresh");
        return fresh();
    }
    if progress.total_count != records.len() || !progress.is_consistent() {
        log::warn!("Checkpoint is inconsistent, starting fresh");
        return fresh();
    }

    progress
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

// src/pipeline/batch.rs

//! Batch scheduling of record processing.
//!
//! Records run in consecutive fixed-size groups. Members of a group are
//! processed concurrently; results are put back into input order before
//! they are committed to the checkpoint store.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use crate::models::{OutputNote, PipelineConfig, SourceRecord};
use crate::pipeline::checkpoint::CheckpointStore;
use crate::services::{ProcessedRecord, RecordProcessor};

/// Runs records through a [`RecordProcessor`] in paced groups.
pub struct BatchScheduler {
    processor: Arc<RecordProcessor>,
    batch_size: usize,
    delay: Duration,
}

impl BatchScheduler {
    pub fn new(processor: Arc<RecordProcessor>, config: &PipelineConfig) -> Self {
        Self {
            processor,
            batch_size: config.batch_size.max(1),
            delay: config.batch_delay(),
        }
    }

    /// Override the pause between groups.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Index ranges of the groups covering `start..total`.
    pub fn plan(&self, start: usize, total: usize) -> Vec<Range<usize>> {
        (start..total)
            .step_by(self.batch_size)
            .map(|from| from..(from + self.batch_size).min(total))
            .collect()
    }

    /// Process every record not yet committed in `store`.
    ///
    /// Resumes at `processed_count` and returns all notes in input order,
    /// including those restored from an earlier run.
    pub async fn run(
        &self,
        records: &[SourceRecord],
        store: &mut CheckpointStore,
    ) -> Vec<OutputNote> {
        let total = records.len();
        let start = store.progress().processed_count.min(total);
        let groups = self.plan(start, total);

        if start > 0 {
            log::info!("Resuming at record {} of {}", start + 1, total);
        }

        for (group_no, range) in groups.iter().enumerate() {
            log::info!(
                "Batch {}/{}: records {}-{} of {}",
                group_no + 1,
                groups.len(),
                range.start + 1,
                range.end,
                total
            );

            let mut results = self.run_group(range.start, &records[range.clone()]).await;
            results.sort_by_key(|(index, _)| *index);

            for (index, processed) in results {
                let failed_url = (!processed.success).then(|| records[index].url.clone());
                store
                    .update_progress(index + 1, total, index, Some(processed.note), failed_url)
                    .await;
            }

            if group_no + 1 < groups.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            tokio::task::yield_now().await;
        }

        store.progress().processed_notes.clone()
    }

    /// Process one group concurrently; returns `(global index, result)` pairs.
    async fn run_group(
        &self,
        base: usize,
        group: &[SourceRecord],
    ) -> Vec<(usize, ProcessedRecord)> {
        let handles: Vec<_> = group
            .iter()
            .enumerate()
            .map(|(offset, record)| {
                let processor = Arc::clone(&self.processor);
                let record = record.clone();
                let index = base + offset;
                tokio::spawn(async move { (index, processor.process(&record).await) })
            })
            .collect();

        let mut results = Vec::with_capacity(group.len());
        let mut lost = Vec::new();
        for (offset, joined) in join_all(handles).await.into_iter().enumerate() {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => {
                    log::error!("Task for {} failed: {}", group[offset].url, e);
                    lost.push(offset);
                }
            }
        }

        for offset in lost {
            results.push((base + offset, self.processor.fallback(&group[offset])));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use tempfile::TempDir;

    use super::*;
    use crate::models::{ExtractionMethod, MethodLabel, Progress};
    use crate::services::testing::ScriptedExtractor;
    use crate::services::{ContentExtractor, ProcessOptions};

    fn records(n: usize) -> Vec<SourceRecord> {
        (0..n)
            .map(|i| SourceRecord {
                title: Some(format!("Article {i}")),
                url: format!("https://example.com/{i}"),
                time_added: 1_700_000_000 + i as i64,
                tags: Vec::new(),
                status: "unread".to_string(),
            })
            .collect()
    }

    fn scheduler(
        http: Arc<dyn ContentExtractor>,
        scrape: bool,
        batch_size: usize,
    ) -> BatchScheduler {
        let options = ProcessOptions {
            scrape,
            browser_fallback: false,
            author: "tester".to_string(),
        };
        let processor = Arc::new(RecordProcessor::new(http, None, options));
        let config = PipelineConfig {
            batch_size,
            ..Default::default()
        };
        BatchScheduler::new(processor, &config).with_delay(Duration::ZERO)
    }

    fn store(tmp: &TempDir, interval: usize, total: usize) -> CheckpointStore {
        let mut store =
            CheckpointStore::new(&tmp.path().join("out.enex"), interval, "Evernote").unwrap();
        store.start(Progress::new(total));
        store
    }

    fn urls(notes: &[OutputNote]) -> Vec<String> {
        notes.iter().map(|n| n.source_url.clone()).collect()
    }

    #[test]
    fn test_plan_groups() {
        let http = Arc::new(ScriptedExtractor::new(ExtractionMethod::Lightweight));
        let scheduler = scheduler(http, false, 3);
        assert_eq!(scheduler.plan(0, 7), vec![0..3, 3..6, 6..7]);
        assert_eq!(scheduler.plan(4, 7), vec![4..7]);
        assert!(scheduler.plan(7, 7).is_empty());
    }

    #[tokio::test]
    async fn test_seven_records_without_scraping() {
        let tmp = TempDir::new().unwrap();
        let http = Arc::new(ScriptedExtractor::new(ExtractionMethod::Lightweight));
        let scheduler = scheduler(http.clone(), false, 3);
        let input = records(7);
        let mut store = store(&tmp, 50, 7);

        let notes = scheduler.run(&input, &mut store).await;

        assert_eq!(urls(&notes), input.iter().map(|r| r.url.clone()).collect::<Vec<_>>());
        assert_eq!(store.progress().processed_count, 7);
        assert_eq!(store.progress().last_processed_index, Some(6));
        assert!(store.progress().failed_urls.is_empty());
        assert_eq!(http.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_order_preserved_when_completion_is_reversed() {
        let tmp = TempDir::new().unwrap();
        let input = records(4);
        let mut extractor = ScriptedExtractor::new(ExtractionMethod::Lightweight);
        for (i, record) in input.iter().enumerate() {
            extractor = extractor
                .page(&record.url, &format!("body {i} with plenty of text"))
                .delay(&record.url, Duration::from_millis(40 - 10 * i as u64));
        }
        let scheduler = scheduler(Arc::new(extractor), true, 4);
        let mut store = store(&tmp, 50, 4);

        let notes = scheduler.run(&input, &mut store).await;

        assert_eq!(urls(&notes), input.iter().map(|r| r.url.clone()).collect::<Vec<_>>());
        assert!(notes[0].content.contains("body 0"));
        assert!(notes[3].content.contains("body 3"));
    }

    #[tokio::test]
    async fn test_failed_extraction_still_yields_note() {
        let tmp = TempDir::new().unwrap();
        let input = records(2);
        let extractor = ScriptedExtractor::new(ExtractionMethod::Lightweight)
            .page(&input[0].url, "fine body");
        let scheduler = scheduler(Arc::new(extractor), true, 2);
        let mut store = store(&tmp, 50, 2);

        let notes = scheduler.run(&input, &mut store).await;

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[1].markers(), vec![MethodLabel::Failed]);
        assert_eq!(store.progress().failed_urls, vec![input[1].url.clone()]);
    }

    #[tokio::test]
    async fn test_scraped_notes_keep_input_urls() {
        let tmp = TempDir::new().unwrap();
        let mut input = records(2);
        input[0].url = "https://Example.com".to_string();
        let extractor = ScriptedExtractor::new(ExtractionMethod::Lightweight)
            .page(&input[0].url, "home page body")
            .page(&input[1].url, "article body");
        let scheduler = scheduler(Arc::new(extractor), true, 2);
        let mut store = store(&tmp, 50, 2);

        let notes = scheduler.run(&input, &mut store).await;

        assert_eq!(urls(&notes), vec!["https://Example.com", "https://example.com/1"]);
        assert_eq!(notes[0].markers(), vec![MethodLabel::Lightweight]);
    }

    #[tokio::test]
    async fn test_panicking_task_gets_fallback_note() {
        let tmp = TempDir::new().unwrap();
        let input = records(3);
        let mut extractor =
            ScriptedExtractor::new(ExtractionMethod::Lightweight).panic_on(&input[1].url);
        for record in &input {
            extractor = extractor.page(&record.url, "fine body");
        }
        let scheduler = scheduler(Arc::new(extractor), true, 3);
        let mut store = store(&tmp, 50, 3);

        let notes = scheduler.run(&input, &mut store).await;

        assert_eq!(urls(&notes), input.iter().map(|r| r.url.clone()).collect::<Vec<_>>());
        assert_eq!(notes[1].markers(), vec![MethodLabel::Failed]);
        assert_eq!(notes[0].markers(), vec![MethodLabel::Lightweight]);
        assert_eq!(store.progress().failed_urls, vec![input[1].url.clone()]);
    }

    #[tokio::test]
    async fn test_resume_matches_uninterrupted_run() {
        let tmp = TempDir::new().unwrap();
        let input = records(5);
        let build = || {
            let mut extractor = ScriptedExtractor::new(ExtractionMethod::Lightweight);
            for record in &input {
                extractor = extractor.page(&record.url, "article body");
            }
            Arc::new(extractor)
        };

        let mut first = store(&tmp, 2, 5);
        let full = scheduler(build(), true, 2).run(&input, &mut first).await;

        // The last snapshot was taken after record 4
        let restored = first.load_checkpoint().await.unwrap();
        assert_eq!(restored.processed_count, 4);

        let resumed_dir = TempDir::new().unwrap();
        let mut second = store(&resumed_dir, 2, 5);
        second.start(restored);
        let http = build();
        let resumed = scheduler(http.clone(), true, 2).run(&input, &mut second).await;

        assert_eq!(http.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resumed, full);
        assert_eq!(second.progress().processed_count, 5);
    }
}

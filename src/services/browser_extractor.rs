// src/services/browser_extractor.rs

//! Browser-based extractor for pages that need script execution.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::{BrowserConfig, ExtractionMethod};
use crate::services::browser::{BrowserLauncher, BrowserSession, PageLease, PagePool};
use crate::services::content::extract_article;
use crate::services::extractor::{ContentExtractor, ExtractionResult};

/// Renders pages in a pooled headless browser, then extracts like
/// [`HttpExtractor`](crate::services::HttpExtractor) does.
pub struct BrowserExtractor<L: BrowserLauncher> {
    pool: Arc<PagePool<L>>,
    navigation_timeout: Duration,
    settle_delay: Duration,
}

impl<L: BrowserLauncher> BrowserExtractor<L> {
    pub fn new(pool: Arc<PagePool<L>>, config: &BrowserConfig) -> Self {
        Self {
            pool,
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.settle_delay(),
        }
    }

    async fn render(&self, lease: &PageLease<L::Session>, url: &str) -> Result<String> {
        let session = lease.session();
        tokio::time::timeout(self.navigation_timeout, session.navigate(lease.page(), url))
            .await
            .map_err(|_| {
                AppError::browser(format!(
                    "navigation timed out after {:?}",
                    self.navigation_timeout
                ))
            })??;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        session.content(lease.page()).await
    }
}

#[async_trait]
impl<L: BrowserLauncher> ContentExtractor for BrowserExtractor<L> {
    async fn extract(&self, url: &str) -> ExtractionResult {
        let lease = match self.pool.lease().await {
            Ok(lease) => lease,
            Err(e) => {
                log::warn!("Browser unavailable for {}: {}", url, e);
                return ExtractionResult::failure(format!("Browser unavailable: {e}"));
            }
        };

        let rendered = self.render(&lease, url).await;
        self.pool.release(lease).await;

        match rendered {
            Ok(html) => match extract_article(&html) {
                Ok(article) => ExtractionResult::success(article.html, ExtractionMethod::Browser),
                Err(reason) => ExtractionResult::failure(reason),
            },
            Err(e) => {
                log::debug!("Browser render failed for {}: {}", url, e);
                ExtractionResult::failure(format!("Failed to render page: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::services::browser::PoolSettings;
    use crate::services::browser::testing::FakeLauncher;

    const ARTICLE: &str = "<html><body><article><p>Rendered by scripts, this article body only \
        exists once the page has executed its JavaScript bundle.</p><p>A second paragraph keeps \
        the region comfortably above the minimum length.</p></article></body></html>";

    fn config() -> BrowserConfig {
        BrowserConfig {
            settle_delay_ms: 0,
            ..BrowserConfig::default()
        }
    }

    #[tokio::test]
    async fn test_extracts_rendered_article() {
        let launcher = FakeLauncher::new().with_document("https://spa.example.com/", ARTICLE);
        let pool = Arc::new(PagePool::new(launcher, PoolSettings::default()));
        let extractor = BrowserExtractor::new(Arc::clone(&pool), &config());

        match extractor.extract("https://spa.example.com/").await {
            ExtractionResult::Success { text, method } => {
                assert_eq!(method, ExtractionMethod::Browser);
                assert!(text.contains("Rendered by scripts"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(pool.idle_count().await, 1);
    }

    #[tokio::test]
    async fn test_page_returned_after_navigation_error() {
        let launcher = FakeLauncher::new();
        let counters = Arc::clone(&launcher.counters);
        let pool = Arc::new(PagePool::new(launcher, PoolSettings::default()));
        let extractor = BrowserExtractor::new(Arc::clone(&pool), &config());

        let result = extractor.extract("https://missing.example.com/").await;
        assert!(!result.is_success());

        // Same page reused on the next attempt
        let _ = extractor.extract("https://missing.example.com/").await;
        assert_eq!(pool.idle_count().await, 1);
        assert_eq!(counters.pages_opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_extraction_failure() {
        let mut launcher = FakeLauncher::new();
        launcher.fail_launch = true;
        let pool = Arc::new(PagePool::new(launcher, PoolSettings::default()));
        let extractor = BrowserExtractor::new(pool, &config());

        match extractor.extract("https://spa.example.com/").await {
            ExtractionResult::Failure { reason } => assert!(reason.contains("Browser unavailable")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}

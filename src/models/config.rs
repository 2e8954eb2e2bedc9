//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP scraping behavior
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Headless browser fallback
    #[serde(default)]
    pub browser: BrowserConfig,

    /// Batching and checkpointing
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Archive metadata
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.scraper.user_agent.trim().is_empty() {
            return Err(AppError::validation("scraper.user_agent is empty"));
        }
        if self.scraper.timeout_secs == 0 {
            return Err(AppError::validation("scraper.timeout_secs must be > 0"));
        }
        if self.browser.navigation_timeout_secs == 0 {
            return Err(AppError::validation(
                "browser.navigation_timeout_secs must be > 0",
            ));
        }
        if self.browser.restart_every == 0 {
            return Err(AppError::validation("browser.restart_every must be > 0"));
        }
        if self.browser.close_timeout_secs == 0 {
            return Err(AppError::validation(
                "browser.close_timeout_secs must be > 0",
            ));
        }
        if self.pipeline.batch_size == 0 {
            return Err(AppError::validation("pipeline.batch_size must be > 0"));
        }
        if self.pipeline.checkpoint_interval == 0 {
            return Err(AppError::validation(
                "pipeline.checkpoint_interval must be > 0",
            ));
        }
        Ok(())
    }
}

/// HTTP scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Fetch article text at all; when off every note is link-only
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// Retry failed HTTP extractions in a headless browser
    #[serde(default)]
    pub fallback: bool,

    /// Navigation timeout in seconds
    #[serde(default = "defaults::navigation_timeout")]
    pub navigation_timeout_secs: u64,

    /// Extra wait after navigation for deferred scripts
    #[serde(default = "defaults::settle_delay")]
    pub settle_delay_ms: u64,

    /// Idle pages kept for reuse
    #[serde(default = "defaults::max_idle_pages")]
    pub max_idle_pages: usize,

    /// Restart the browser after this many page leases
    #[serde(default = "defaults::restart_every")]
    pub restart_every: u64,

    /// Grace period for a clean browser shutdown before killing it
    #[serde(default = "defaults::close_timeout")]
    pub close_timeout_secs: u64,
}

impl BrowserConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            fallback: false,
            navigation_timeout_secs: defaults::navigation_timeout(),
            settle_delay_ms: defaults::settle_delay(),
            max_idle_pages: defaults::max_idle_pages(),
            restart_every: defaults::restart_every(),
            close_timeout_secs: defaults::close_timeout(),
        }
    }
}

/// Batch and checkpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records processed concurrently per batch
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    /// Save a checkpoint every N processed records
    #[serde(default = "defaults::checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Continue from an existing checkpoint
    #[serde(default)]
    pub resume: bool,

    /// Only process the first N records
    #[serde(default)]
    pub limit: Option<usize>,

    /// Base pause between batches in milliseconds
    #[serde(default = "defaults::batch_delay_base")]
    pub batch_delay_base_ms: u64,

    /// Additional pause per record in the batch
    #[serde(default = "defaults::batch_delay_per_item")]
    pub batch_delay_per_item_ms: u64,

    /// Upper bound for the pause between batches
    #[serde(default = "defaults::batch_delay_max")]
    pub batch_delay_max_ms: u64,
}

impl PipelineConfig {
    /// Pause between two batches; larger batches wait longer.
    pub fn batch_delay(&self) -> Duration {
        let scaled = self
            .batch_delay_base_ms
            .saturating_add(self.batch_delay_per_item_ms.saturating_mul(self.batch_size as u64));
        Duration::from_millis(scaled.min(self.batch_delay_max_ms))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::batch_size(),
            checkpoint_interval: defaults::checkpoint_interval(),
            resume: false,
            limit: None,
            batch_delay_base_ms: defaults::batch_delay_base(),
            batch_delay_per_item_ms: defaults::batch_delay_per_item(),
            batch_delay_max_ms: defaults::batch_delay_max(),
        }
    }
}

/// Archive metadata settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Author written into every note
    #[serde(default = "defaults::author")]
    pub author: String,

    /// Application name in the export header
    #[serde(default = "defaults::application")]
    pub application: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            author: defaults::author(),
            application: defaults::application(),
        }
    }
}

mod defaults {
    // Scraper defaults
    pub fn enabled() -> bool {
        true
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/120.0.0.0 Safari/537.36"
            .into()
    }
    pub fn timeout() -> u64 {
        15
    }

    // Browser defaults
    pub fn navigation_timeout() -> u64 {
        30
    }
    pub fn settle_delay() -> u64 {
        2000
    }
    pub fn max_idle_pages() -> usize {
        4
    }
    pub fn restart_every() -> u64 {
        1000
    }
    pub fn close_timeout() -> u64 {
        10
    }

    // Pipeline defaults
    pub fn batch_size() -> usize {
        5
    }
    pub fn checkpoint_interval() -> usize {
        50
    }
    pub fn batch_delay_base() -> u64 {
        500
    }
    pub fn batch_delay_per_item() -> u64 {
        100
    }
    pub fn batch_delay_max() -> u64 {
        3000
    }

    // Output defaults
    pub fn author() -> String {
        "Pocket Import".into()
    }
    pub fn application() -> String {
        "Evernote".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_user_agent() {
        let mut config = Config::default();
        config.scraper.user_agent = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.pipeline.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_checkpoint_interval() {
        let mut config = Config::default();
        config.pipeline.checkpoint_interval = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_close_timeout() {
        let mut config = Config::default();
        config.browser.close_timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(AppError::Validation(msg)) if msg.contains("close_timeout_secs")
        ));
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [pipeline]
            batch_size = 10

            [browser]
            fallback = true
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.batch_size, 10);
        assert_eq!(config.pipeline.checkpoint_interval, 50);
        assert!(config.browser.fallback);
        assert_eq!(config.browser.restart_every, 1000);
        assert!(config.scraper.enabled);
    }

    #[test]
    fn batch_delay_scales_with_batch_size() {
        let mut pipeline = PipelineConfig::default();
        pipeline.batch_size = 5;
        assert_eq!(pipeline.batch_delay(), Duration::from_millis(1000));

        pipeline.batch_size = 10;
        assert_eq!(pipeline.batch_delay(), Duration::from_millis(1500));

        pipeline.batch_size = 100;
        assert_eq!(pipeline.batch_delay(), Duration::from_millis(3000));
    }
}

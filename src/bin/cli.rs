//! ENEX archiver CLI
//!
//! Converts a saved-article CSV export into an Evernote archive.

use std::path::{Path, PathBuf};
#[cfg(feature = "browser")]
use std::sync::Arc;

use clap::{Parser, Subcommand};
use enex_archiver::{
    error::{AppError, Result},
    models::Config,
    pipeline::{self, CheckpointStore, Extractors},
    utils::report,
};

#[cfg(feature = "browser")]
use enex_archiver::services::{BrowserExtractor, PagePool, PoolSettings, browser::ChromiumLauncher};

/// enex-archiver - saved articles to Evernote
#[derive(Parser, Debug)]
#[command(
    name = "enex-archiver",
    version,
    about = "Convert saved-article exports into ENEX archives"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a CSV export into an ENEX archive
    Convert {
        /// CSV export to read
        input: PathBuf,

        /// Archive to write
        output: PathBuf,

        /// Only create link notes, skip fetching articles
        #[arg(long)]
        no_scrape: bool,

        /// Retry failed fetches in a headless browser
        #[arg(long)]
        browser_fallback: bool,

        /// HTTP timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Save a checkpoint every N records
        #[arg(long)]
        checkpoint_interval: Option<usize>,

        /// Records processed concurrently
        #[arg(long)]
        batch_size: Option<usize>,

        /// Continue from the checkpoint next to the output file
        #[arg(long)]
        resume: bool,

        /// Only process the first N records
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Split an archive into files of at most N notes
    Split {
        /// Archive to split
        input: PathBuf,

        /// Notes per output file
        #[arg(short = 'n', long, default_value_t = 500)]
        notes_per_file: usize,

        /// Directory for the parts (default: next to the input)
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Validate configuration file
    Validate,

    /// Show checkpoint progress for an output archive
    Info {
        /// Archive the checkpoint belongs to
        output: PathBuf,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Browser resources that must be released before the process exits.
#[derive(Default)]
struct BrowserHandle {
    #[cfg(feature = "browser")]
    pool: Option<Arc<PagePool<ChromiumLauncher>>>,
}

impl BrowserHandle {
    async fn shutdown(&self) {
        #[cfg(feature = "browser")]
        if let Some(pool) = &self.pool {
            if let Err(e) = pool.shutdown().await {
                log::warn!("Browser shutdown failed: {}", e);
            }
        }
    }
}

/// HTTP extractor plus, when enabled and compiled in, the browser fallback.
fn build_extractors(config: &Config) -> Result<(Extractors, BrowserHandle)> {
    let extractors = Extractors::http_only(config)?;
    if !(config.scraper.enabled && config.browser.fallback) {
        return Ok((extractors, BrowserHandle::default()));
    }

    #[cfg(feature = "browser")]
    let (extractors, handle) = {
        let launcher = ChromiumLauncher::new(config.scraper.user_agent.clone());
        let pool = Arc::new(PagePool::new(launcher, PoolSettings::from(&config.browser)));
        let browser = BrowserExtractor::new(Arc::clone(&pool), &config.browser);
        (
            extractors.with_browser(Arc::new(browser)),
            BrowserHandle { pool: Some(pool) },
        )
    };

    #[cfg(not(feature = "browser"))]
    let handle = {
        log::warn!("Built without the `browser` feature; browser fallback is unavailable");
        BrowserHandle::default()
    };

    Ok((extractors, handle))
}

/// Resolves with the name of the first termination signal received.
async fn termination_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        "Ctrl-C"
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::warn!("Cannot listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    tokio::select! {
        name = ctrl_c => name,
        name = terminate => name,
    }
}

async fn convert(config: &Config, input: &Path, output: &Path) -> Result<()> {
    let (extractors, browser) = build_extractors(config)?;

    let outcome = tokio::select! {
        result = pipeline::run_convert(config, extractors, input, output) => result,
        name = termination_signal() => Err(AppError::Interrupted(format!(
            "received {}; progress kept in the checkpoint next to {}",
            name,
            output.display()
        ))),
    };

    browser.shutdown().await;

    let summary = outcome?;
    report::summary(
        "Conversion complete",
        &[
            ("Archive", summary.output.display().to_string()),
            ("Records", summary.total.to_string()),
            ("Resumed from", summary.resumed_from.to_string()),
            ("Failed", summary.failed.to_string()),
        ],
    );
    Ok(())
}

async fn info(config: &Config, output: &Path) -> Result<()> {
    let store = CheckpointStore::new(
        output,
        config.pipeline.checkpoint_interval,
        config.output.application.as_str(),
    )?;

    log::info!("Checkpoint: {}", store.checkpoint_path().display());
    match store.load_checkpoint().await {
        Some(progress) => {
            log::info!("Last saved: {}", progress.timestamp);
            pipeline::show_stats(&progress.stats(progress.timestamp));
        }
        None => log::info!("No checkpoint found."),
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);

    match cli.command {
        Command::Convert {
            input,
            output,
            no_scrape,
            browser_fallback,
            timeout,
            checkpoint_interval,
            batch_size,
            resume,
            limit,
        } => {
            if no_scrape {
                config.scraper.enabled = false;
            }
            if browser_fallback {
                config.browser.fallback = true;
            }
            if let Some(secs) = timeout {
                config.scraper.timeout_secs = secs;
            }
            if let Some(interval) = checkpoint_interval {
                config.pipeline.checkpoint_interval = interval;
            }
            if let Some(size) = batch_size {
                config.pipeline.batch_size = size;
            }
            if resume {
                config.pipeline.resume = true;
            }
            if limit.is_some() {
                config.pipeline.limit = limit;
            }
            config.validate()?;

            convert(&config, &input, &output).await?;
        }

        Command::Split {
            input,
            notes_per_file,
            out_dir,
        } => {
            let written = pipeline::run_split(&input, notes_per_file, out_dir.as_deref()).await?;
            for path in &written {
                report::sub_item(&path.display().to_string());
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Info { output } => info(&config, &output).await?,
    }

    log::info!("Done!");

    Ok(())
}

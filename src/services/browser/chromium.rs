// src/services/browser/chromium.rs

//! Headless Chromium sessions via the DevTools protocol.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::{BrowserLauncher, BrowserSession};
use crate::error::{AppError, Result};

/// Launches a local headless Chromium.
pub struct ChromiumLauncher {
    user_agent: String,
}

impl ChromiumLauncher {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession> {
        let config = ChromeConfig::builder()
            .no_sandbox()
            .window_size(1366, 900)
            .arg(format!("--user-agent={}", self.user_agent))
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--mute-audio")
            .build()
            .map_err(AppError::browser)?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(AppError::browser)?;

        // The CDP handler must be polled for the browser to make progress
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    log::debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        log::info!("Headless browser started");
        Ok(ChromiumSession {
            browser: Mutex::new(browser),
            handler,
        })
    }
}

/// A running Chromium process.
pub struct ChromiumSession {
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    type Page = Page;

    async fn new_page(&self) -> Result<Page> {
        let browser = self.browser.lock().await;
        browser
            .new_page("about:blank")
            .await
            .map_err(AppError::browser)
    }

    async fn navigate(&self, page: &Page, url: &str) -> Result<()> {
        page.goto(url).await.map_err(AppError::browser)?;
        page.wait_for_navigation()
            .await
            .map_err(AppError::browser)?;
        Ok(())
    }

    async fn content(&self, page: &Page) -> Result<String> {
        page.content().await.map_err(AppError::browser)
    }

    async fn close_page(&self, page: Page) -> Result<()> {
        page.close().await.map_err(AppError::browser)
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;

        // Pages opened by scripts are not tracked by the pool
        match browser.pages().await {
            Ok(pages) => {
                for page in pages {
                    if let Err(e) = page.close().await {
                        log::debug!("Failed to close browser page: {}", e);
                    }
                }
            }
            Err(e) => log::debug!("Failed to list browser pages: {}", e),
        }

        browser.close().await.map_err(AppError::browser)?;
        browser.wait().await.map_err(AppError::browser)?;
        self.handler.abort();
        Ok(())
    }

    async fn kill(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        self.handler.abort();
        match browser.kill().await {
            Some(Err(e)) => Err(AppError::browser(format!("kill failed: {e}"))),
            _ => Ok(()),
        }
    }
}

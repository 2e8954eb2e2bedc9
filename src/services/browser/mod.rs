// src/services/browser/mod.rs

//! Browser page pool with a recycling policy.
//!
//! The pool owns one browser session at a time and hands out page leases.
//! Sessions start lazily, are recycled every `restart_every` leases to bound
//! memory growth, and are torn down gracefully with a forced kill as the
//! last resort. Browser control itself sits behind [`BrowserLauncher`] and
//! [`BrowserSession`].

#[cfg(feature = "browser")]
mod chromium;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::BrowserConfig;

#[cfg(feature = "browser")]
pub use chromium::{ChromiumLauncher, ChromiumSession};

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync + 'static {
    type Session: BrowserSession;

    async fn launch(&self) -> Result<Self::Session>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserSession: Send + Sync + 'static {
    type Page: Send + Sync + 'static;

    async fn new_page(&self) -> Result<Self::Page>;

    /// Navigate and wait for the page to finish loading.
    async fn navigate(&self, page: &Self::Page, url: &str) -> Result<()>;

    /// Serialized rendered document.
    async fn content(&self, page: &Self::Page) -> Result<String>;

    async fn close_page(&self, page: Self::Page) -> Result<()>;

    /// Close every page and the browser itself.
    async fn close(&self) -> Result<()>;

    /// Terminate the browser process and its children.
    async fn kill(&self) -> Result<()>;
}

/// Lifecycle of the pooled browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Unstarted,
    Running,
    Restarting,
    Closed,
}

/// Pool sizing and recycling policy.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_idle_pages: usize,
    pub restart_every: u64,
    pub close_timeout: Duration,
}

impl From<&BrowserConfig> for PoolSettings {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            max_idle_pages: config.max_idle_pages,
            restart_every: config.restart_every.max(1),
            close_timeout: config.close_timeout(),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&BrowserConfig::default())
    }
}

struct PoolInner<S: BrowserSession> {
    state: PoolState,
    session: Option<Arc<S>>,
    idle: Vec<S::Page>,
    /// Bumped on every restart; pages from older sessions are not reused
    generation: u64,
    /// Total leases handed out, never reset
    leases: u64,
    /// Leases of the current generation not yet returned
    outstanding: usize,
    /// Replaced sessions kept alive until their last lease comes back
    retired: Vec<Retired<S>>,
}

struct Retired<S> {
    generation: u64,
    session: Arc<S>,
    outstanding: usize,
}

/// A page checked out of the pool.
pub struct PageLease<S: BrowserSession> {
    page: S::Page,
    session: Arc<S>,
    generation: u64,
}

impl<S: BrowserSession> PageLease<S> {
    pub fn page(&self) -> &S::Page {
        &self.page
    }

    pub fn session(&self) -> &S {
        &self.session
    }
}

/// Shared pool of browser pages.
pub struct PagePool<L: BrowserLauncher> {
    launcher: L,
    settings: PoolSettings,
    inner: Mutex<PoolInner<L::Session>>,
}

impl<L: BrowserLauncher> PagePool<L> {
    pub fn new(launcher: L, settings: PoolSettings) -> Self {
        Self {
            launcher,
            settings,
            inner: Mutex::new(PoolInner {
                state: PoolState::Unstarted,
                session: None,
                idle: Vec::new(),
                generation: 0,
                leases: 0,
                outstanding: 0,
                retired: Vec::new(),
            }),
        }
    }

    pub async fn state(&self) -> PoolState {
        self.inner.lock().await.state
    }

    /// Total leases handed out since the pool was created.
    pub async fn lease_count(&self) -> u64 {
        self.inner.lock().await.leases
    }

    pub async fn idle_count(&self) -> usize {
        self.inner.lock().await.idle.len()
    }

    /// Check out a page, starting or recycling the browser as needed.
    pub async fn lease(&self) -> Result<PageLease<L::Session>> {
        let mut inner = self.inner.lock().await;
        if inner.state == PoolState::Closed {
            return Err(AppError::browser("page pool is closed"));
        }

        inner.leases += 1;
        if inner.leases % self.settings.restart_every == 0 && inner.session.is_some() {
            log::info!(
                "Restarting browser after {} page leases",
                inner.leases
            );
            self.restart(&mut inner).await;
        }

        let session = match &inner.session {
            Some(session) => Arc::clone(session),
            None => {
                log::debug!("Launching browser");
                let session = Arc::new(self.launcher.launch().await?);
                inner.session = Some(Arc::clone(&session));
                inner.state = PoolState::Running;
                session
            }
        };

        let page = match inner.idle.pop() {
            Some(page) => page,
            None => session.new_page().await?,
        };
        inner.outstanding += 1;

        Ok(PageLease {
            page,
            session,
            generation: inner.generation,
        })
    }

    /// Return a page. Pages from a recycled session, or beyond the idle
    /// limit, are closed instead of pooled. A recycled session is torn down
    /// once its last page comes back.
    pub async fn release(&self, lease: PageLease<L::Session>) {
        let mut inner = self.inner.lock().await;

        if lease.generation == inner.generation {
            inner.outstanding = inner.outstanding.saturating_sub(1);
            let reusable = inner.state == PoolState::Running
                && inner.idle.len() < self.settings.max_idle_pages;
            if reusable {
                inner.idle.push(lease.page);
                return;
            }
            drop(inner);
            close_page(&*lease.session, lease.page).await;
            return;
        }

        let drained = match inner
            .retired
            .iter()
            .position(|r| r.generation == lease.generation)
        {
            Some(pos) => {
                let retired = &mut inner.retired[pos];
                retired.outstanding = retired.outstanding.saturating_sub(1);
                (retired.outstanding == 0).then(|| inner.retired.remove(pos))
            }
            None => None,
        };
        drop(inner);

        close_page(&*lease.session, lease.page).await;
        if let Some(retired) = drained {
            log::debug!(
                "Last page of browser generation {} returned, closing it",
                retired.generation
            );
            if let Err(e) = self.teardown(&retired.session).await {
                log::warn!("Browser teardown after restart failed: {}", e);
            }
        }
    }

    /// Close pooled pages and the browser. Safe to call repeatedly.
    pub async fn shutdown(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.state == PoolState::Closed {
            return Ok(());
        }

        let idle = std::mem::take(&mut inner.idle);
        let session = inner.session.take();
        let retired = std::mem::take(&mut inner.retired);
        inner.state = PoolState::Closed;
        drop(inner);

        for old in retired {
            if let Err(e) = self.teardown(&old.session).await {
                log::warn!("Failed to close retired browser: {}", e);
            }
        }

        match session {
            Some(session) => {
                for page in idle {
                    close_page(&*session, page).await;
                }
                self.teardown(&session).await
            }
            None => Ok(()),
        }
    }

    /// Swap out the current session. It is closed right away when none of
    /// its pages are leased, otherwise when the last one is released.
    async fn restart(&self, inner: &mut PoolInner<L::Session>) {
        inner.state = PoolState::Restarting;
        let idle = std::mem::take(&mut inner.idle);

        if let Some(session) = inner.session.take() {
            for page in idle {
                close_page(&*session, page).await;
            }
            if inner.outstanding == 0 {
                if let Err(e) = self.teardown(&session).await {
                    log::warn!("Browser teardown during restart failed: {}", e);
                }
            } else {
                log::debug!(
                    "Deferring browser close until {} leased pages return",
                    inner.outstanding
                );
                inner.retired.push(Retired {
                    generation: inner.generation,
                    session,
                    outstanding: inner.outstanding,
                });
            }
        }

        inner.generation += 1;
        inner.outstanding = 0;
        inner.state = PoolState::Unstarted;
    }

    /// Graceful close bounded by `close_timeout`, then a forced kill.
    async fn teardown(&self, session: &L::Session) -> Result<()> {
        match tokio::time::timeout(self.settings.close_timeout, session.close()).await {
            Ok(Ok(())) => {
                log::debug!("Browser closed");
                Ok(())
            }
            Ok(Err(e)) => {
                log::warn!("Browser close failed ({}), killing process", e);
                session.kill().await
            }
            Err(_) => {
                log::warn!(
                    "Browser close timed out after {:?}, killing process",
                    self.settings.close_timeout
                );
                session.kill().await
            }
        }
    }
}

async fn close_page<S: BrowserSession>(session: &S, page: S::Page) {
    if let Err(e) = session.close_page(page).await {
        log::debug!("Failed to close page: {}", e);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory browser used by pool and extractor tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    pub struct Counters {
        pub launches: AtomicUsize,
        pub pages_opened: AtomicUsize,
        pub pages_closed: AtomicUsize,
        pub closes: AtomicUsize,
        pub kills: AtomicUsize,
    }

    /// Launcher serving canned documents keyed by URL.
    pub struct FakeLauncher {
        pub counters: Arc<Counters>,
        pub documents: HashMap<String, String>,
        pub fail_launch: bool,
        pub fail_close: bool,
    }

    impl FakeLauncher {
        pub fn new() -> Self {
            Self {
                counters: Arc::new(Counters::default()),
                documents: HashMap::new(),
                fail_launch: false,
                fail_close: false,
            }
        }

        pub fn with_document(mut self, url: &str, html: &str) -> Self {
            self.documents.insert(url.to_string(), html.to_string());
            self
        }
    }

    pub struct FakeSession {
        counters: Arc<Counters>,
        documents: HashMap<String, String>,
        fail_close: bool,
        closed: AtomicBool,
    }

    pub struct FakePage {
        current: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        type Session = FakeSession;

        async fn launch(&self) -> Result<FakeSession> {
            if self.fail_launch {
                return Err(AppError::browser("no browser binary"));
            }
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            Ok(FakeSession {
                counters: Arc::clone(&self.counters),
                documents: self.documents.clone(),
                fail_close: self.fail_close,
                closed: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        type Page = FakePage;

        async fn new_page(&self) -> Result<FakePage> {
            self.counters.pages_opened.fetch_add(1, Ordering::SeqCst);
            Ok(FakePage {
                current: std::sync::Mutex::new(None),
            })
        }

        async fn navigate(&self, page: &FakePage, url: &str) -> Result<()> {
            if self.closed.load(Ordering::SeqCst) {
                return Err(AppError::browser("browser has disconnected"));
            }
            let html = self
                .documents
                .get(url)
                .cloned()
                .ok_or_else(|| AppError::browser(format!("net::ERR_NAME_NOT_RESOLVED {url}")))?;
            *page.current.lock().unwrap() = Some(html);
            Ok(())
        }

        async fn content(&self, page: &FakePage) -> Result<String> {
            page.current
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| AppError::browser("no document"))
        }

        async fn close_page(&self, _page: FakePage) -> Result<()> {
            self.counters.pages_closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self) -> Result<()> {
            self.counters.closes.fetch_add(1, Ordering::SeqCst);
            self.closed.store(true, Ordering::SeqCst);
            if self.fail_close {
                return Err(AppError::browser("target crashed"));
            }
            Ok(())
        }

        async fn kill(&self) -> Result<()> {
            self.counters.kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}

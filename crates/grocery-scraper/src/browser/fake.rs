//! In-memory browser used by adapter tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{BrowserLauncher, BrowserSession};
use crate::error::ScraperError;

#[derive(Debug, Clone, Default)]
pub(crate) struct FakePage {
    pub title: String,
    pub body: String,
    /// Successive DOM snapshots; scrolling or clicking "load more" advances.
    pub sources: Vec<String>,
    /// Selectors that exist on the page and advance the snapshot when clicked.
    pub load_more: Vec<String>,
    /// Selectors whose click errors out, as a detached element would.
    pub broken_clicks: Vec<String>,
    /// Title reads that still report a traffic challenge.
    pub challenge_reads: u32,
    pub location_overlay: bool,
    pub fail_navigation: bool,
}

impl FakePage {
    pub fn html(source: impl Into<String>) -> Self {
        Self {
            title: "Search results".to_string(),
            sources: vec![source.into()],
            ..Self::default()
        }
    }

    pub fn growing(sources: Vec<String>, load_more: &str) -> Self {
        Self {
            title: "Search results".to_string(),
            sources,
            load_more: vec![load_more.to_string()],
            ..Self::default()
        }
    }

    pub fn challenge(reads: u32) -> Self {
        Self {
            title: "Search results".to_string(),
            challenge_reads: reads,
            ..Self::default()
        }
    }

    pub fn location_overlay() -> Self {
        Self {
            title: "IGA Shop".to_string(),
            location_overlay: true,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_navigation: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_broken_click(mut self, css: &str) -> Self {
        self.broken_clicks.push(css.to_string());
        self
    }

    #[must_use]
    pub fn with_challenge(mut self, reads: u32) -> Self {
        self.challenge_reads = reads;
        self
    }
}

#[derive(Debug, Default)]
struct State {
    queued: VecDeque<FakePage>,
    current: FakePage,
    cursor: usize,
    visited: Vec<String>,
    clicks: Vec<String>,
    title_reads: u32,
    opened: u32,
    closed: u32,
    open_now: u32,
    max_open: u32,
    fail_open: bool,
}

/// Shared handle; sessions opened from it all see the same page queue.
#[derive(Clone, Default)]
pub(crate) struct FakeBrowser {
    state: Arc<Mutex<State>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_launch() -> Self {
        let browser = Self::default();
        browser.lock().fail_open = true;
        browser
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake browser state poisoned")
    }

    /// Queue the page the next `goto` lands on.
    pub fn push_page(&self, page: FakePage) {
        self.lock().queued.push_back(page);
    }

    pub fn session(&self) -> FakeSession {
        FakeSession {
            state: Arc::clone(&self.state),
        }
    }

    pub fn visited(&self) -> Vec<String> {
        self.lock().visited.clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.lock().clicks.clone()
    }

    pub fn title_reads(&self) -> u32 {
        self.lock().title_reads
    }

    pub fn opened(&self) -> u32 {
        self.lock().opened
    }

    pub fn closed(&self) -> u32 {
        self.lock().closed
    }

    /// Most sessions ever open at the same time.
    pub fn max_concurrent(&self) -> u32 {
        self.lock().max_open
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, ScraperError> {
        let mut state = self.lock();
        if state.fail_open {
            return Err(ScraperError::Browser {
                command: "new session".to_string(),
                message: "session not created".to_string(),
            });
        }
        state.opened += 1;
        state.open_now += 1;
        state.max_open = state.max_open.max(state.open_now);
        drop(state);
        Ok(Box::new(self.session()))
    }
}

pub(crate) struct FakeSession {
    state: Arc<Mutex<State>>,
}

impl FakeSession {
    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake browser state poisoned")
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        // Navigation suspends, giving concurrent callers a chance to interleave.
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.visited.push(url.to_string());
        let page = state.queued.pop_front().unwrap_or_default();
        if page.fail_navigation {
            return Err(ScraperError::Browser {
                command: "navigate".to_string(),
                message: "timeout: page load timed out".to_string(),
            });
        }
        state.current = page;
        state.cursor = 0;
        Ok(())
    }

    async fn title(&mut self) -> Result<String, ScraperError> {
        let mut state = self.lock();
        state.title_reads += 1;
        if state.current.challenge_reads > 0 {
            state.current.challenge_reads -= 1;
            return Ok("Just a moment...".to_string());
        }
        Ok(state.current.title.clone())
    }

    async fn body_text(&mut self) -> Result<String, ScraperError> {
        let state = self.lock();
        if state.current.location_overlay {
            return Ok("Choose your store to see local prices".to_string());
        }
        Ok(state.current.body.clone())
    }

    async fn page_source(&mut self) -> Result<String, ScraperError> {
        let state = self.lock();
        Ok(state
            .current
            .sources
            .get(state.cursor)
            .cloned()
            .unwrap_or_default())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), ScraperError> {
        let mut state = self.lock();
        if state.cursor + 1 < state.current.sources.len() {
            state.cursor += 1;
        }
        Ok(())
    }

    async fn click_first(&mut self, css: &str) -> Result<bool, ScraperError> {
        let mut state = self.lock();
        state.clicks.push(css.to_string());
        if state.current.broken_clicks.iter().any(|s| s == css) {
            return Err(ScraperError::Browser {
                command: "element click".to_string(),
                message: "stale element reference".to_string(),
            });
        }
        if state.current.location_overlay && css == "button[aria-label='Close']" {
            state.current.location_overlay = false;
            return Ok(true);
        }
        if state.current.load_more.iter().any(|s| s == css)
            && state.cursor + 1 < state.current.sources.len()
        {
            state.cursor += 1;
            return Ok(true);
        }
        Ok(false)
    }

    async fn close(self: Box<Self>) -> Result<(), ScraperError> {
        let mut state = self.lock();
        state.closed += 1;
        state.open_now = state.open_now.saturating_sub(1);
        Ok(())
    }
}

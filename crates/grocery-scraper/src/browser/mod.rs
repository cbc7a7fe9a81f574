//! Browser automation seam used by the browser-driven and static-HTML sources.
//!
//! A [`BrowserLauncher`] opens one exclusively owned [`BrowserSession`] per
//! source run; the run must hand it back through [`release`] on every exit
//! path. Sessions are never shared between runs.

mod challenge;
mod poll;
mod webdriver;

#[cfg(test)]
pub(crate) mod fake;

use async_trait::async_trait;
use grocery_core::StoreId;

use crate::error::ScraperError;

pub use challenge::{detect_interstitial, looks_like_bot_challenge, settle, Interstitial};
pub use poll::{poll_until, PollOutcome, PollPolicy};
pub use webdriver::{WebDriverLauncher, WebDriverSession};

#[async_trait]
pub trait BrowserSession: Send {
    /// Navigate and wait for the document to load.
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError>;

    async fn title(&mut self) -> Result<String, ScraperError>;

    /// Visible text of the document body.
    async fn body_text(&mut self) -> Result<String, ScraperError>;

    /// Serialized DOM as currently rendered.
    async fn page_source(&mut self) -> Result<String, ScraperError>;

    async fn scroll_to_bottom(&mut self) -> Result<(), ScraperError>;

    /// Click the first element matching `css`. Returns `Ok(false)` when
    /// nothing matches.
    async fn click_first(&mut self, css: &str) -> Result<bool, ScraperError>;

    /// End the session and free the remote browser.
    async fn close(self: Box<Self>) -> Result<(), ScraperError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, ScraperError>;
}

/// Open a session for `store`, mapping launch failures to `SourceUnavailable`.
///
/// # Errors
///
/// Returns [`ScraperError::SourceUnavailable`] if the browser cannot be started.
pub async fn acquire(
    launcher: &dyn BrowserLauncher,
    store: StoreId,
) -> Result<Box<dyn BrowserSession>, ScraperError> {
    launcher.open().await.map_err(|e| {
        ScraperError::unavailable(store, format!("could not open browser session: {e}"))
    })
}

/// Close a session, logging instead of failing when the browser is already gone.
pub async fn release(session: Box<dyn BrowserSession>, store: StoreId) {
    if let Err(e) = session.close().await {
        tracing::warn!(store = %store, error = %e, "failed to close browser session");
    }
}

//! Per-store source adapters.
//!
//! Every source implements [`SourceAdapter`]. Adapters own their transport
//! (browser session, HTTP client or catalog file) and report failures as
//! errors from [`SourceAdapter::fetch`]; [`SourceAdapter::search`] is the
//! boundary that turns those errors into an empty, failed [`SourceResult`].

mod aldi;
mod coles;
mod harris;
mod iga;
mod woolworths;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grocery_core::{AppConfig, PaginationTarget, Product, SourceResult, StoreId, StoresFile};
use tokio::sync::{Mutex, MutexGuard};

use crate::browser::{BrowserLauncher, PollPolicy, WebDriverLauncher};
use crate::dom::{CardContext, RawCard};
use crate::error::ScraperError;
use crate::normalize::RunDedup;
use crate::pagination::PaginationController;

pub use aldi::{snap_page_size, AldiAdapter, ACCEPTED_PAGE_SIZES};
pub use coles::ColesAdapter;
pub use harris::HarrisAdapter;
pub use iga::IgaAdapter;
pub use woolworths::WoolworthsAdapter;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn store(&self) -> StoreId;

    /// Pagination used when the caller does not supply one.
    fn default_pagination(&self) -> PaginationTarget;

    /// Run one search against the source.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::SourceUnavailable`] when the source cannot be
    /// reached at all. A failure after at least one page has been collected
    /// ends the run early with the partial results instead.
    async fn fetch(
        &self,
        query: &str,
        pagination: &mut PaginationController,
    ) -> Result<Vec<Product>, ScraperError>;

    /// [`SourceAdapter::fetch`] with every error contained: a failing source
    /// yields an empty result flagged as failed, never an `Err`.
    async fn search(&self, query: &str, pagination: &mut PaginationController) -> SourceResult {
        let store = self.store();
        match self.fetch(query, pagination).await {
            Ok(products) => {
                tracing::info!(
                    store = %store,
                    query,
                    count = products.len(),
                    pages = pagination.pages_fetched(),
                    "source search complete"
                );
                SourceResult::succeeded(store, products)
            }
            Err(e) => {
                tracing::warn!(store = %store, query, error = %e, "source search failed");
                SourceResult::failed(store, e.to_string())
            }
        }
    }

    /// Release long-lived resources. Later calls to `fetch` fail.
    async fn close(&self);
}

/// Serializes runs on one adapter and refuses work after close.
#[derive(Debug, Default)]
pub(crate) struct RunGuard {
    lock: Mutex<()>,
    closed: AtomicBool,
}

impl RunGuard {
    /// Wait for any in-flight run on this adapter to finish, then claim it.
    pub(crate) async fn enter(&self, store: StoreId) -> Result<MutexGuard<'_, ()>, ScraperError> {
        if self.is_closed() {
            return Err(ScraperError::unavailable(store, "adapter has been closed"));
        }
        let guard = self.lock.lock().await;
        if self.is_closed() {
            return Err(ScraperError::unavailable(store, "adapter has been closed"));
        }
        Ok(guard)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Timing and retry knobs shared by every source.
#[derive(Debug, Clone, Copy)]
pub struct SourceTiming {
    /// Pause between successive pages or scroll cycles.
    pub inter_request_delay: Duration,
    pub challenge: PollPolicy,
    pub max_retries: u32,
    pub backoff_base_secs: u64,
}

impl SourceTiming {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            inter_request_delay: Duration::from_millis(config.scraper_inter_request_delay_ms),
            challenge: PollPolicy::new(
                Duration::from_secs(config.challenge_timeout_secs),
                Duration::from_millis(config.challenge_poll_interval_ms),
            ),
            max_retries: config.scraper_max_retries,
            backoff_base_secs: config.scraper_retry_backoff_base_secs,
        }
    }
}

impl Default for SourceTiming {
    fn default() -> Self {
        Self {
            inter_request_delay: Duration::from_millis(1000),
            challenge: PollPolicy::new(Duration::from_secs(30), Duration::from_secs(2)),
            max_retries: 3,
            backoff_base_secs: 2,
        }
    }
}

/// Build one adapter per enabled store.
///
/// All browser-driven sources share a single launcher; each run still opens
/// its own session.
///
/// # Errors
///
/// Returns [`ScraperError::Http`] if an HTTP client cannot be constructed.
pub fn build_adapters(
    config: &AppConfig,
    stores: &StoresFile,
) -> Result<Vec<Arc<dyn SourceAdapter>>, ScraperError> {
    let timing = SourceTiming::from_config(config);
    let launcher: Arc<dyn BrowserLauncher> = Arc::new(WebDriverLauncher::new(
        &config.webdriver_url,
        config.webdriver_token.as_deref(),
        config.browser_headless,
        &config.scraper_user_agent,
        config.scraper_request_timeout_secs,
    )?);

    let mut adapters: Vec<Arc<dyn SourceAdapter>> = Vec::new();
    for settings in stores.enabled() {
        let adapter: Arc<dyn SourceAdapter> = match settings.id {
            StoreId::Woolworths => Arc::new(WoolworthsAdapter::new(
                Arc::clone(&launcher),
                &settings,
                timing,
            )),
            StoreId::Iga => Arc::new(IgaAdapter::new(Arc::clone(&launcher), &settings, timing)),
            StoreId::Harris => Arc::new(HarrisAdapter::new(
                Arc::clone(&launcher),
                &settings,
                timing,
            )),
            StoreId::Aldi => Arc::new(AldiAdapter::new(
                &settings,
                &config.scraper_user_agent,
                config.scraper_request_timeout_secs,
                timing,
            )?),
            StoreId::Coles => Arc::new(ColesAdapter::new(&settings)),
        };
        adapters.push(adapter);
    }

    tracing::debug!(count = adapters.len(), "source adapters built");
    Ok(adapters)
}

/// Convert cards into products, dropping duplicates within the run.
///
/// Cards that fail validation are skipped. Returns the number of products
/// appended to `out`.
pub(crate) fn absorb_cards(
    cards: Vec<RawCard>,
    ctx: &CardContext<'_>,
    dedup: &mut RunDedup,
    out: &mut Vec<Product>,
) -> usize {
    let mut added = 0;
    for card in cards {
        let source_id = card.source_id.clone();
        match card.into_product(ctx) {
            Ok(product) => {
                if dedup.admit(&product, source_id.as_deref()) {
                    out.push(product);
                    added += 1;
                }
            }
            Err(e) => tracing::debug!(store = %ctx.store, error = %e, "skipping product card"),
        }
    }
    added
}

/// Decide what a page-level failure means for the run.
///
/// Before anything has been collected the source is unavailable. Afterwards
/// the run stops and keeps what it has.
pub(crate) fn page_failure(
    store: StoreId,
    page: u32,
    collected: &[Product],
    err: &ScraperError,
) -> Result<(), ScraperError> {
    if collected.is_empty() {
        return Err(ScraperError::unavailable(
            store,
            format!("page {page} failed: {err}"),
        ));
    }
    tracing::warn!(
        store = %store,
        page,
        kept = collected.len(),
        error = %err,
        "page failed, keeping products collected so far"
    );
    Ok(())
}

pub(crate) fn encode_query(query: &str) -> String {
    percent_encoding::utf8_percent_encode(query.trim(), percent_encoding::NON_ALPHANUMERIC)
        .to_string()
}

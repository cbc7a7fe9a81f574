//! Woolworths: browser-rendered search results revealed by "load more" or
//! infinite scroll.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use grocery_core::{PaginationTarget, Product, StoreId, StoreSettings};

use super::{absorb_cards, encode_query, page_failure, RunGuard, SourceAdapter, SourceTiming};
use crate::browser::{self, BrowserLauncher, BrowserSession};
use crate::dom::{extract_cards, CardContext, CardSelectors};
use crate::error::ScraperError;
use crate::normalize::RunDedup;
use crate::pagination::PaginationController;

const SELECTORS: CardSelectors = CardSelectors {
    containers: &[
        "wc-product-tile",
        "shared-product-tile",
        "[class*='product-tile-v2']",
        "[class*='ProductTile']",
        "[class*='product-tile']",
        "a[href*='/shop/productdetails/']",
    ],
    title: &[
        ".product-title-link",
        "[class*='product-title']",
        "[class*='title']",
        "h3",
    ],
    price: &[],
    link: &["a[href*='/productdetails/']", "a[href]"],
    image: &["img"],
    brand: &[],
    category: &[],
    special_badge: &[
        "[class*='price-was']",
        "[class*='was-price']",
        "[class*='promotion']",
        "[class*='special']",
    ],
    out_of_stock: &["[class*='unavailable']", "[class*='out-of-stock']"],
    id_attributes: &["data-stockcode", "data-product-id"],
};

const LOAD_MORE_SELECTORS: &[&str] = &[
    "button.load-more",
    "[class*='load-more'] button",
    "button[class*='loadMore']",
    "[data-testid='load-more']",
];

pub struct WoolworthsAdapter {
    launcher: Arc<dyn BrowserLauncher>,
    base_url: String,
    pagination: PaginationTarget,
    timing: SourceTiming,
    guard: RunGuard,
}

impl WoolworthsAdapter {
    #[must_use]
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        settings: &StoreSettings,
        timing: SourceTiming,
    ) -> Self {
        Self {
            launcher,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            pagination: settings.default_pagination(),
            timing,
            guard: RunGuard::default(),
        }
    }

    fn search_url(&self, query: &str) -> String {
        format!(
            "{}/shop/search/products?searchTerm={}",
            self.base_url,
            encode_query(query)
        )
    }

    /// Reveal the next batch: click a load-more control, else scroll.
    ///
    /// A click that errors counts as no click; only a failed scroll is fatal.
    async fn advance(session: &mut dyn BrowserSession) -> Result<(), ScraperError> {
        for selector in LOAD_MORE_SELECTORS {
            match session.click_first(selector).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => tracing::debug!(
                    store = %StoreId::Woolworths,
                    selector,
                    error = %e,
                    "load-more click failed"
                ),
            }
        }
        session.scroll_to_bottom().await
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        query: &str,
        pagination: &mut PaginationController,
    ) -> Result<Vec<Product>, ScraperError> {
        let store = StoreId::Woolworths;
        session
            .goto(&self.search_url(query))
            .await
            .map_err(|e| ScraperError::unavailable(store, format!("navigation failed: {e}")))?;
        browser::settle(session, store, &self.timing.challenge).await;

        let ctx = CardContext {
            store,
            query,
            base_url: &self.base_url,
            scraped_at: Utc::now(),
        };
        let mut products = Vec::new();
        let mut dedup = RunDedup::new();
        let mut last_card_count = None;

        while let Some(cycle) = pagination.next_page(&products).await {
            if cycle > 1 {
                if let Err(e) = Self::advance(session).await {
                    page_failure(store, cycle, &products, &e)?;
                    break;
                }
                tokio::time::sleep(self.timing.inter_request_delay).await;
            }

            let html = match session.page_source().await {
                Ok(html) => html,
                Err(e) => {
                    page_failure(store, cycle, &products, &e)?;
                    break;
                }
            };
            let cards = extract_cards(&html, &SELECTORS);
            let card_count = cards.len();
            let added = absorb_cards(cards, &ctx, &mut dedup, &mut products);
            tracing::debug!(store = %store, cycle, card_count, added, "woolworths cycle extracted");

            // Two identical readings in a row mean the list stopped growing.
            if card_count == 0 || last_card_count == Some(card_count) {
                pagination.mark_exhausted();
            }
            last_card_count = Some(card_count);
        }

        Ok(products)
    }
}

#[async_trait]
impl SourceAdapter for WoolworthsAdapter {
    fn store(&self) -> StoreId {
        StoreId::Woolworths
    }

    fn default_pagination(&self) -> PaginationTarget {
        self.pagination
    }

    async fn fetch(
        &self,
        query: &str,
        pagination: &mut PaginationController,
    ) -> Result<Vec<Product>, ScraperError> {
        let store = self.store();
        let _run = self.guard.enter(store).await?;
        let mut session = browser::acquire(self.launcher.as_ref(), store).await?;
        let result = self.run(session.as_mut(), query, pagination).await;
        browser::release(session, store).await;
        result.map(|products| pagination.finish(products))
    }

    async fn close(&self) {
        self.guard.close();
    }
}

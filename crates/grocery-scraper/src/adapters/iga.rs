//! IGA: numbered search result pages behind a store-location overlay.

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
        "[data-testid='product-card']",
        "[class*='ProductCard']",
        "div[class*='product-card']",
        "a[href*='/product/']",
    ],
    title: &[
        "[data-testid='product-title']",
        "[class*='ProductCard_title']",
        "[class*='title']",
        "h3",
    ],
    price: &[],
    link: &["a[href*='/product/']", "a[href]"],
    image: &["img"],
    brand: &["[data-testid='product-brand']", "[class*='brand']"],
    category: &[],
    special_badge: &["[data-badge='special']", "[class*='special']", "[class*='Special']"],
    out_of_stock: &["[class*='unavailable']", "[class*='out-of-stock']"],
    id_attributes: &["data-product-id", "data-sku"],
};

pub struct IgaAdapter {
    launcher: Arc<dyn BrowserLauncher>,
    base_url: String,
    pagination: PaginationTarget,
    timing: SourceTiming,
    guard: RunGuard,
}

impl IgaAdapter {
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

    fn page_url(&self, query: &str, page: u32) -> String {
        format!("{}/search/{page}?q={}", self.base_url, encode_query(query))
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        query: &str,
        pagination: &mut PaginationController,
    ) -> Result<Vec<Product>, ScraperError> {
        let store = StoreId::Iga;
        let ctx = CardContext {
            store,
            query,
            base_url: &self.base_url,
            scraped_at: Utc::now(),
        };
        let mut products = Vec::new();
        let mut dedup = RunDedup::new();

        while let Some(page) = pagination.next_page(&products).await {
            if page > 1 {
                tokio::time::sleep(self.timing.inter_request_delay).await;
            }

            if let Err(e) = session.goto(&self.page_url(query, page)).await {
                page_failure(store, page, &products, &e)?;
                break;
            }
            browser::settle(session, store, &self.timing.challenge).await;

            let html = match session.page_source().await {
                Ok(html) => html,
                Err(e) => {
                    page_failure(store, page, &products, &e)?;
                    break;
                }
            };
            let cards = extract_cards(&html, &SELECTORS);
            let card_count = cards.len();
            let added = absorb_cards(cards, &ctx, &mut dedup, &mut products);
            tracing::debug!(store = %store, page, card_count, added, "iga page extracted");

            if added == 0 {
                pagination.mark_exhausted();
            }
        }

        Ok(products)
    }
}

#[async_trait]
impl SourceAdapter for IgaAdapter {
    fn store(&self) -> StoreId {
        StoreId::Iga
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

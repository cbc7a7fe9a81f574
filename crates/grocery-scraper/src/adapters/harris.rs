//! Harris Farm: server-rendered result pages parsed as static HTML.
//!
//! The browser is only used to get past the storefront's traffic check; no
//! scrolling or clicking happens on result pages.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use grocery_core::{PaginationTarget, Product, StoreId, StoreSettings};

use super::{absorb_cards, encode_query, page_failure, RunGuard, SourceAdapter, SourceTiming};
use crate::browser::{self, looks_like_bot_challenge, BrowserLauncher, BrowserSession};
use crate::dom::{extract_cards, CardContext, CardSelectors};
use crate::error::ScraperError;
use crate::normalize::RunDedup;
use crate::pagination::PaginationController;

const SELECTORS: CardSelectors = CardSelectors {
    containers: &[
        ".product-card",
        ".product-item",
        "[class*='product-card']",
        "[class*='ProductCard']",
        "[class*='product']",
        "a[href*='/product']",
    ],
    title: &[
        ".product-title",
        "[class*='title']",
        "[class*='name']",
        "h3",
        "h2",
    ],
    price: &[],
    link: &["a[href*='/products/']", "a[href]"],
    image: &["img"],
    brand: &["[class*='vendor']", "[class*='brand']"],
    category: &["[class*='category']"],
    special_badge: &["[class*='badge--sale']", "[class*='on-sale']", "[class*='sale']"],
    out_of_stock: &[
        "[class*='sold-out']",
        "[class*='out-of-stock']",
        "[class*='unavailable']",
    ],
    id_attributes: &["data-product-id", "data-id"],
};

pub struct HarrisAdapter {
    launcher: Arc<dyn BrowserLauncher>,
    base_url: String,
    pagination: PaginationTarget,
    timing: SourceTiming,
    guard: RunGuard,
}

impl HarrisAdapter {
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
        format!(
            "{}/search?q={}&type=product&page={page}",
            self.base_url,
            encode_query(query)
        )
    }

    /// Load one result page and return its HTML once any challenge has cleared.
    async fn load_page(
        &self,
        session: &mut dyn BrowserSession,
        url: &str,
    ) -> Result<String, ScraperError> {
        let store = StoreId::Harris;
        session.goto(url).await?;
        browser::settle(session, store, &self.timing.challenge).await;
        let html = session.page_source().await?;
        if looks_like_bot_challenge(&html) {
            tracing::warn!(store = %store, url, "result page is still a challenge page");
            return Ok(String::new());
        }
        Ok(html)
    }

    async fn run(
        &self,
        session: &mut dyn BrowserSession,
        query: &str,
        pagination: &mut PaginationController,
    ) -> Result<Vec<Product>, ScraperError> {
        let store = StoreId::Harris;
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

            let html = match self.load_page(session, &self.page_url(query, page)).await {
                Ok(html) => html,
                Err(e) => {
                    page_failure(store, page, &products, &e)?;
                    break;
                }
            };
            let cards = extract_cards(&html, &SELECTORS);
            let card_count = cards.len();
            let added = absorb_cards(cards, &ctx, &mut dedup, &mut products);
            tracing::debug!(store = %store, page, card_count, added, "harris page parsed");

            if added == 0 {
                pagination.mark_exhausted();
            }
        }

        Ok(products)
    }
}

#[async_trait]
impl SourceAdapter for HarrisAdapter {
    fn store(&self) -> StoreId {
        StoreId::Harris
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_support::{instant_timing, page};
    use crate::browser::fake::{FakeBrowser, FakePage};

    fn adapter(browser: &FakeBrowser, pages: u32) -> HarrisAdapter {
        let settings = StoreSettings {
            pagination: Some(PaginationTarget::Pages(pages)),
            ..StoreSettings::builtin(StoreId::Harris)
        };
        HarrisAdapter::new(Arc::new(browser.clone()), &settings, instant_timing())
    }

    fn harris_card(title: &str, price_html: &str, extra_class: &str) -> String {
        format!(
            r#"<div class="product-card {extra_class}"><a href="/products/{slug}"><img src="//cdn.harris.test/{slug}.jpg" alt="{title}"></a><p class="product-title">{title}</p><div class="price">{price_html}</div></div>"#,
            slug = title.to_lowercase().replace(' ', "-"),
        )
    }

    #[tokio::test]
    async fn parses_static_cards_with_sale_pricing() {
        let browser = FakeBrowser::new();
        browser.push_page(FakePage::html(page(&[
            harris_card("Organic Bananas", "$4.99 / kg", ""),
            harris_card(
                "Greek Yoghurt 1kg",
                "Was $8.00 Now $6.00",
                "badge--sale",
            ),
        ])));
        let adapter = adapter(&browser, 1);
        let mut pagination = PaginationController::new(adapter.default_pagination());

        let products = adapter.fetch("yoghurt", &mut pagination).await.unwrap();

        assert_eq!(products.len(), 2);
        let bananas = &products[0];
        assert_eq!(bananas.store, "Harris Farm");
        assert_eq!(bananas.image_url, "https://cdn.harris.test/organic-bananas.jpg");
        assert_eq!(
            bananas.product_url,
            "https://www.harrisfarm.com.au/products/organic-bananas"
        );

        let yoghurt = &products[1];
        assert_eq!(yoghurt.price, "$8.00");
        assert_eq!(yoghurt.discounted_price, "$6.00");
        assert_eq!(yoghurt.discount, "Save $2.00");
        assert!((yoghurt.numeric_price - 6.0).abs() < f64::EPSILON);
        assert!(browser.visited()[0].ends_with("&page=1"));
    }

    #[tokio::test]
    async fn challenge_page_yields_no_products_without_failing() {
        let browser = FakeBrowser::new();
        browser.push_page(FakePage::html(
            "<html><head><title>Just a moment...</title></head><body>Your connection needs to be verified</body></html>",
        ));
        let adapter = adapter(&browser, 2);
        let mut pagination = PaginationController::new(adapter.default_pagination());

        let result = adapter.search("apples", &mut pagination).await;

        assert!(result.success);
        assert!(result.products.is_empty());
        assert_eq!(browser.visited().len(), 1);
    }

    #[tokio::test]
    async fn walks_numbered_pages_up_to_the_limit() {
        let browser = FakeBrowser::new();
        browser.push_page(FakePage::html(page(&[harris_card("Apple Pink Lady", "$5.90", "")])));
        browser.push_page(FakePage::html(page(&[harris_card("Apple Granny Smith", "$4.90", "")])));
        browser.push_page(FakePage::html(page(&[harris_card("Apple Royal Gala", "$4.50", "")])));
        let adapter = adapter(&browser, 2);
        let mut pagination = PaginationController::new(adapter.default_pagination());

        let products = adapter.fetch("apple", &mut pagination).await.unwrap();

        assert_eq!(products.len(), 2);
        let visited = browser.visited();
        assert_eq!(visited.len(), 2);
        assert!(visited[1].ends_with("&page=2"));
    }
}

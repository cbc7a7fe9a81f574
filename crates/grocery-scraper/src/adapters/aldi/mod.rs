//! ALDI: JSON product-search API paged by offset.

mod types;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grocery_core::{PaginationTarget, Product, StoreId, StoreSettings};
use reqwest::Client;

use super::{page_failure, RunGuard, SourceAdapter, SourceTiming};
use crate::error::ScraperError;
use crate::extract::parse_amount;
use crate::normalize::{ProductDraft, RunDedup};
use crate::pagination::PaginationController;
use crate::rate_limit::retry_with_backoff;

pub use types::{AldiAsset, AldiProduct, AldiSearchResponse};

/// Page sizes the search endpoint accepts; anything else is rejected.
pub const ACCEPTED_PAGE_SIZES: [u32; 7] = [12, 16, 24, 30, 32, 48, 60];

const DEFAULT_SERVICE_POINT: &str = "G452";
const PRODUCT_SITE: &str = "https://www.aldi.com.au/product";
const IMAGE_WIDTH: &str = "300";
const FRONT_OF_PACK: &str = "FR01";

/// Closest accepted page size to `requested`; ties go to the smaller size.
#[must_use]
pub fn snap_page_size(requested: u32) -> u32 {
    ACCEPTED_PAGE_SIZES
        .into_iter()
        .min_by_key(|size| size.abs_diff(requested))
        .unwrap_or(ACCEPTED_PAGE_SIZES[0])
}

pub struct AldiAdapter {
    client: Client,
    base_url: String,
    service_point: String,
    page_size: u32,
    pagination: PaginationTarget,
    timing: SourceTiming,
    guard: RunGuard,
}

impl AldiAdapter {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the HTTP client cannot be constructed.
    pub fn new(
        settings: &StoreSettings,
        user_agent: &str,
        timeout_secs: u64,
        timing: SourceTiming,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;

        let requested = settings.page_size.unwrap_or(30);
        let page_size = snap_page_size(requested);
        if page_size != requested {
            tracing::info!(requested, page_size, "adjusted ALDI page size to an accepted value");
        }

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            service_point: settings
                .service_point
                .clone()
                .unwrap_or_else(|| DEFAULT_SERVICE_POINT.to_string()),
            page_size,
            pagination: settings.default_pagination(),
            timing,
            guard: RunGuard::default(),
        })
    }

    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Fetch one page of search results, retrying transient failures.
    async fn fetch_page(&self, query: &str, offset: u64) -> Result<AldiSearchResponse, ScraperError> {
        let url = format!("{}/v3/product-search", self.base_url);
        let limit = self.page_size.to_string();
        let offset = offset.to_string();

        retry_with_backoff(
            self.timing.max_retries,
            self.timing.backoff_base_secs,
            || {
                let url = url.clone();
                let params = [
                    ("currency", "AUD"),
                    ("serviceType", "walk-in"),
                    ("q", query),
                    ("limit", limit.as_str()),
                    ("offset", offset.as_str()),
                    ("sort", "relevance"),
                    ("testVariant", "A"),
                    ("servicePoint", self.service_point.as_str()),
                ];
                async move {
                    let response = self.client.get(&url).query(&params).send().await?;
                    let status = response.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after_secs = response
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok())
                            .unwrap_or(60);
                        return Err(ScraperError::RateLimited {
                            domain: domain_of(&url),
                            retry_after_secs,
                        });
                    }
                    if !status.is_success() {
                        return Err(ScraperError::UnexpectedStatus {
                            status: status.as_u16(),
                            url,
                        });
                    }

                    let body = response.text().await?;
                    serde_json::from_str::<AldiSearchResponse>(&body).map_err(|e| {
                        ScraperError::Deserialize {
                            context: "ALDI product search".to_string(),
                            source: e,
                        }
                    })
                }
            },
        )
        .await
    }
}

fn domain_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

/// Image template with placeholders filled, preferring the front-of-pack shot.
fn image_url(item: &AldiProduct) -> String {
    let with_url = || item.assets.iter().filter(|a| a.url.is_some());
    let template = with_url()
        .find(|a| a.asset_type.as_deref() == Some(FRONT_OF_PACK))
        .or_else(|| with_url().next())
        .and_then(|a| a.url.as_deref());
    let slug = item.url_slug_text.as_deref().unwrap_or_default();
    template.map_or_else(String::new, |url| {
        url.replace("{width}", IMAGE_WIDTH).replace("{slug}", slug)
    })
}

fn product_url(item: &AldiProduct) -> String {
    match (item.url_slug_text.as_deref(), item.sku.as_deref()) {
        (Some(slug), Some(sku)) if !slug.is_empty() && !sku.is_empty() => {
            format!("{PRODUCT_SITE}/{slug}-{sku}")
        }
        _ => String::new(),
    }
}

/// Map one API item to a product.
///
/// A reduced item shows its was-price as `price` and as the `discount` label,
/// with the shelf price as `discountedPrice`.
///
/// # Errors
///
/// Returns [`ScraperError::ExtractionMismatch`] when the item has no name.
pub fn map_product(
    item: &AldiProduct,
    query: &str,
    scraped_at: DateTime<Utc>,
) -> Result<Product, ScraperError> {
    let name = item
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or(ScraperError::ExtractionMismatch { field: "name" })?;

    let current = item
        .price
        .amount_relevant_display
        .as_deref()
        .unwrap_or_default()
        .trim()
        .to_string();
    let was = item
        .price
        .was_price_display
        .as_deref()
        .map(str::trim)
        .filter(|w| !w.is_empty());

    let mut draft = ProductDraft::new(StoreId::Aldi, name, query);
    if let Some(was) = was {
        draft.price = was.to_string();
        draft.discounted_price.clone_from(&current);
        draft.discount = was.to_string();
    } else {
        draft.price.clone_from(&current);
    }
    draft.numeric_price = parse_amount(&current);
    draft.unit_price = item
        .price
        .comparison_display
        .clone()
        .or_else(|| item.selling_size.clone())
        .unwrap_or_default();
    draft.image_url = image_url(item);
    draft.product_url = product_url(item);
    draft.brand = item.brand_name.clone().unwrap_or_default();
    draft.category = item
        .categories
        .iter()
        .find_map(|c| c.name.clone())
        .unwrap_or_default();
    draft.in_stock = !item.not_for_sale;

    draft.finish(scraped_at)
}

#[async_trait]
impl SourceAdapter for AldiAdapter {
    fn store(&self) -> StoreId {
        StoreId::Aldi
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
        let scraped_at = Utc::now();
        let mut products = Vec::new();
        let mut dedup = RunDedup::new();
        let mut offset = 0u64;

        while let Some(page) = pagination.next_page(&products).await {
            if page > 1 {
                tokio::time::sleep(self.timing.inter_request_delay).await;
            }

            let response = match self.fetch_page(query.trim(), offset).await {
                Ok(response) => response,
                Err(e) => {
                    page_failure(store, page, &products, &e)?;
                    break;
                }
            };

            let total = response.meta.pagination.total_count;
            let batch = response.data.len();
            for raw in response.data {
                let item = match serde_json::from_value::<AldiProduct>(raw) {
                    Ok(item) => item,
                    Err(e) => {
                        tracing::debug!(store = %store, error = %e, "skipping malformed ALDI item");
                        continue;
                    }
                };
                match map_product(&item, query, scraped_at) {
                    Ok(product) => {
                        if dedup.admit(&product, item.sku.as_deref()) {
                            products.push(product);
                        }
                    }
                    Err(e) => tracing::debug!(store = %store, error = %e, "skipping ALDI item"),
                }
            }
            tracing::debug!(store = %store, page, offset, batch, total, "aldi page fetched");

            offset += u64::from(self.page_size);
            if batch == 0 || offset >= total {
                pagination.mark_exhausted();
            }
        }

        Ok(pagination.finish(products))
    }

    async fn close(&self) {
        self.guard.close();
    }
}

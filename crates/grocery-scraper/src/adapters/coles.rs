//! Coles: a previously merged product catalog read from local disk.
//!
//! The parsed catalog is kept in memory and reloaded whenever the file's
//! modification time changes. Pagination is a pure slice over the matches.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use grocery_core::{PaginationTarget, Product, StoreId, StoreSettings};
use serde::{Deserialize, Deserializer};
use tokio::sync::Mutex;

use super::{RunGuard, SourceAdapter};
use crate::error::ScraperError;
use crate::extract::format_amount;
use crate::normalize::{ProductDraft, RunDedup, UNSPECIFIED_SAVING};
use crate::pagination::PaginationController;

/// Items per catalog "page" when a run is page-bounded.
const CATALOG_PAGE_SIZE: usize = 24;
const DEFAULT_BRAND: &str = "Coles";

/// One record of the merged catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRecord {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub current_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub original_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub discount_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub discount_percentage: Option<f64>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub product_url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub weight_size: Option<String>,
    #[serde(default)]
    pub per_unit_price: Option<String>,
}

/// The merge step writes numbers, but older files carry `"$4.50"` strings.
fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) if n.is_finite() => Some(n),
        Some(Raw::Text(s)) => s.trim().trim_start_matches('$').replace(',', "").parse().ok(),
        _ => None,
    })
}

/// Records stay raw here so a bad record is dropped on its own.
#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Records(Vec<serde_json::Value>),
    Wrapped { products: Vec<serde_json::Value> },
}

struct CachedCatalog {
    modified: SystemTime,
    records: Arc<Vec<CatalogRecord>>,
}

impl CatalogRecord {
    fn title(&self) -> &str {
        self.title.as_deref().unwrap_or_default()
    }

    fn has_discount(&self) -> bool {
        self.original_price.is_some()
            || self.discount_amount.is_some()
            || self.discount_percentage.is_some()
            || self
                .per_unit_price
                .as_deref()
                .is_some_and(|u| u.to_lowercase().contains("was"))
    }

    /// Build the canonical product, applying the discount rule to the
    /// catalog's specials fields.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ExtractionMismatch`] when the title is blank.
    pub fn to_product(&self, query: &str, scraped_at: DateTime<Utc>) -> Result<Product, ScraperError> {
        let mut draft = ProductDraft::new(StoreId::Coles, self.title(), query);
        let current = self.current_price.filter(|p| *p > 0.0);
        let current_display = current.map(format_amount).unwrap_or_default();

        let saving = match (self.original_price, current) {
            (Some(original), Some(current)) if original > current => Some(original - current),
            _ => self.discount_amount.filter(|d| *d > 0.0),
        };

        match (saving, current) {
            (Some(saving), Some(current)) => {
                draft.price = format_amount(self.original_price.unwrap_or(current + saving));
                draft.discounted_price.clone_from(&current_display);
                draft.discount = format!("Save {}", format_amount(saving));
            }
            _ if self.has_discount() && current.is_some() => {
                draft.price.clone_from(&current_display);
                draft.discounted_price.clone_from(&current_display);
                draft.discount = match self.discount_percentage.filter(|p| *p > 0.0) {
                    Some(pct) => format!("{pct:.0}% off"),
                    None => UNSPECIFIED_SAVING.to_string(),
                };
            }
            _ => draft.price.clone_from(&current_display),
        }
        draft.numeric_price = current;

        draft.unit_price = self
            .per_unit_price
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .or(self.weight_size.as_deref())
            .unwrap_or_default()
            .to_string();
        draft.image_url = self.image_url.clone().unwrap_or_default();
        draft.product_url = self.product_url.clone().unwrap_or_default();
        draft.category = self.category.clone().unwrap_or_default();
        draft.brand = self
            .brand
            .clone()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BRAND.to_string());

        draft.finish(scraped_at)
    }
}

pub struct ColesAdapter {
    path: PathBuf,
    pagination: PaginationTarget,
    cache: Mutex<Option<CachedCatalog>>,
    guard: RunGuard,
}

impl ColesAdapter {
    #[must_use]
    pub fn new(settings: &StoreSettings) -> Self {
        Self {
            path: settings
                .catalog_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("./generated/coles_merged_products.json")),
            pagination: settings.default_pagination(),
            cache: Mutex::new(None),
            guard: RunGuard::default(),
        }
    }

    #[must_use]
    pub fn catalog_path(&self) -> &Path {
        &self.path
    }

    /// The parsed catalog, reloaded only when the file has changed on disk.
    async fn catalog(&self) -> Result<Arc<Vec<CatalogRecord>>, ScraperError> {
        let store = StoreId::Coles;
        let metadata = tokio::fs::metadata(&self.path).await.map_err(|e| {
            ScraperError::unavailable(
                store,
                format!("catalog {} not readable: {e}", self.path.display()),
            )
        })?;
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);

        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.modified == modified {
                return Ok(Arc::clone(&cached.records));
            }
        }

        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            ScraperError::unavailable(
                store,
                format!("catalog {} not readable: {e}", self.path.display()),
            )
        })?;
        let parsed: CatalogFile =
            serde_json::from_slice(&bytes).map_err(|e| ScraperError::Catalog {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        let raw = match parsed {
            CatalogFile::Records(raw) | CatalogFile::Wrapped { products: raw } => raw,
        };
        let total = raw.len();
        let records: Arc<Vec<CatalogRecord>> = Arc::new(
            raw.into_iter()
                .enumerate()
                .filter_map(|(index, value)| {
                    serde_json::from_value(value)
                        .map_err(|e| {
                            tracing::debug!(
                                store = %store,
                                index,
                                error = %e,
                                "skipping malformed catalog record"
                            );
                        })
                        .ok()
                })
                .collect(),
        );

        tracing::info!(
            path = %self.path.display(),
            records = records.len(),
            skipped = total - records.len(),
            "coles catalog loaded"
        );
        *cache = Some(CachedCatalog {
            modified,
            records: Arc::clone(&records),
        });
        Ok(records)
    }
}

#[async_trait]
impl SourceAdapter for ColesAdapter {
    fn store(&self) -> StoreId {
        StoreId::Coles
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
        let records = self.catalog().await?;
        let needle = query.trim().to_lowercase();
        let scraped_at = Utc::now();

        let mut dedup = RunDedup::new();
        let matches: Vec<Product> = records
            .iter()
            .filter(|r| r.title().to_lowercase().contains(&needle))
            .filter_map(|r| match r.to_product(query, scraped_at) {
                Ok(product) => Some(product),
                Err(e) => {
                    tracing::debug!(store = %store, error = %e, "skipping catalog record");
                    None
                }
            })
            .filter(|p| dedup.admit(p, None))
            .collect();

        let mut products = Vec::new();
        while let Some(page) = pagination.next_page(&products).await {
            let start = usize::try_from(page - 1)
                .unwrap_or(usize::MAX)
                .saturating_mul(CATALOG_PAGE_SIZE);
            let Some(slice) = matches.get(start..) else {
                pagination.mark_exhausted();
                break;
            };
            let slice = &slice[..slice.len().min(CATALOG_PAGE_SIZE)];
            if slice.is_empty() {
                pagination.mark_exhausted();
                break;
            }
            products.extend_from_slice(slice);
        }

        Ok(pagination.finish(products))
    }

    async fn close(&self) {
        self.guard.close();
        *self.cache.lock().await = None;
    }
}

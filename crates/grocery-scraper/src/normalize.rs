//! Assembly of canonical [`grocery_core::Product`] records.
//!
//! Every source funnels its extracted fields through [`ProductDraft::finish`],
//! which is the only place the product invariants are enforced.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use grocery_core::{Product, StoreId, PRICE_SENTINEL};

use crate::error::ScraperError;
use crate::extract::{format_amount, infer_brand, parse_amount, PriceExtraction, Saving};

/// Titles longer than this are cut down to [`LONG_TITLE_WORDS`] words.
const MAX_TITLE_CHARS: usize = 80;
const LONG_TITLE_WORDS: usize = 6;

/// Label used when a source marks an item as on special without a saving amount.
pub const UNSPECIFIED_SAVING: &str = "Special";

/// Mutable staging record for one item; consumed by [`ProductDraft::finish`].
#[derive(Debug, Clone)]
pub struct ProductDraft {
    pub store: StoreId,
    pub title: String,
    pub price: String,
    pub discounted_price: String,
    pub discount: String,
    /// Explicit effective price. When `None` it is parsed from the display fields.
    pub numeric_price: Option<f64>,
    pub in_stock: bool,
    pub unit_price: String,
    pub image_url: String,
    pub product_url: String,
    pub brand: String,
    pub category: String,
    pub source_query: String,
}

impl ProductDraft {
    #[must_use]
    pub fn new(store: StoreId, title: impl Into<String>, source_query: impl Into<String>) -> Self {
        Self {
            store,
            title: title.into(),
            price: String::new(),
            discounted_price: String::new(),
            discount: String::new(),
            numeric_price: None,
            in_stock: true,
            unit_price: String::new(),
            image_url: String::new(),
            product_url: String::new(),
            brand: String::new(),
            category: String::new(),
            source_query: source_query.into(),
        }
    }

    /// Fill the price fields from a heuristic extraction.
    #[must_use]
    pub fn with_extraction(mut self, extraction: &PriceExtraction) -> Self {
        let current = extraction.current.map(format_amount).unwrap_or_default();
        match (extraction.saving, extraction.original) {
            (Saving::Amount(saved), Some(original)) => {
                self.price = format_amount(original);
                self.discounted_price = current;
                self.discount = format!("Save {}", format_amount(saved));
            }
            (Saving::Amount(_) | Saving::Unspecified, _) if !current.is_empty() => {
                self.price.clone_from(&current);
                self.discounted_price = current;
                self.discount = UNSPECIFIED_SAVING.to_string();
            }
            _ => self.price = current,
        }
        self.numeric_price = extraction.current;
        if let Some(unit_price) = &extraction.unit_price {
            self.unit_price.clone_from(unit_price);
        }
        self
    }

    /// Validate and freeze the draft.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::ExtractionMismatch`] when the title is blank.
    pub fn finish(self, scraped_at: DateTime<Utc>) -> Result<Product, ScraperError> {
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return Err(ScraperError::ExtractionMismatch { field: "title" });
        }

        let price = self.price.trim().to_string();
        let mut discounted_price = self.discounted_price.trim().to_string();
        let mut discount = self.discount.trim().to_string();
        if !discount.is_empty() && discounted_price.is_empty() {
            if price.is_empty() {
                discount.clear();
            } else {
                discounted_price.clone_from(&price);
            }
        }

        let numeric_price = self
            .numeric_price
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or_else(|| {
                let effective = if discounted_price.is_empty() {
                    &price
                } else {
                    &discounted_price
                };
                numeric_price(effective)
            });

        let brand = match self.brand.trim() {
            "" => infer_brand(&title).unwrap_or_default(),
            known => known.to_string(),
        };

        Ok(Product {
            store: self.store.display_name().to_string(),
            price,
            discounted_price,
            discount,
            numeric_price,
            in_stock: self.in_stock,
            unit_price: self.unit_price.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
            product_url: self.product_url.trim().to_string(),
            brand,
            category: collapse_whitespace(&self.category),
            scraped_at,
            source_query: self.source_query,
            title,
        })
    }
}

/// Numeric value of a display price, or [`PRICE_SENTINEL`] if it has no amount.
#[must_use]
pub fn numeric_price(display: &str) -> f64 {
    parse_amount(display).unwrap_or(PRICE_SENTINEL)
}

/// Tidy a scraped product name: drop a trailing price fragment and cut
/// overlong card text down to its first few words.
#[must_use]
pub fn clean_title(raw: &str) -> String {
    let without_price = raw.split('$').next().unwrap_or(raw);
    let collapsed = collapse_whitespace(without_price);
    if collapsed.chars().count() > MAX_TITLE_CHARS {
        collapsed
            .split(' ')
            .take(LONG_TITLE_WORDS)
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        collapsed
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized identity of a product within one source run.
#[must_use]
pub fn dedup_key(product: &Product, source_id: Option<&str>) -> String {
    match source_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => format!("id:{id}"),
        None => format!(
            "{}-{:.2}",
            product.title.trim().to_lowercase(),
            product.numeric_price
        ),
    }
}

/// Tracks keys already emitted during one adapter run.
#[derive(Debug, Default)]
pub struct RunDedup {
    seen: HashSet<String>,
}

impl RunDedup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time a product's key is seen.
    pub fn admit(&mut self, product: &Product, source_id: Option<&str>) -> bool {
        self.seen.insert(dedup_key(product, source_id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Resolve a possibly relative or protocol-relative `href` against `base`.
#[must_use]
pub fn absolutize_url(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href.starts_with("http://") || href.starts_with("https://") {
        return href.to_string();
    }
    if let Some(rest) = href.strip_prefix("//") {
        return format!("https://{rest}");
    }
    let base = base.trim_end_matches('/');
    if href.starts_with('/') {
        format!("{base}{href}")
    } else {
        format!("{base}/{href}")
    }
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;

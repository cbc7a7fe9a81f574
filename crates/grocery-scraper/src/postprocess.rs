//! Composable operations over merged product lists, plus the paged superset
//! that serves "load more" without re-fetching.

use std::cmp::Ordering;
use std::collections::HashSet;

use grocery_core::{Product, StoreBreakdown};

use crate::normalize::dedup_key;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Sort by `numeric_price`. Unpriced items trail in both directions.
pub fn sort_by_price(products: &mut [Product], order: SortOrder) {
    products.sort_by(|a, b| compare_price(a.numeric_price, b.numeric_price, order));
}

fn compare_price(a: f64, b: f64, order: SortOrder) -> Ordering {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => match order {
            SortOrder::Ascending => a.total_cmp(&b),
            SortOrder::Descending => b.total_cmp(&a),
        },
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => Ordering::Equal,
    }
}

/// Drop repeats across sources, keeping the first occurrence.
///
/// The same title at the same price from two different retailers is two
/// offers, so the store is part of the key.
#[must_use]
pub fn dedup_products(products: Vec<Product>) -> Vec<Product> {
    let mut seen = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(format!("{}|{}", p.store.to_lowercase(), dedup_key(p, None))))
        .collect()
}

#[must_use]
pub fn filter_in_stock(products: Vec<Product>) -> Vec<Product> {
    products.into_iter().filter(|p| p.in_stock).collect()
}

#[must_use]
pub fn filter_discounted(products: Vec<Product>) -> Vec<Product> {
    products.into_iter().filter(Product::is_discounted).collect()
}

/// Keep products whose store name contains `store`, case-insensitively.
#[must_use]
pub fn filter_store(products: Vec<Product>, store: &str) -> Vec<Product> {
    let needle = store.trim().to_lowercase();
    products
        .into_iter()
        .filter(|p| p.store.to_lowercase().contains(&needle))
        .collect()
}

/// Free-text match over title and store.
#[must_use]
pub fn filter_text(products: Vec<Product>, text: &str) -> Vec<Product> {
    let needle = text.trim().to_lowercase();
    products
        .into_iter()
        .filter(|p| {
            p.title.to_lowercase().contains(&needle) || p.store.to_lowercase().contains(&needle)
        })
        .collect()
}

/// Category or dietary term matched against category and title.
#[must_use]
pub fn filter_category(products: Vec<Product>, term: &str) -> Vec<Product> {
    let needle = term.trim().to_lowercase();
    products
        .into_iter()
        .filter(|p| {
            p.category.to_lowercase().contains(&needle) || p.title.to_lowercase().contains(&needle)
        })
        .collect()
}

/// A bundle of optional filters applied in one pass.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub in_stock_only: bool,
    pub discounted_only: bool,
    pub store: Option<String>,
    pub text: Option<String>,
    pub category: Option<String>,
}

impl ProductFilter {
    #[must_use]
    pub fn apply(&self, mut products: Vec<Product>) -> Vec<Product> {
        if self.in_stock_only {
            products = filter_in_stock(products);
        }
        if self.discounted_only {
            products = filter_discounted(products);
        }
        if let Some(store) = non_blank(self.store.as_deref()) {
            products = filter_store(products, store);
        }
        if let Some(text) = non_blank(self.text.as_deref()) {
            products = filter_text(products, text);
        }
        if let Some(category) = non_blank(self.category.as_deref()) {
            products = filter_category(products, category);
        }
        products
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Superset target for a paged request: three pages ahead, capped.
#[must_use]
pub fn superset_target(per_page: usize, cap: usize) -> usize {
    per_page.saturating_mul(3).min(cap).max(1)
}

/// One client page cut from a superset.
#[derive(Debug, Clone)]
pub struct Page {
    pub products: Vec<Product>,
    pub total_results: usize,
    pub has_more: bool,
}

/// The sorted product list fetched for one query, kept so later pages and
/// "load more" requests can be served by slicing.
#[derive(Debug, Clone)]
pub struct Superset {
    products: Vec<Product>,
    store_results: Vec<StoreBreakdown>,
    /// Item count the fetch asked each source for.
    requested: usize,
    /// Largest fetch target allowed.
    cap: usize,
}

impl Superset {
    #[must_use]
    pub fn new(
        products: Vec<Product>,
        store_results: Vec<StoreBreakdown>,
        requested: usize,
        cap: usize,
    ) -> Self {
        Self {
            products,
            store_results,
            requested,
            cap,
        }
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn store_results(&self) -> &[StoreBreakdown] {
        &self.store_results
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.products.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    #[must_use]
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// A bigger fetch could return more: the sources filled the requested
    /// count and the target is not yet at the cap.
    #[must_use]
    pub fn can_grow(&self) -> bool {
        self.products.len() >= self.requested && self.requested < self.cap
    }

    /// Whether a cutoff can be served from this superset alone.
    #[must_use]
    pub fn covers(&self, cutoff: usize) -> bool {
        cutoff <= self.products.len() || !self.can_grow()
    }

    /// The first `cutoff` products, or `None` when a re-fetch is needed.
    #[must_use]
    pub fn up_to(&self, cutoff: usize) -> Option<&[Product]> {
        self.covers(cutoff)
            .then(|| &self.products[..cutoff.min(self.products.len())])
    }

    /// Fetch target for a re-fetch that must cover `cutoff`.
    #[must_use]
    pub fn enlarged_target(&self, cutoff: usize) -> usize {
        cutoff
            .max(self.requested.saturating_mul(2))
            .min(self.cap)
    }

    /// Page `page` (1-based) of `per_page` items: `[(page-1)*per_page, page*per_page)`.
    #[must_use]
    pub fn page(&self, page: usize, per_page: usize) -> Page {
        let total = self.products.len();
        let start = page.saturating_sub(1).saturating_mul(per_page).min(total);
        let end = start.saturating_add(per_page).min(total);
        Page {
            products: self.products[start..end].to_vec(),
            total_results: total,
            has_more: end < total || self.can_grow(),
        }
    }
}

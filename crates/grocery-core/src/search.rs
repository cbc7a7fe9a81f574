use serde::{Deserialize, Serialize};

use crate::products::{Product, StoreId, UnknownStore};

/// How far a single source run should paginate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "limit", rename_all = "lowercase")]
pub enum PaginationTarget {
    /// Stop after this many page fetches regardless of item volume.
    Pages(u32),
    /// Keep fetching while fewer than this many items have been collected.
    Results(usize),
}

impl Default for PaginationTarget {
    fn default() -> Self {
        PaginationTarget::Results(30)
    }
}

/// Which sources a search fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StoreSelection {
    #[default]
    All,
    One(StoreId),
}

impl StoreSelection {
    /// Parse a store filter. Empty input and `"all"` select every source.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownStore`] when the name matches no known source.
    pub fn parse(raw: &str) -> Result<Self, UnknownStore> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Ok(StoreSelection::All);
        }
        trimmed.parse().map(StoreSelection::One)
    }

    #[must_use]
    pub fn stores(self) -> Vec<StoreId> {
        match self {
            StoreSelection::All => StoreId::ALL.to_vec(),
            StoreSelection::One(store) => vec![store],
        }
    }
}

impl std::fmt::Display for StoreSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreSelection::All => f.write_str("all"),
            StoreSelection::One(store) => write!(f, "{store}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub stores: StoreSelection,
    pub pagination: PaginationTarget,
    /// Optional category or dietary term matched against category and title.
    pub category: Option<String>,
}

impl SearchRequest {
    #[must_use]
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            stores: StoreSelection::All,
            pagination: PaginationTarget::default(),
            category: None,
        }
    }

    #[must_use]
    pub fn with_stores(mut self, stores: StoreSelection) -> Self {
        self.stores = stores;
        self
    }

    #[must_use]
    pub fn with_pagination(mut self, pagination: PaginationTarget) -> Self {
        self.pagination = pagination;
        self
    }

    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// The trimmed query, or `None` when it is blank.
    #[must_use]
    pub fn normalized_query(&self) -> Option<&str> {
        let trimmed = self.query.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

/// Outcome of one source run inside an aggregation call.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub store: StoreId,
    pub products: Vec<Product>,
    pub success: bool,
    pub error: Option<String>,
}

impl SourceResult {
    #[must_use]
    pub fn succeeded(store: StoreId, products: Vec<Product>) -> Self {
        Self {
            store,
            products,
            success: true,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(store: StoreId, cause: impl Into<String>) -> Self {
        Self {
            store,
            products: Vec::new(),
            success: false,
            error: Some(cause.into()),
        }
    }

    #[must_use]
    pub fn breakdown(&self) -> StoreBreakdown {
        StoreBreakdown {
            store: self.store,
            name: self.store.display_name().to_string(),
            success: self.success,
            count: self.products.len(),
            error: self.error.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreBreakdown {
    pub store: StoreId,
    pub name: String,
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateResult {
    pub products: Vec<Product>,
    pub total_results: usize,
    pub has_more: bool,
    pub store_results: Vec<StoreBreakdown>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_selection_treats_blank_and_all_as_every_store() {
        assert_eq!(StoreSelection::parse(""), Ok(StoreSelection::All));
        assert_eq!(StoreSelection::parse("ALL"), Ok(StoreSelection::All));
        assert_eq!(StoreSelection::All.stores().len(), StoreId::ALL.len());
    }

    #[test]
    fn store_selection_parses_single_store() {
        assert_eq!(
            StoreSelection::parse("coles"),
            Ok(StoreSelection::One(StoreId::Coles))
        );
        assert!(StoreSelection::parse("spar").is_err());
    }

    #[test]
    fn normalized_query_rejects_whitespace() {
        assert_eq!(SearchRequest::new("   ").normalized_query(), None);
        assert_eq!(SearchRequest::new(" milk ").normalized_query(), Some("milk"));
    }

    #[test]
    fn failed_source_result_is_empty_but_present_in_breakdown() {
        let result = SourceResult::failed(StoreId::Iga, "navigation timed out");
        let breakdown = result.breakdown();
        assert!(!breakdown.success);
        assert_eq!(breakdown.count, 0);
        assert_eq!(breakdown.name, "IGA");
        assert_eq!(breakdown.error.as_deref(), Some("navigation timed out"));
    }

    #[test]
    fn pagination_target_serializes_with_mode_tag() {
        let json = serde_json::to_value(PaginationTarget::Pages(2)).unwrap();
        assert_eq!(json, serde_json::json!({"mode": "pages", "limit": 2}));
    }
}

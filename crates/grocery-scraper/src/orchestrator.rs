//! Fan-out across source adapters with per-source failure isolation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use grocery_core::{
    AggregateResult, PaginationTarget, SearchRequest, SourceResult, StoreId, StoreSelection,
    UnknownStore,
};

use crate::adapters::SourceAdapter;
use crate::error::ScraperError;
use crate::pagination::PaginationController;
use crate::postprocess::{dedup_products, filter_category, sort_by_price, SortOrder, Superset};

pub struct Orchestrator {
    adapters: BTreeMap<StoreId, Arc<dyn SourceAdapter>>,
    source_timeout: Option<Duration>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(adapters: Vec<Arc<dyn SourceAdapter>>) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.store(), a)).collect(),
            source_timeout: None,
        }
    }

    /// Give every source run a deadline. A zero duration disables it.
    #[must_use]
    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = (!timeout.is_zero()).then_some(timeout);
        self
    }

    /// Registered sources, in canonical order.
    #[must_use]
    pub fn stores(&self) -> Vec<StoreId> {
        self.adapters.keys().copied().collect()
    }

    fn adapter(&self, store: StoreId) -> Result<&Arc<dyn SourceAdapter>, ScraperError> {
        self.adapters
            .get(&store)
            .ok_or_else(|| ScraperError::UnsupportedStore(UnknownStore(store.to_string())))
    }

    /// The pagination a source uses when the caller names none.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnsupportedStore`] when `store` is not registered.
    pub fn default_pagination(&self, store: StoreId) -> Result<PaginationTarget, ScraperError> {
        Ok(self.adapter(store)?.default_pagination())
    }

    fn validate_query(query: &str) -> Result<&str, ScraperError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(ScraperError::InvalidRequest(
                "query must not be empty".to_string(),
            ));
        }
        Ok(trimmed)
    }

    /// Search one source by name.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnsupportedStore`] for an unknown or disabled
    /// store and [`ScraperError::InvalidRequest`] for a blank query, both
    /// before any fetch. Source failures come back as a failed
    /// [`SourceResult`], never as `Err`.
    pub async fn scrape_store(
        &self,
        store: &str,
        query: &str,
        target: Option<PaginationTarget>,
    ) -> Result<SourceResult, ScraperError> {
        let store: StoreId = store.parse()?;
        let target = match target {
            Some(target) => target,
            None => self.default_pagination(store)?,
        };
        let controller = PaginationController::new(target);
        self.scrape_store_with(store, query, controller).await
    }

    /// Search one source with a caller-built pagination controller, e.g. one
    /// carrying an interactive gate.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::scrape_store`].
    pub async fn scrape_store_with(
        &self,
        store: StoreId,
        query: &str,
        controller: PaginationController,
    ) -> Result<SourceResult, ScraperError> {
        let query = Self::validate_query(query)?;
        let adapter = Arc::clone(self.adapter(store)?);
        Ok(run_isolated(adapter, query.to_string(), controller, self.source_timeout).await)
    }

    /// Search every registered source at once.
    ///
    /// Always yields one entry per source; a failing source is an empty,
    /// failed entry.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidRequest`] for a blank query.
    pub async fn scrape_all_stores(
        &self,
        query: &str,
        target: Option<PaginationTarget>,
    ) -> Result<BTreeMap<StoreId, SourceResult>, ScraperError> {
        let query = Self::validate_query(query)?;
        let stores = self.stores();
        Ok(self.fan_out(&stores, query, target).await)
    }

    async fn fan_out(
        &self,
        stores: &[StoreId],
        query: &str,
        target: Option<PaginationTarget>,
    ) -> BTreeMap<StoreId, SourceResult> {
        let branches = stores.iter().filter_map(|store| {
            let adapter = Arc::clone(self.adapters.get(store)?);
            let controller =
                PaginationController::new(target.unwrap_or_else(|| adapter.default_pagination()));
            Some(run_isolated(
                adapter,
                query.to_string(),
                controller,
                self.source_timeout,
            ))
        });

        let results = join_all(branches).await;
        tracing::info!(
            query,
            sources = results.len(),
            succeeded = results.iter().filter(|r| r.success).count(),
            "fan-out complete"
        );
        results.into_iter().map(|r| (r.store, r)).collect()
    }

    /// Scrape, then dedup across sources, apply the category filter and sort
    /// ascending by price.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidRequest`] for a blank query and
    /// [`ScraperError::UnsupportedStore`] when the selected store is not
    /// registered.
    pub async fn aggregate(&self, request: &SearchRequest) -> Result<AggregateResult, ScraperError> {
        let query = request
            .normalized_query()
            .ok_or_else(|| ScraperError::InvalidRequest("query must not be empty".to_string()))?;

        let stores = match request.stores {
            StoreSelection::All => self.stores(),
            StoreSelection::One(store) => {
                self.adapter(store)?;
                vec![store]
            }
        };
        let results = self
            .fan_out(&stores, query, Some(request.pagination))
            .await;

        let target_hit = |r: &SourceResult| match request.pagination {
            PaginationTarget::Results(n) => r.products.len() >= n,
            PaginationTarget::Pages(_) => !r.products.is_empty(),
        };
        let has_more = results.values().any(target_hit);
        let store_results = results.values().map(SourceResult::breakdown).collect();

        let merged: Vec<_> = results.into_values().flat_map(|r| r.products).collect();
        let mut products = dedup_products(merged);
        if let Some(category) = request.category.as_deref().filter(|c| !c.trim().is_empty()) {
            products = filter_category(products, category);
        }
        sort_by_price(&mut products, SortOrder::Ascending);

        Ok(AggregateResult {
            total_results: products.len(),
            products,
            has_more,
            store_results,
        })
    }

    /// Serve `cutoff` items for `request`, reusing `previous` when it already
    /// covers the cutoff and re-fetching with an enlarged target otherwise.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::aggregate`].
    pub async fn load_more(
        &self,
        request: &SearchRequest,
        previous: Option<&Superset>,
        cutoff: usize,
        cap: usize,
    ) -> Result<Superset, ScraperError> {
        if let Some(previous) = previous {
            if previous.covers(cutoff) {
                tracing::debug!(cutoff, cached = previous.len(), "serving from superset");
                return Ok(previous.clone());
            }
        }

        let target = previous.map_or_else(
            || cutoff.min(cap).max(1),
            |p| p.enlarged_target(cutoff),
        );
        let request = request
            .clone()
            .with_pagination(PaginationTarget::Results(target));
        let result = self.aggregate(&request).await?;
        tracing::debug!(cutoff, target, fetched = result.total_results, "superset fetched");
        Ok(Superset::new(
            result.products,
            result.store_results,
            target,
            cap,
        ))
    }

    /// Close every adapter; later searches fail per source.
    pub async fn close(&self) {
        for adapter in self.adapters.values() {
            adapter.close().await;
        }
    }
}

/// Run one source on its own task so a panic or overrun stays contained.
async fn run_isolated(
    adapter: Arc<dyn SourceAdapter>,
    query: String,
    mut controller: PaginationController,
    timeout: Option<Duration>,
) -> SourceResult {
    let store = adapter.store();
    let task = tokio::spawn(async move {
        let search = adapter.search(&query, &mut controller);
        match timeout {
            Some(limit) => match tokio::time::timeout(limit, search).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(store = %store, timeout_secs = limit.as_secs(), "source run timed out");
                    SourceResult::failed(
                        store,
                        format!("timed out after {}s", limit.as_secs()),
                    )
                }
            },
            None => search.await,
        }
    });

    match task.await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(store = %store, error = %e, "source task aborted");
            SourceResult::failed(store, format!("source task aborted: {e}"))
        }
    }
}

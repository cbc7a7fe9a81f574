use axum::{
    extract::{rejection::JsonRejection, State},
    Extension, Json,
};
use grocery_core::{Product, SearchRequest, StoreBreakdown, StoreSelection};
use grocery_scraper::superset_target;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_scraper_error, ApiError, AppState, ResponseMeta};

const MAX_PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchBody {
    #[serde(default)]
    query: Option<String>,
    #[serde(default = "default_store")]
    store: String,
    #[serde(default = "default_page")]
    page: usize,
    #[serde(default = "default_per_page")]
    per_page: usize,
}

fn default_store() -> String {
    "all".to_string()
}

fn default_page() -> usize {
    1
}

fn default_per_page() -> usize {
    20
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SearchData {
    success: bool,
    query: String,
    store: String,
    page: usize,
    per_page: usize,
    total_results: usize,
    current_page_results: usize,
    has_more: bool,
    products: Vec<Product>,
    store_results: Vec<StoreBreakdown>,
}

/// Search results sit at the top level of the body, beside `meta`.
#[derive(Debug, Serialize)]
pub(super) struct SearchResponse {
    #[serde(flatten)]
    data: SearchData,
    meta: ResponseMeta,
}

pub(super) async fn search_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(body) =
        body.map_err(|e| ApiError::new(req_id.0.clone(), "invalid_request", e.body_text()))?;

    let query = body
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "invalid_request", "query is required"))?
        .to_string();
    if body.page == 0 {
        return Err(ApiError::new(
            req_id.0.clone(),
            "invalid_request",
            "page must be at least 1",
        ));
    }
    let selection = StoreSelection::parse(&body.store)
        .map_err(|e| ApiError::new(req_id.0.clone(), "unsupported_store", e.to_string()))?;
    let per_page = body.per_page.clamp(1, MAX_PER_PAGE);
    let cutoff = body.page.saturating_mul(per_page);

    let key = (query.to_lowercase(), selection);
    let cached = state.supersets.lock().await.get(&key);
    let request = SearchRequest::new(query.clone()).with_stores(selection);

    let superset = match &cached {
        Some(previous) if previous.covers(cutoff) => previous.clone(),
        Some(previous) => state
            .orchestrator
            .load_more(&request, Some(previous), cutoff, state.max_results)
            .await
            .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?,
        None => {
            let initial = cutoff.max(superset_target(per_page, state.max_results));
            state
                .orchestrator
                .load_more(&request, None, initial, state.max_results)
                .await
                .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?
        }
    };
    state
        .supersets
        .lock()
        .await
        .insert(key, superset.clone());

    let page = superset.page(body.page, per_page);
    tracing::info!(
        query = %query,
        store = %selection,
        page = body.page,
        per_page,
        total = page.total_results,
        reused = cached.is_some(),
        "search served"
    );

    Ok(Json(SearchResponse {
        data: SearchData {
            success: true,
            query,
            store: selection.to_string(),
            page: body.page,
            per_page,
            total_results: page.total_results,
            current_page_results: page.products.len(),
            has_more: page.has_more,
            products: page.products,
            store_results: superset.store_results().to_vec(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

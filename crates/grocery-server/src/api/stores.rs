use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct StoreItem {
    id: &'static str,
    name: &'static str,
}

/// `all` first, then every registered source in canonical order.
pub(super) async fn list_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<StoreItem>>> {
    let data = std::iter::once(StoreItem {
        id: "all",
        name: "All Stores",
    })
    .chain(state.orchestrator.stores().into_iter().map(|store| StoreItem {
        id: store.as_str(),
        name: store.display_name(),
    }))
    .collect();

    Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    })
}

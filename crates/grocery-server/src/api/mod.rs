mod search;
mod stores;

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use grocery_core::StoreSelection;
use grocery_scraper::{Orchestrator, ScraperError, Superset};
use serde::Serialize;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::{request_id, RequestId};

/// Supersets kept for reuse by later pages of the same search.
const SUPERSET_CACHE_ENTRIES: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub max_results: usize,
    supersets: Arc<Mutex<SupersetCache>>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, max_results: usize) -> Self {
        Self {
            orchestrator,
            max_results: max_results.max(1),
            supersets: Arc::new(Mutex::new(SupersetCache::default())),
        }
    }
}

/// Key for a cached superset: lowercased query plus store selection.
type SupersetKey = (String, StoreSelection);

/// Bounded superset map; the oldest entry is evicted first.
#[derive(Default)]
struct SupersetCache {
    entries: HashMap<SupersetKey, Superset>,
    order: VecDeque<SupersetKey>,
}

impl SupersetCache {
    fn get(&self, key: &SupersetKey) -> Option<Superset> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: SupersetKey, superset: Superset) {
        if self.entries.insert(key.clone(), superset).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > SUPERSET_CACHE_ENTRIES {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    stores: usize,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "invalid_request" | "unsupported_store" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_scraper_error(request_id: String, error: &ScraperError) -> ApiError {
    match error {
        ScraperError::InvalidRequest(message) => {
            ApiError::new(request_id, "invalid_request", message.clone())
        }
        ScraperError::UnsupportedStore(unknown) => {
            ApiError::new(request_id, "unsupported_store", unknown.to_string())
        }
        other => {
            tracing::error!(error = %other, "search failed");
            ApiError::new(request_id, "internal_error", "search failed")
        }
    }
}

fn build_cors(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() || origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/grocery/health", get(health))
        .route("/api/grocery/stores", get(stores::list_stores))
        .route("/api/grocery/search", post(search::search_products))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors(cors_origins))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    Json(ApiResponse {
        data: HealthData {
            status: "ok",
            stores: state.orchestrator.stores().len(),
        },
        meta: ResponseMeta::new(req_id.0),
    })
}

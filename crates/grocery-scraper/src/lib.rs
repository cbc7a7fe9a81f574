//! Multi-source grocery search: per-store fetch strategies, shared text
//! extraction, and the orchestrator that fans a query out across them.

pub mod adapters;
pub mod browser;
pub mod dom;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod orchestrator;
pub mod pagination;
pub mod postprocess;
pub(crate) mod rate_limit;

pub use adapters::{
    build_adapters, snap_page_size, AldiAdapter, ColesAdapter, HarrisAdapter, IgaAdapter,
    SourceAdapter, SourceTiming, WoolworthsAdapter,
};
pub use browser::{BrowserLauncher, BrowserSession, PollPolicy, WebDriverLauncher};
pub use error::ScraperError;
pub use orchestrator::Orchestrator;
pub use pagination::{GateDecision, PageGate, PaginationController, HARD_PAGE_CEILING};
pub use postprocess::{
    dedup_products, filter_category, filter_discounted, filter_in_stock, filter_store,
    filter_text, sort_by_price, superset_target, Page, ProductFilter, SortOrder, Superset,
};

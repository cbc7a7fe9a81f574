//! Orchestrator behaviour against scripted in-memory sources.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use grocery_core::{
    PaginationTarget, Product, SearchRequest, StoreId, StoreSelection, PRICE_SENTINEL,
};
use grocery_scraper::{Orchestrator, PaginationController, ScraperError, SourceAdapter};

enum Script {
    Products(Vec<f64>),
    Fail,
    Panic,
    Hang,
}

struct ScriptedSource {
    store: StoreId,
    script: Script,
    calls: AtomicU32,
    closed: AtomicU32,
}

impl ScriptedSource {
    fn new(store: StoreId, script: Script) -> Arc<Self> {
        Arc::new(Self {
            store,
            script,
            calls: AtomicU32::new(0),
            closed: AtomicU32::new(0),
        })
    }
}

fn product(store: StoreId, title: &str, price: f64) -> Product {
    Product {
        title: title.to_string(),
        store: store.display_name().to_string(),
        price: if price.is_finite() {
            format!("${price:.2}")
        } else {
            String::new()
        },
        discounted_price: String::new(),
        discount: String::new(),
        numeric_price: price,
        in_stock: true,
        unit_price: String::new(),
        image_url: String::new(),
        product_url: String::new(),
        brand: String::new(),
        category: String::new(),
        scraped_at: Utc::now(),
        source_query: "milk".to_string(),
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    fn store(&self) -> StoreId {
        self.store
    }

    fn default_pagination(&self) -> PaginationTarget {
        PaginationTarget::Results(30)
    }

    async fn fetch(
        &self,
        _query: &str,
        pagination: &mut PaginationController,
    ) -> Result<Vec<Product>, ScraperError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Products(prices) => {
                let _ = pagination.next_page(&[]).await;
                Ok(prices
                    .iter()
                    .enumerate()
                    .map(|(i, p)| product(self.store, &format!("{} item {i}", self.store), *p))
                    .collect())
            }
            Script::Fail => Err(ScraperError::SourceUnavailable {
                store: self.store,
                reason: "navigation timed out".to_string(),
            }),
            Script::Panic => panic!("adapter bug"),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Vec::new())
            }
        }
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn orchestrator(sources: &[Arc<ScriptedSource>]) -> Orchestrator {
    Orchestrator::new(
        sources
            .iter()
            .map(|s| Arc::clone(s) as Arc<dyn SourceAdapter>)
            .collect(),
    )
}

#[tokio::test]
async fn total_failure_yields_one_empty_result_per_store() {
    let sources: Vec<_> = StoreId::ALL
        .into_iter()
        .map(|s| ScriptedSource::new(s, Script::Fail))
        .collect();
    let orchestrator = orchestrator(&sources);

    let results = orchestrator.scrape_all_stores("milk", None).await.unwrap();

    assert_eq!(results.len(), StoreId::ALL.len());
    for result in results.values() {
        assert!(!result.success);
        assert!(result.products.is_empty());
        assert!(result.error.as_deref().unwrap().contains("navigation timed out"));
    }
}

#[tokio::test]
async fn failed_source_is_marked_empty_not_missing() {
    let sources = vec![
        ScriptedSource::new(StoreId::Iga, Script::Fail),
        ScriptedSource::new(StoreId::Aldi, Script::Products(vec![5.0, 1.0, 3.0, 2.0, 4.0])),
    ];
    let orchestrator = orchestrator(&sources);

    let result = orchestrator
        .aggregate(&SearchRequest::new("milk"))
        .await
        .unwrap();

    assert_eq!(result.total_results, 5);
    assert!(result.products.iter().all(|p| p.store == "ALDI"));
    let prices: Vec<f64> = result.products.iter().map(|p| p.numeric_price).collect();
    assert_eq!(prices, [1.0, 2.0, 3.0, 4.0, 5.0]);

    assert_eq!(result.store_results.len(), 2);
    let iga = result
        .store_results
        .iter()
        .find(|b| b.store == StoreId::Iga)
        .unwrap();
    assert!(!iga.success);
    assert_eq!(iga.count, 0);
}

#[tokio::test]
async fn panicking_source_is_contained() {
    let sources = vec![
        ScriptedSource::new(StoreId::Harris, Script::Panic),
        ScriptedSource::new(StoreId::Coles, Script::Products(vec![2.0])),
    ];
    let orchestrator = orchestrator(&sources);

    let results = orchestrator.scrape_all_stores("milk", None).await.unwrap();

    assert!(!results[&StoreId::Harris].success);
    assert_eq!(results[&StoreId::Coles].products.len(), 1);
}

#[tokio::test]
async fn overrunning_source_hits_its_deadline() {
    let sources = vec![
        ScriptedSource::new(StoreId::Woolworths, Script::Hang),
        ScriptedSource::new(StoreId::Coles, Script::Products(vec![2.0])),
    ];
    let orchestrator = orchestrator(&sources).with_source_timeout(Duration::from_millis(50));

    let results = orchestrator.scrape_all_stores("milk", None).await.unwrap();

    let woolworths = &results[&StoreId::Woolworths];
    assert!(!woolworths.success);
    assert!(woolworths.error.as_deref().unwrap().contains("timed out"));
    assert!(results[&StoreId::Coles].success);
}

#[tokio::test]
async fn unknown_store_is_rejected_before_any_fetch() {
    let source = ScriptedSource::new(StoreId::Aldi, Script::Products(vec![1.0]));
    let orchestrator = orchestrator(&[Arc::clone(&source)]);

    let err = orchestrator.scrape_store("costco", "milk", None).await.unwrap_err();
    assert!(matches!(err, ScraperError::UnsupportedStore(_)));
    assert!(err.is_user_error());

    // Known but not registered (disabled) stores are rejected too.
    let err = orchestrator.scrape_store("iga", "milk", None).await.unwrap_err();
    assert!(matches!(err, ScraperError::UnsupportedStore(_)));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn default_pagination_comes_from_the_adapter() {
    let source = ScriptedSource::new(StoreId::Aldi, Script::Products(vec![1.0]));
    let orchestrator = orchestrator(&[source]);

    assert_eq!(
        orchestrator.default_pagination(StoreId::Aldi).unwrap(),
        PaginationTarget::Results(30)
    );
    assert!(matches!(
        orchestrator.default_pagination(StoreId::Iga),
        Err(ScraperError::UnsupportedStore(_))
    ));
}

#[tokio::test]
async fn blank_query_is_rejected_before_any_fetch() {
    let source = ScriptedSource::new(StoreId::Aldi, Script::Products(vec![1.0]));
    let orchestrator = orchestrator(&[Arc::clone(&source)]);

    let err = orchestrator.scrape_all_stores("   ", None).await.unwrap_err();
    assert!(matches!(err, ScraperError::InvalidRequest(_)));
    let err = orchestrator
        .aggregate(&SearchRequest::new(""))
        .await
        .unwrap_err();
    assert!(matches!(err, ScraperError::InvalidRequest(_)));
    assert_eq!(source.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn single_store_aggregate_only_touches_that_store() {
    let aldi = ScriptedSource::new(StoreId::Aldi, Script::Products(vec![1.0, PRICE_SENTINEL]));
    let iga = ScriptedSource::new(StoreId::Iga, Script::Products(vec![1.0]));
    let orchestrator = orchestrator(&[Arc::clone(&aldi), Arc::clone(&iga)]);

    let request = SearchRequest::new("milk").with_stores(StoreSelection::One(StoreId::Aldi));
    let result = orchestrator.aggregate(&request).await.unwrap();

    assert_eq!(result.total_results, 2);
    assert!(result.products[1].has_sentinel_price());
    assert_eq!(iga.calls.load(Ordering::SeqCst), 0);
    assert_eq!(result.store_results.len(), 1);
}

#[tokio::test]
async fn load_more_reuses_a_covering_superset() {
    let aldi = ScriptedSource::new(
        StoreId::Aldi,
        Script::Products((0..8).map(f64::from).collect()),
    );
    let orchestrator = orchestrator(&[Arc::clone(&aldi)]);
    let request = SearchRequest::new("milk");

    let first = orchestrator.load_more(&request, None, 10, 100).await.unwrap();
    assert_eq!(first.len(), 8);
    assert_eq!(aldi.calls.load(Ordering::SeqCst), 1);

    // Eight results for a target of ten: the source is exhausted.
    let second = orchestrator
        .load_more(&request, Some(&first), 20, 100)
        .await
        .unwrap();
    assert_eq!(aldi.calls.load(Ordering::SeqCst), 1);
    assert_eq!(second.up_to(20).unwrap().len(), 8);
}

#[tokio::test]
async fn close_reaches_every_adapter() {
    let sources = vec![
        ScriptedSource::new(StoreId::Aldi, Script::Products(vec![])),
        ScriptedSource::new(StoreId::Coles, Script::Products(vec![])),
    ];
    let orchestrator = orchestrator(&sources);
    orchestrator.close().await;
    assert!(sources.iter().all(|s| s.closed.load(Ordering::SeqCst) == 1));
}

//! Integration tests for the ALDI product-search adapter.
//!
//! A `wiremock` server stands in for the ALDI API so no real network traffic
//! is made.

use std::time::Duration;

use grocery_core::{PaginationTarget, StoreId, StoreSettings};
use grocery_scraper::{
    sort_by_price, AldiAdapter, PaginationController, PollPolicy, ScraperError, SortOrder,
    SourceAdapter, SourceTiming,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn timing(max_retries: u32) -> SourceTiming {
    SourceTiming {
        inter_request_delay: Duration::ZERO,
        challenge: PollPolicy::new(Duration::from_millis(10), Duration::from_millis(1)),
        max_retries,
        backoff_base_secs: 0,
    }
}

fn adapter(server: &MockServer, page_size: u32, target: PaginationTarget, retries: u32) -> AldiAdapter {
    let settings = StoreSettings {
        base_url: server.uri(),
        page_size: Some(page_size),
        pagination: Some(target),
        ..StoreSettings::builtin(StoreId::Aldi)
    };
    AldiAdapter::new(&settings, "grocery-test/0.1", 5, timing(retries))
        .expect("failed to build test AldiAdapter")
}

fn item(sku: &str, name: &str, current: &str, was: Option<&str>) -> serde_json::Value {
    let mut price = json!({ "amountRelevantDisplay": current });
    if let Some(was) = was {
        price["wasPriceDisplay"] = json!(was);
    }
    json!({
        "sku": sku,
        "name": name,
        "urlSlugText": name.to_lowercase().replace(' ', "-"),
        "price": price,
        "assets": [{ "url": "https://img.aldi.test/{width}/{slug}.jpg", "assetType": "FR01" }]
    })
}

fn page(items: Vec<serde_json::Value>, offset: u64, limit: u64, total: u64) -> serde_json::Value {
    json!({
        "meta": { "pagination": { "offset": offset, "limit": limit, "totalCount": total } },
        "data": items
    })
}

#[tokio::test]
async fn maps_was_price_and_sorts_cheapest_first() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .and(query_param("q", "eggs"))
        .and(query_param("currency", "AUD"))
        .and(query_param("serviceType", "walk-in"))
        .and(query_param("servicePoint", "G452"))
        .and(query_param("limit", "30"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![
                item("1001", "Free Range Eggs 12pk", "$4.50", Some("$5.00")),
                item("1002", "Cage Eggs 12pk", "$3.20", None),
            ],
            0,
            30,
            2,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, 30, PaginationTarget::Results(30), 0);
    let mut pagination = PaginationController::new(adapter.default_pagination());
    let result = adapter.search("eggs", &mut pagination).await;

    assert!(result.success);
    let mut products = result.products;
    assert_eq!(products.len(), 2);

    let reduced = &products[0];
    assert_eq!(reduced.price, "$5.00");
    assert_eq!(reduced.discounted_price, "$4.50");
    assert_eq!(reduced.discount, "$5.00");
    assert!((reduced.numeric_price - 4.50).abs() < f64::EPSILON);

    let regular = &products[1];
    assert_eq!(regular.discount, "");
    assert!((regular.numeric_price - 3.20).abs() < f64::EPSILON);

    sort_by_price(&mut products, SortOrder::Ascending);
    assert_eq!(products[0].title, "Cage Eggs 12pk");
}

#[tokio::test]
async fn follows_offset_until_declared_total() {
    let server = MockServer::start().await;
    let first: Vec<_> = (0..12)
        .map(|i| item(&format!("a{i}"), &format!("Milk Variety {i}"), "$2.00", None))
        .collect();
    let second: Vec<_> = (0..3)
        .map(|i| item(&format!("b{i}"), &format!("Milk Extra {i}"), "$2.50", None))
        .collect();

    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(first, 0, 12, 15)))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .and(query_param("offset", "12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(second, 12, 12, 15)))
        .expect(1)
        .mount(&server)
        .await;

    // 10 snaps to the accepted size 12.
    let adapter = adapter(&server, 10, PaginationTarget::Results(100), 0);
    assert_eq!(adapter.page_size(), 12);
    let mut pagination = PaginationController::new(adapter.default_pagination());

    let products = adapter.fetch("milk", &mut pagination).await.unwrap();
    assert_eq!(products.len(), 15);
    assert_eq!(pagination.pages_fetched(), 2);
    assert!(pagination.is_exhausted());
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![item("1", "Bread", "$2.99", None)],
            0,
            30,
            1,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, 30, PaginationTarget::Results(30), 2);
    let mut pagination = PaginationController::new(adapter.default_pagination());

    let products = adapter.fetch("bread", &mut pagination).await.unwrap();
    assert_eq!(products.len(), 1);
}

#[tokio::test]
async fn persistent_failure_is_source_unavailable_and_contained() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let adapter = adapter(&server, 30, PaginationTarget::Results(30), 0);
    let mut pagination = PaginationController::new(adapter.default_pagination());

    let err = adapter.fetch("bread", &mut pagination).await.unwrap_err();
    assert!(
        matches!(err, ScraperError::SourceUnavailable { store: StoreId::Aldi, .. }),
        "expected SourceUnavailable, got: {err:?}"
    );

    let mut pagination = PaginationController::new(adapter.default_pagination());
    let result = adapter.search("bread", &mut pagination).await;
    assert!(!result.success);
    assert!(result.products.is_empty());
}

#[tokio::test]
async fn empty_data_stops_pagination() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(Vec::new(), 0, 30, 500)))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, 30, PaginationTarget::Pages(5), 0);
    let mut pagination = PaginationController::new(adapter.default_pagination());

    let products = adapter.fetch("nothing", &mut pagination).await.unwrap();
    assert!(products.is_empty());
    assert_eq!(pagination.pages_fetched(), 1);
}

#[tokio::test]
async fn malformed_items_are_skipped_without_failing_the_page() {
    let server = MockServer::start().await;
    let no_asset_url = json!({
        "sku": "2001",
        "name": "Remano Penne 500g",
        "notForSale": null,
        "price": { "amountRelevantDisplay": "$1.19" },
        "assets": [{ "assetType": "FR01" }]
    });
    let numeric_name = json!({
        "sku": "2002",
        "name": 42,
        "price": { "amountRelevantDisplay": "$2.00" }
    });
    Mock::given(method("GET"))
        .and(path("/v3/product-search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page(
            vec![
                item("2000", "Remano Spaghetti 500g", "$0.99", None),
                no_asset_url,
                numeric_name,
            ],
            0,
            30,
            3,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter(&server, 30, PaginationTarget::Results(30), 0);
    let mut pagination = PaginationController::new(adapter.default_pagination());
    let result = adapter.search("pasta", &mut pagination).await;

    assert!(result.success, "page should survive bad items: {:?}", result.error);
    let titles: Vec<&str> = result.products.iter().map(|p| p.title.as_str()).collect();
    assert_eq!(titles, ["Remano Spaghetti 500g", "Remano Penne 500g"]);
    assert!(result.products[1].in_stock);
    assert_eq!(result.products[1].image_url, "");
}

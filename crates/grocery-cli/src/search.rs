use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use grocery_core::{
    AppConfig, PaginationTarget, Product, SourceResult, StoreBreakdown, StoreId, StoreSelection,
    UnknownStore,
};
use grocery_scraper::{
    build_adapters, dedup_products, sort_by_price, Orchestrator, PaginationController,
    ProductFilter, ScraperError, SortOrder,
};
use serde::Serialize;

use crate::gate::LineGate;
use crate::{OutputFormat, SearchArgs, SortArg};

/// True for failures caused by the invocation itself (bad store name, blank
/// query), which exit with status 2.
pub(crate) fn is_user_error(err: &anyhow::Error) -> bool {
    if let Some(scraper) = err.downcast_ref::<ScraperError>() {
        return scraper.is_user_error();
    }
    err.downcast_ref::<UnknownStore>().is_some()
}

/// Requested pagination: `--pages` wins over `--max`; neither means each
/// source's configured default.
pub(crate) fn pagination_target(args: &SearchArgs) -> Option<PaginationTarget> {
    match (args.pages, args.max) {
        (Some(pages), _) => Some(PaginationTarget::Pages(pages)),
        (None, Some(max)) => Some(PaginationTarget::Results(max)),
        (None, None) => None,
    }
}

pub(crate) fn run_stores(config: &AppConfig) -> anyhow::Result<()> {
    let stores = grocery_core::load_stores_or_default(&config.stores_path)
        .context("loading stores configuration")?;

    println!("{:<12}{:<14}{:<10}PAGINATION", "ID", "NAME", "ENABLED");
    for id in StoreId::ALL {
        let settings = stores.settings(id);
        let pagination = match settings.default_pagination() {
            PaginationTarget::Pages(n) => format!("{n} pages"),
            PaginationTarget::Results(n) => format!("{n} results"),
        };
        println!(
            "{:<12}{:<14}{:<10}{pagination}",
            id.as_str(),
            id.display_name(),
            if settings.enabled { "yes" } else { "no" },
        );
    }
    Ok(())
}

pub(crate) async fn run_search(config: &AppConfig, args: SearchArgs) -> anyhow::Result<()> {
    let selection = StoreSelection::parse(&args.store)?;
    if args.query.trim().is_empty() {
        return Err(ScraperError::InvalidRequest("query must not be empty".to_string()).into());
    }
    if args.interactive && selection == StoreSelection::All {
        return Err(ScraperError::InvalidRequest(
            "--interactive needs a single --store".to_string(),
        )
        .into());
    }

    let stores = grocery_core::load_stores_or_default(&config.stores_path)
        .context("loading stores configuration")?;
    let adapters = build_adapters(config, &stores).context("building source adapters")?;
    let orchestrator = Orchestrator::new(adapters)
        .with_source_timeout(Duration::from_secs(config.source_timeout_secs));

    let outcome = collect(&orchestrator, &args, selection).await;
    orchestrator.close().await;
    let results = outcome?;

    let merged: Vec<Product> = results
        .values()
        .flat_map(|r| r.products.iter().cloned())
        .collect();
    let filter = ProductFilter {
        in_stock_only: args.in_stock,
        discounted_only: args.discounted,
        ..ProductFilter::default()
    };
    let mut products = filter.apply(dedup_products(merged));
    sort_by_price(
        &mut products,
        match args.sort {
            SortArg::Asc => SortOrder::Ascending,
            SortArg::Desc => SortOrder::Descending,
        },
    );
    if let Some(max) = args.max {
        products.truncate(max);
    }

    let breakdown: Vec<StoreBreakdown> = results.values().map(SourceResult::breakdown).collect();
    match args.format {
        OutputFormat::Json => {
            let report = SearchReport {
                query: args.query.trim(),
                store: selection.to_string(),
                total_results: products.len(),
                products: &products,
                store_results: &breakdown,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Table => print_table(&products, &breakdown),
    }
    Ok(())
}

async fn collect(
    orchestrator: &Orchestrator,
    args: &SearchArgs,
    selection: StoreSelection,
) -> anyhow::Result<BTreeMap<StoreId, SourceResult>> {
    let target = pagination_target(args);
    match selection {
        StoreSelection::All => Ok(orchestrator.scrape_all_stores(&args.query, target).await?),
        StoreSelection::One(store) if args.interactive => {
            let target = match target {
                Some(target) => target,
                None => orchestrator.default_pagination(store)?,
            };
            let controller =
                PaginationController::new(target).with_gate(Box::new(LineGate::stdin()));
            let result = orchestrator
                .scrape_store_with(store, &args.query, controller)
                .await?;
            Ok(BTreeMap::from([(store, result)]))
        }
        StoreSelection::One(store) => {
            let result = orchestrator
                .scrape_store(store.as_str(), &args.query, target)
                .await?;
            Ok(BTreeMap::from([(store, result)]))
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchReport<'a> {
    query: &'a str,
    store: String,
    total_results: usize,
    products: &'a [Product],
    store_results: &'a [StoreBreakdown],
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn print_table(products: &[Product], breakdown: &[StoreBreakdown]) {
    if products.is_empty() {
        println!("no products found");
    } else {
        println!(
            "{:<13}{:<48}{:<10}{:<12}UNIT",
            "STORE", "TITLE", "PRICE", "SAVING"
        );
        for product in products {
            let effective = if product.discounted_price.is_empty() {
                product.price.as_str()
            } else {
                product.discounted_price.as_str()
            };
            println!(
                "{:<13}{:<48}{:<10}{:<12}{}",
                truncate(&product.store, 12),
                truncate(&product.title, 47),
                if effective.is_empty() { "n/a" } else { effective },
                truncate(&product.discount, 11),
                product.unit_price,
            );
        }
    }

    println!();
    for entry in breakdown {
        match &entry.error {
            Some(error) => println!("{:<13}failed: {error}", entry.name),
            None => println!("{:<13}{} products", entry.name, entry.count),
        }
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;

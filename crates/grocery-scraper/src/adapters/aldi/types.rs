//! ALDI product-search API response types.
//!
//! ## Observed shape
//!
//! `GET /v3/product-search` returns `{ "meta": { "pagination": ... }, "data": [...] }`.
//!
//! ### Prices
//! `price.amountRelevantDisplay` is the shelf price as shown (`"$4.50"`).
//! `price.wasPriceDisplay` is present only while an item is reduced and
//! carries the pre-reduction price. `comparisonDisplay` is the unit price
//! text (`"$2.25 per 1 kg"`) and may be absent.
//!
//! ### Assets
//! Image URLs are templates containing `{width}` and `{slug}` placeholders.
//! The `FR01` asset is the front-of-pack shot.
//!
//! ### Categories
//! Search results usually omit categories; every list defaults to empty.
//!
//! `data` is kept as raw JSON so one malformed item is skipped on its own
//! instead of failing the whole page.

use serde::{Deserialize, Deserializer};

#[derive(Debug, Deserialize)]
pub struct AldiSearchResponse {
    #[serde(default)]
    pub meta: AldiMeta,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AldiMeta {
    #[serde(default)]
    pub pagination: AldiPagination,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AldiPagination {
    #[serde(default)]
    pub offset: u64,
    #[serde(default)]
    pub limit: u64,
    #[serde(default)]
    pub total_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AldiProduct {
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand_name: Option<String>,
    #[serde(default)]
    pub url_slug_text: Option<String>,
    #[serde(default)]
    pub selling_size: Option<String>,
    #[serde(default, deserialize_with = "null_as_false")]
    pub not_for_sale: bool,
    #[serde(default)]
    pub price: AldiPrice,
    #[serde(default)]
    pub assets: Vec<AldiAsset>,
    #[serde(default)]
    pub categories: Vec<AldiCategory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AldiPrice {
    #[serde(default)]
    pub amount_relevant_display: Option<String>,
    #[serde(default)]
    pub was_price_display: Option<String>,
    #[serde(default)]
    pub comparison_display: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AldiAsset {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub asset_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AldiCategory {
    #[serde(default)]
    pub name: Option<String>,
}

fn null_as_false<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

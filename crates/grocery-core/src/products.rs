use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Numeric price used when a display price has no parsable amount.
///
/// Sorts after every real price under [`f64::total_cmp`].
pub const PRICE_SENTINEL: f64 = f64::INFINITY;

/// The fixed set of retail sources the engine knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreId {
    Woolworths,
    Coles,
    Iga,
    Harris,
    Aldi,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported store: '{0}'")]
pub struct UnknownStore(pub String);

impl StoreId {
    pub const ALL: [StoreId; 5] = [
        StoreId::Woolworths,
        StoreId::Coles,
        StoreId::Iga,
        StoreId::Harris,
        StoreId::Aldi,
    ];

    /// Short identifier used in URLs, config keys, and CLI flags.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreId::Woolworths => "woolworths",
            StoreId::Coles => "coles",
            StoreId::Iga => "iga",
            StoreId::Harris => "harris",
            StoreId::Aldi => "aldi",
        }
    }

    /// Retailer name as shown to shoppers; this is what `Product::store` carries.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            StoreId::Woolworths => "Woolworths",
            StoreId::Coles => "Coles",
            StoreId::Iga => "IGA",
            StoreId::Harris => "Harris Farm",
            StoreId::Aldi => "ALDI",
        }
    }
}

impl std::fmt::Display for StoreId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StoreId {
    type Err = UnknownStore;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        match key.as_str() {
            "woolworths" | "woolies" => Ok(StoreId::Woolworths),
            "coles" => Ok(StoreId::Coles),
            "iga" => Ok(StoreId::Iga),
            "harris" | "harrisfarm" | "harrisfarmmarkets" => Ok(StoreId::Harris),
            "aldi" => Ok(StoreId::Aldi),
            _ => Err(UnknownStore(s.to_string())),
        }
    }
}

/// The canonical product record every source adapter produces.
///
/// Built once by the extraction layer and handed on unchanged. `discount`
/// non-empty implies `discounted_price` non-empty, and `numeric_price` is
/// either a finite non-negative amount or [`PRICE_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub title: String,
    /// Retailer display name, e.g. `"Harris Farm"`.
    pub store: String,
    /// Shelf price as displayed; the original price when the item is discounted.
    pub price: String,
    /// Price after discount, empty when not discounted.
    #[serde(default)]
    pub discounted_price: String,
    /// Saving text, empty when not discounted.
    #[serde(default)]
    pub discount: String,
    /// Effective price as a number. Serialized as `null` when unparsable.
    #[serde(
        serialize_with = "serialize_numeric_price",
        deserialize_with = "deserialize_numeric_price",
        default = "sentinel"
    )]
    pub numeric_price: f64,
    pub in_stock: bool,
    #[serde(default)]
    pub unit_price: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub product_url: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub category: String,
    pub scraped_at: DateTime<Utc>,
    /// The query that produced this record.
    #[serde(default)]
    pub source_query: String,
}

impl Product {
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        !self.discount.is_empty()
    }

    /// Returns `true` if the numeric price is the unparsable-price sentinel.
    #[must_use]
    pub fn has_sentinel_price(&self) -> bool {
        !self.numeric_price.is_finite()
    }
}

fn sentinel() -> f64 {
    PRICE_SENTINEL
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_numeric_price<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else {
        serializer.serialize_none()
    }
}

fn deserialize_numeric_price<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite() && *v >= 0.0)
        .unwrap_or(PRICE_SENTINEL))
}

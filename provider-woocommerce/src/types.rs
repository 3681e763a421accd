//! WooCommerce REST API response types
//!
//! Data structures for the `wc/v3` product and category resources. The API is
//! loose about types (prices are strings, stock may be `null`, numbers
//! sometimes arrive quoted), so every optional field is decoded leniently.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Accept a string, a number or `null`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Accept an integer, a numeric string or `null`.
fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Treat `null` like a missing list.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Category reference embedded in a product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooCategoryRef {
    pub id: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// WooCommerce product resource
///
/// See: https://woocommerce.github.io/woocommerce-rest-api-docs/#product-properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WooProduct {
    pub id: i64,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub sku: Option<String>,

    /// Current price, decimal as string
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub regular_price: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub short_description: Option<String>,

    #[serde(default)]
    pub manage_stock: Option<bool>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub stock_quantity: Option<i64>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub weight: Option<String>,

    #[serde(default, deserialize_with = "lenient_list")]
    pub categories: Vec<WooCategoryRef>,

    /// `publish`, `draft`, `pending`, `private`
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
}

/// WooCommerce product category resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WooCategory {
    pub id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "lenient_string")]
    pub slug: Option<String>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub parent: Option<i64>,

    #[serde(default, deserialize_with = "lenient_i64")]
    pub count: Option<i64>,
}

/// `products/batch` response
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WooBatchResponse {
    #[serde(default)]
    pub create: Vec<Value>,

    #[serde(default)]
    pub update: Vec<Value>,

    #[serde(default)]
    pub delete: Vec<Value>,
}

/// Error body returned with non-2xx statuses
#[derive(Debug, Clone, Deserialize)]
pub struct WooErrorBody {
    #[serde(default)]
    pub code: String,

    #[serde(default)]
    pub message: String,
}

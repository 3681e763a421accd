//! Remote Catalog Abstraction
//!
//! The capability contract for the remote storefront catalog. The sync core
//! talks to the storefront exclusively through [`RemoteCatalog`]; a network
//! connector and a deterministic in-memory stand-in both implement it.
//!
//! Every type here is already normalized: an optional field that is `None`
//! was absent (or blank) on the wire. Connectors apply that mapping once when
//! they decode responses.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Category reference carried on a remote product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCategoryRef {
    pub id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// Product as reported by the remote catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteProduct {
    /// Remote-assigned identifier
    pub id: i64,
    pub name: Option<String>,
    pub sku: Option<String>,
    /// Current selling price
    pub price: Option<Decimal>,
    pub regular_price: Option<Decimal>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub stock_quantity: Option<i64>,
    pub weight: Option<Decimal>,
    pub categories: Option<Vec<RemoteCategoryRef>>,
    /// Publication status (`publish`, `draft`, ...)
    pub status: Option<String>,
}

impl RemoteProduct {
    /// Price to mirror locally: the selling price, else the regular price.
    pub fn effective_price(&self) -> Option<Decimal> {
        self.price.or(self.regular_price)
    }
}

/// Remote product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCategory {
    pub id: i64,
    pub name: String,
    pub slug: Option<String>,
    pub parent: Option<i64>,
    pub count: Option<i64>,
}

/// Category reference sent in a write payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryId {
    pub id: i64,
}

/// Body of a create or update request.
///
/// Absent fields are omitted from the serialized form, never sent as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    /// Decimal rendered as a string, e.g. `"19.99"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regular_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manage_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories: Option<Vec<CategoryId>>,
}

/// Listing parameters for [`RemoteCatalog::list_products`]. Pages start at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductQuery {
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
    pub sku: Option<String>,
}

impl ProductQuery {
    pub fn page(page: u32, per_page: u32) -> Self {
        Self {
            page,
            per_page,
            search: None,
            sku: None,
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self::page(1, 10)
    }
}

/// Listing parameters for [`RemoteCatalog::list_categories`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub search: Option<String>,
    pub hide_empty: Option<bool>,
}

/// Update entry of a batch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub id: i64,
    #[serde(flatten)]
    pub payload: ProductPayload,
}

/// Combined create/update/delete request, passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<ProductPayload>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<ProductUpdate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub delete: Vec<i64>,
}

impl BatchRequest {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Outcome of a batch request, one list per section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub create: Vec<RemoteProduct>,
    pub update: Vec<RemoteProduct>,
    pub delete: Vec<RemoteProduct>,
}

/// Acknowledgement of a remote deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteAck {
    pub id: i64,
    pub deleted: bool,
}

/// Remote storefront catalog.
///
/// Errors use [`BridgeError`](crate::error::BridgeError):
/// `NotFound` when the addressed product does not exist, a retryable variant
/// for network or remote-server failures.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::{ProductQuery, RemoteCatalog};
///
/// async fn first_page(remote: &dyn RemoteCatalog) -> Result<usize> {
///     let products = remote.list_products(ProductQuery::page(1, 100)).await?;
///     Ok(products.len())
/// }
/// ```
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// List one page of products.
    async fn list_products(&self, query: ProductQuery) -> Result<Vec<RemoteProduct>>;

    /// Fetch a single product by remote id.
    async fn get_product(&self, id: i64) -> Result<RemoteProduct>;

    /// Create a product; the result carries the remote-assigned id.
    async fn create_product(&self, payload: ProductPayload) -> Result<RemoteProduct>;

    /// Update an existing product.
    async fn update_product(&self, id: i64, payload: ProductPayload) -> Result<RemoteProduct>;

    /// Delete a product. `force` skips the storefront's trash.
    async fn delete_product(&self, id: i64, force: bool) -> Result<DeleteAck>;

    async fn list_categories(&self, query: CategoryQuery) -> Result<Vec<RemoteCategory>>;

    async fn batch(&self, request: BatchRequest) -> Result<BatchResult>;
}

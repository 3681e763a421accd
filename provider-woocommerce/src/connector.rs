//! WooCommerce REST API connector
//!
//! Implements `RemoteCatalog` against the `wc/v3` REST namespace.

use async_trait::async_trait;
use bridge_traits::catalog::{
    BatchRequest, BatchResult, CategoryQuery, DeleteAck, ProductPayload, ProductQuery,
    RemoteCatalog, RemoteCategory, RemoteProduct,
};
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use core_runtime::config::RemoteConfig;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::convert::{batch_entry_to_remote, to_remote_category, to_remote_product};
use crate::error::{Result, WooCommerceError};
use crate::types::{WooBatchResponse, WooCategory, WooErrorBody, WooProduct};

/// WooCommerce API connector
///
/// Authenticates with query-string credentials (`consumer_key`,
/// `consumer_secret`), which WooCommerce accepts over HTTPS.
///
/// # Retries
///
/// `GET` requests go through [`HttpClient::execute`], so the transport may
/// retry them on 5xx/429. Every write is sent exactly once; retrying writes
/// is the propagation worker's job.
///
/// # Example
///
/// ```ignore
/// use provider_woocommerce::WooCommerceConnector;
/// use bridge_traits::catalog::{ProductQuery, RemoteCatalog};
///
/// let connector = WooCommerceConnector::from_config(http_client, &config.remote)?;
/// let first_page = connector.list_products(ProductQuery::page(1, 100)).await?;
/// ```
pub struct WooCommerceConnector {
    http_client: Arc<dyn HttpClient>,

    /// `{store}/wp-json/wc/v3`
    api_base: String,

    consumer_key: String,

    consumer_secret: String,

    timeout: Duration,
}

impl WooCommerceConnector {
    /// Create a connector for an explicit API base.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        api_base: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
            timeout: RemoteConfig::default().request_timeout,
        }
    }

    /// Create a connector from the remote section of the catalog config.
    ///
    /// # Errors
    ///
    /// Returns [`WooCommerceError::Configuration`] if the store URL or either
    /// credential is blank.
    pub fn from_config(http_client: Arc<dyn HttpClient>, config: &RemoteConfig) -> Result<Self> {
        if config.store_url.trim().is_empty() {
            return Err(WooCommerceError::Configuration(
                "store URL is empty".to_string(),
            ));
        }
        if config.consumer_key.trim().is_empty() || config.consumer_secret.trim().is_empty() {
            return Err(WooCommerceError::Configuration(
                "consumer key and secret are required".to_string(),
            ));
        }

        Ok(Self::new(
            http_client,
            config.api_base(),
            config.consumer_key.clone(),
            config.consumer_secret.clone(),
        )
        .with_timeout(config.request_timeout))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Authenticated request for `path` relative to the API base.
    fn request(&self, method: HttpMethod, path: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}/{}", self.api_base, path))
            .header("Accept", "application/json")
            .query("consumer_key", &self.consumer_key)
            .query("consumer_secret", &self.consumer_secret)
            .timeout(self.timeout)
    }

    /// Send a request and map non-success statuses to errors.
    async fn send(&self, request: HttpRequest, resource: &str) -> Result<HttpResponse> {
        let method = request.method;
        let response = if method == HttpMethod::Get {
            self.http_client.execute(request).await?
        } else {
            self.http_client
                .execute_with_retry(request, RetryPolicy::none())
                .await?
        };

        if response.is_success() {
            debug!(status = response.status, resource, "WooCommerce request succeeded");
            return Ok(response);
        }

        if response.status == 404 {
            debug!(resource, "WooCommerce resource not found");
            return Err(WooCommerceError::NotFound {
                resource: resource.to_string(),
            });
        }

        let (code, message) = match serde_json::from_slice::<WooErrorBody>(&response.body) {
            Ok(body) => (body.code, body.message),
            Err(_) => (
                String::new(),
                String::from_utf8_lossy(&response.body).trim().to_string(),
            ),
        };

        warn!(
            status = response.status,
            code = %code,
            resource,
            "WooCommerce request failed"
        );

        Err(WooCommerceError::ApiError {
            status_code: response.status,
            code,
            message,
        })
    }

    fn parse<T: DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
        serde_json::from_slice(&response.body).map_err(|e| {
            WooCommerceError::ParseError(format!("Failed to parse {}: {}", what, e))
        })
    }

    fn product_resource(id: i64) -> String {
        format!("products/{}", id)
    }
}

#[async_trait]
impl RemoteCatalog for WooCommerceConnector {
    #[instrument(skip(self), fields(page = query.page, per_page = query.per_page))]
    async fn list_products(&self, query: ProductQuery) -> BridgeResult<Vec<RemoteProduct>> {
        let request = self
            .request(HttpMethod::Get, "products")
            .query("page", query.page)
            .query("per_page", query.per_page)
            .query_opt("search", query.search.as_deref())
            .query_opt("sku", query.sku.as_deref());

        let response = self.send(request, "products").await?;
        let products: Vec<WooProduct> = Self::parse(&response, "product list")?;

        info!(count = products.len(), "Listed products from WooCommerce");
        Ok(products.into_iter().map(to_remote_product).collect())
    }

    #[instrument(skip(self))]
    async fn get_product(&self, id: i64) -> BridgeResult<RemoteProduct> {
        let resource = Self::product_resource(id);
        let response = self
            .send(self.request(HttpMethod::Get, &resource), &resource)
            .await?;
        let product: WooProduct = Self::parse(&response, "product")?;
        Ok(to_remote_product(product))
    }

    #[instrument(skip(self, payload), fields(sku = ?payload.sku))]
    async fn create_product(&self, payload: ProductPayload) -> BridgeResult<RemoteProduct> {
        let request = self.request(HttpMethod::Post, "products").json(&payload)?;
        let response = self.send(request, "products").await?;
        let product: WooProduct = Self::parse(&response, "created product")?;

        info!(external_id = product.id, "Created product in WooCommerce");
        Ok(to_remote_product(product))
    }

    #[instrument(skip(self, payload))]
    async fn update_product(
        &self,
        id: i64,
        payload: ProductPayload,
    ) -> BridgeResult<RemoteProduct> {
        let resource = Self::product_resource(id);
        let request = self.request(HttpMethod::Put, &resource).json(&payload)?;
        let response = self.send(request, &resource).await?;
        let product: WooProduct = Self::parse(&response, "updated product")?;

        info!(external_id = id, "Updated product in WooCommerce");
        Ok(to_remote_product(product))
    }

    #[instrument(skip(self))]
    async fn delete_product(&self, id: i64, force: bool) -> BridgeResult<DeleteAck> {
        let resource = Self::product_resource(id);
        let request = self
            .request(HttpMethod::Delete, &resource)
            .query("force", force);
        let response = self.send(request, &resource).await?;

        // The store echoes the removed product
        let product: WooProduct = Self::parse(&response, "deleted product")?;

        info!(external_id = product.id, force, "Deleted product in WooCommerce");
        Ok(DeleteAck {
            id: product.id,
            deleted: true,
        })
    }

    #[instrument(skip(self))]
    async fn list_categories(&self, query: CategoryQuery) -> BridgeResult<Vec<RemoteCategory>> {
        let request = self
            .request(HttpMethod::Get, "products/categories")
            .query_opt("page", query.page)
            .query_opt("per_page", query.per_page)
            .query_opt("search", query.search.as_deref())
            .query_opt("hide_empty", query.hide_empty);

        let response = self.send(request, "products/categories").await?;
        let categories: Vec<WooCategory> = Self::parse(&response, "category list")?;

        Ok(categories.into_iter().map(to_remote_category).collect())
    }

    #[instrument(
        skip(self, request),
        fields(
            create = request.create.len(),
            update = request.update.len(),
            delete = request.delete.len()
        )
    )]
    async fn batch(&self, request: BatchRequest) -> BridgeResult<BatchResult> {
        let http_request = self
            .request(HttpMethod::Post, "products/batch")
            .json(&request)?;
        let response = self.send(http_request, "products/batch").await?;
        let body: WooBatchResponse = Self::parse(&response, "batch response")?;

        let result = BatchResult {
            create: body.create.into_iter().filter_map(batch_entry_to_remote).collect(),
            update: body.update.into_iter().filter_map(batch_entry_to_remote).collect(),
            delete: body.delete.into_iter().filter_map(batch_entry_to_remote).collect(),
        };

        info!(
            created = result.create.len(),
            updated = result.update.len(),
            deleted = result.delete.len(),
            "Batch applied in WooCommerce"
        );
        Ok(result)
    }
}

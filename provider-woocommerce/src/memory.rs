//! Deterministic in-memory catalog
//!
//! Stands in for a live store in mock mode and in tests. Records are kept in
//! wire form and read back through the same conversion as the network
//! connector, so "empty means absent" behaves identically.

use async_trait::async_trait;
use bridge_traits::catalog::{
    BatchRequest, BatchResult, CategoryQuery, DeleteAck, ProductPayload, ProductQuery,
    RemoteCatalog, RemoteCategory, RemoteProduct,
};
use bridge_traits::error::{BridgeError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::convert::{apply_payload, payload_to_wire, to_remote_category, to_remote_product};
use crate::types::{WooCategory, WooProduct};

/// First id handed out to created products.
pub const FIRST_ASSIGNED_ID: i64 = 1000;

/// Remote operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CatalogOperation {
    ListProducts,
    GetProduct,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    ListCategories,
    Batch,
}

#[derive(Debug)]
struct InjectedFailure {
    remaining: u32,
    message: String,
}

#[derive(Debug, Default)]
struct CatalogState {
    products: BTreeMap<i64, WooProduct>,
    categories: Vec<WooCategory>,
    next_id: i64,
    calls: HashMap<CatalogOperation, u32>,
    failures: HashMap<CatalogOperation, InjectedFailure>,
    created: Vec<ProductPayload>,
    updated: Vec<(i64, ProductPayload)>,
}

impl CatalogState {
    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn create(&mut self, payload: &ProductPayload) -> WooProduct {
        let id = self.allocate_id();
        let product = payload_to_wire(id, payload);
        self.products.insert(id, product.clone());
        self.created.push(payload.clone());
        product
    }

    fn update(&mut self, id: i64, payload: &ProductPayload) -> Result<WooProduct> {
        let product = self
            .products
            .get_mut(&id)
            .ok_or_else(|| BridgeError::NotFound(format!("products/{}", id)))?;
        apply_payload(product, payload);
        let updated = product.clone();
        self.updated.push((id, payload.clone()));
        Ok(updated)
    }

    fn delete(&mut self, id: i64) -> Result<WooProduct> {
        self.products
            .remove(&id)
            .ok_or_else(|| BridgeError::NotFound(format!("products/{}", id)))
    }
}

/// In-memory `RemoteCatalog`
///
/// - Ids for created products are assigned sequentially from
///   [`FIRST_ASSIGNED_ID`], unless a seeded product already holds a higher one.
/// - Every call is counted, including calls that fail.
/// - [`fail_next`](Self::fail_next) makes the next `n` calls of an operation
///   fail with a retryable transport error.
///
/// ```
/// use bridge_traits::catalog::{ProductQuery, RemoteCatalog};
/// use provider_woocommerce::{CatalogOperation, InMemoryCatalog};
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let catalog = InMemoryCatalog::with_sample_products();
/// let page = catalog.list_products(ProductQuery::page(1, 100)).await.unwrap();
/// assert_eq!(page.len(), 2);
/// assert_eq!(catalog.call_count(CatalogOperation::ListProducts), 1);
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CatalogState {
                next_id: FIRST_ASSIGNED_ID,
                ..Default::default()
            }),
        }
    }

    /// Catalog seeded with two published products (ids 101 and 102) and a
    /// small category tree.
    pub fn with_sample_products() -> Self {
        let catalog = Self::new();
        for (id, index, price) in [(101, 1, "19.99"), (102, 2, "29.99")] {
            catalog.seed_product(WooProduct {
                id,
                name: Some(format!("Mock Product {}", index)),
                sku: Some(format!("MOCK-00{}", index)),
                price: Some(price.to_string()),
                regular_price: Some(price.to_string()),
                status: Some("publish".to_string()),
                ..Default::default()
            });
        }
        catalog.seed_category(WooCategory {
            id: 15,
            name: "Uncategorized".to_string(),
            slug: Some("uncategorized".to_string()),
            parent: Some(0),
            count: Some(0),
        });
        catalog.seed_category(WooCategory {
            id: 16,
            name: "Clothing".to_string(),
            slug: Some("clothing".to_string()),
            parent: Some(0),
            count: Some(2),
        });
        catalog
    }

    fn lock(&self) -> MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a product in wire form.
    pub fn seed_product(&self, product: WooProduct) {
        let mut state = self.lock();
        if product.id >= state.next_id {
            state.next_id = product.id + 1;
        }
        state.products.insert(product.id, product);
    }

    pub fn seed_category(&self, category: WooCategory) {
        self.lock().categories.push(category);
    }

    /// Current contents, ordered by id.
    pub fn products(&self) -> Vec<RemoteProduct> {
        self.lock()
            .products
            .values()
            .cloned()
            .map(to_remote_product)
            .collect()
    }

    /// Stored product, if present.
    pub fn product(&self, id: i64) -> Option<RemoteProduct> {
        self.lock().products.get(&id).cloned().map(to_remote_product)
    }

    pub fn call_count(&self, operation: CatalogOperation) -> u32 {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Fail the next `times` calls of `operation` with a transport error.
    pub fn fail_next(&self, operation: CatalogOperation, times: u32) {
        self.fail_next_with(operation, times, "injected transport failure");
    }

    pub fn fail_next_with(
        &self,
        operation: CatalogOperation,
        times: u32,
        message: impl Into<String>,
    ) {
        self.lock().failures.insert(
            operation,
            InjectedFailure {
                remaining: times,
                message: message.into(),
            },
        );
    }

    /// Payloads accepted by `create_product`, in call order.
    pub fn created_payloads(&self) -> Vec<ProductPayload> {
        self.lock().created.clone()
    }

    /// `(id, payload)` pairs accepted by `update_product`, in call order.
    pub fn updated_payloads(&self) -> Vec<(i64, ProductPayload)> {
        self.lock().updated.clone()
    }

    /// Count the call and consume an injected failure if one is armed.
    fn begin(&self, operation: CatalogOperation) -> Result<MutexGuard<'_, CatalogState>> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_insert(0) += 1;

        if let Some(failure) = state.failures.get_mut(&operation) {
            if failure.remaining > 0 {
                failure.remaining -= 1;
                let message = failure.message.clone();
                debug!(?operation, message = %message, "Injected remote failure");
                return Err(BridgeError::OperationFailed(message));
            }
        }

        Ok(state)
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_search(product: &WooProduct, term: &str) -> bool {
    let term = term.to_lowercase();
    [product.name.as_deref(), product.sku.as_deref()]
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
}

#[async_trait]
impl RemoteCatalog for InMemoryCatalog {
    async fn list_products(&self, query: ProductQuery) -> Result<Vec<RemoteProduct>> {
        let state = self.begin(CatalogOperation::ListProducts)?;

        let per_page = query.per_page.max(1) as usize;
        let skip = (query.page.max(1) as usize - 1).saturating_mul(per_page);

        let page: Vec<RemoteProduct> = state
            .products
            .values()
            .filter(|p| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |term| matches_search(p, term))
            })
            .filter(|p| {
                query
                    .sku
                    .as_deref()
                    .map_or(true, |sku| p.sku.as_deref() == Some(sku))
            })
            .skip(skip)
            .take(per_page)
            .cloned()
            .map(to_remote_product)
            .collect();

        debug!(page = query.page, count = page.len(), "Mock catalog listed products");
        Ok(page)
    }

    async fn get_product(&self, id: i64) -> Result<RemoteProduct> {
        let state = self.begin(CatalogOperation::GetProduct)?;
        state
            .products
            .get(&id)
            .cloned()
            .map(to_remote_product)
            .ok_or_else(|| BridgeError::NotFound(format!("products/{}", id)))
    }

    async fn create_product(&self, payload: ProductPayload) -> Result<RemoteProduct> {
        let mut state = self.begin(CatalogOperation::CreateProduct)?;
        let product = state.create(&payload);
        info!(external_id = product.id, "Mock catalog created product");
        Ok(to_remote_product(product))
    }

    async fn update_product(&self, id: i64, payload: ProductPayload) -> Result<RemoteProduct> {
        let mut state = self.begin(CatalogOperation::UpdateProduct)?;
        let product = state.update(id, &payload)?;
        info!(external_id = id, "Mock catalog updated product");
        Ok(to_remote_product(product))
    }

    async fn delete_product(&self, id: i64, force: bool) -> Result<DeleteAck> {
        let mut state = self.begin(CatalogOperation::DeleteProduct)?;
        state.delete(id)?;
        info!(external_id = id, force, "Mock catalog deleted product");
        Ok(DeleteAck { id, deleted: true })
    }

    async fn list_categories(&self, query: CategoryQuery) -> Result<Vec<RemoteCategory>> {
        let state = self.begin(CatalogOperation::ListCategories)?;

        let per_page = query.per_page.unwrap_or(10).max(1) as usize;
        let skip = (query.page.unwrap_or(1).max(1) as usize - 1) * per_page;
        let search = query.search.as_deref().map(str::to_lowercase);

        Ok(state
            .categories
            .iter()
            .filter(|c| !query.hide_empty.unwrap_or(false) || c.count.unwrap_or(0) > 0)
            .filter(|c| {
                search
                    .as_deref()
                    .map_or(true, |term| c.name.to_lowercase().contains(term))
            })
            .skip(skip)
            .take(per_page)
            .cloned()
            .map(to_remote_category)
            .collect())
    }

    async fn batch(&self, request: BatchRequest) -> Result<BatchResult> {
        let mut state = self.begin(CatalogOperation::Batch)?;
        let mut result = BatchResult::default();

        for payload in &request.create {
            result.create.push(to_remote_product(state.create(payload)));
        }
        // Unknown ids are skipped, as the store reports them per entry
        for entry in &request.update {
            if let Ok(product) = state.update(entry.id, &entry.payload) {
                result.update.push(to_remote_product(product));
            }
        }
        for id in &request.delete {
            if let Ok(product) = state.delete(*id) {
                result.delete.push(to_remote_product(product));
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::catalog::{CategoryId, ProductUpdate};

    fn payload(name: &str, sku: &str, price: &str) -> ProductPayload {
        ProductPayload {
            name: Some(name.to_string()),
            sku: Some(sku.to_string()),
            regular_price: Some(price.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_sample_products() {
        let catalog = InMemoryCatalog::with_sample_products();
        let products = catalog.list_products(ProductQuery::page(1, 100)).await.unwrap();

        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, 101);
        assert_eq!(products[0].sku.as_deref(), Some("MOCK-001"));
        assert_eq!(products[1].name.as_deref(), Some("Mock Product 2"));
        assert_eq!(products[1].price, Some("29.99".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_page_far_past_the_end_is_empty() {
        let catalog = InMemoryCatalog::with_sample_products();
        let products = catalog
            .list_products(ProductQuery::page(u32::MAX, u32::MAX))
            .await
            .unwrap();
        assert!(products.is_empty());
    }

    #[tokio::test]
    async fn test_created_ids_are_sequential() {
        let catalog = InMemoryCatalog::new();
        let first = catalog.create_product(payload("A", "A-1", "1.00")).await.unwrap();
        let second = catalog.create_product(payload("B", "B-1", "2.00")).await.unwrap();

        assert_eq!(first.id, FIRST_ASSIGNED_ID);
        assert_eq!(second.id, FIRST_ASSIGNED_ID + 1);
        assert_eq!(catalog.created_payloads().len(), 2);
    }

    #[tokio::test]
    async fn test_seeding_above_counter_moves_it() {
        let catalog = InMemoryCatalog::new();
        catalog.seed_product(WooProduct {
            id: 5000,
            ..Default::default()
        });
        let created = catalog.create_product(payload("A", "A-1", "1.00")).await.unwrap();
        assert_eq!(created.id, 5001);
    }

    #[tokio::test]
    async fn test_pagination_and_filters() {
        let catalog = InMemoryCatalog::new();
        for i in 0..5 {
            catalog
                .create_product(payload(&format!("Shirt {}", i), &format!("SH-{}", i), "5.00"))
                .await
                .unwrap();
        }
        catalog.create_product(payload("Hat", "HAT-1", "3.00")).await.unwrap();

        let page2 = catalog.list_products(ProductQuery::page(2, 2)).await.unwrap();
        assert_eq!(page2.iter().map(|p| p.id).collect::<Vec<_>>(), vec![1002, 1003]);

        let shirts = catalog
            .list_products(ProductQuery::page(1, 100).with_search("SHIRT"))
            .await
            .unwrap();
        assert_eq!(shirts.len(), 5);

        let by_sku_fragment = catalog
            .list_products(ProductQuery::page(1, 100).with_search("hat-"))
            .await
            .unwrap();
        assert_eq!(by_sku_fragment.len(), 1);

        let exact = catalog
            .list_products(ProductQuery::page(1, 100).with_sku("SH-3"))
            .await
            .unwrap();
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].name.as_deref(), Some("Shirt 3"));

        let beyond = catalog.list_products(ProductQuery::page(9, 2)).await.unwrap();
        assert!(beyond.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let catalog = InMemoryCatalog::with_sample_products();
        let update = ProductPayload {
            name: Some("Renamed".to_string()),
            categories: Some(vec![CategoryId { id: 16 }]),
            ..Default::default()
        };

        let updated = catalog.update_product(101, update).await.unwrap();
        assert_eq!(updated.name.as_deref(), Some("Renamed"));
        assert_eq!(updated.sku.as_deref(), Some("MOCK-001"));
        assert_eq!(updated.categories.unwrap()[0].id, 16);
        assert_eq!(catalog.updated_payloads()[0].0, 101);
    }

    #[tokio::test]
    async fn test_missing_ids_are_not_found() {
        let catalog = InMemoryCatalog::new();
        assert!(matches!(
            catalog.update_product(42, ProductPayload::default()).await,
            Err(BridgeError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete_product(42, true).await,
            Err(BridgeError::NotFound(_))
        ));
        assert!(matches!(catalog.get_product(42).await, Err(BridgeError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_injected_failures_are_counted() {
        let catalog = InMemoryCatalog::new();
        catalog.fail_next(CatalogOperation::CreateProduct, 2);

        assert!(catalog.create_product(payload("A", "A", "1")).await.is_err());
        assert!(catalog.create_product(payload("A", "A", "1")).await.is_err());
        assert!(catalog.create_product(payload("A", "A", "1")).await.is_ok());

        assert_eq!(catalog.call_count(CatalogOperation::CreateProduct), 3);
        assert_eq!(catalog.products().len(), 1);
    }

    #[tokio::test]
    async fn test_injected_failure_message() {
        let catalog = InMemoryCatalog::with_sample_products();
        catalog.fail_next_with(CatalogOperation::ListProducts, 1, "503 Service Unavailable");

        let err = catalog.list_products(ProductQuery::default()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Bridge operation failed: 503 Service Unavailable");
    }

    #[tokio::test]
    async fn test_delete_removes_product() {
        let catalog = InMemoryCatalog::with_sample_products();
        let ack = catalog.delete_product(102, true).await.unwrap();

        assert_eq!(ack, DeleteAck { id: 102, deleted: true });
        assert!(catalog.product(102).is_none());
    }

    #[tokio::test]
    async fn test_categories() {
        let catalog = InMemoryCatalog::with_sample_products();

        let all = catalog.list_categories(CategoryQuery::default()).await.unwrap();
        assert_eq!(all.len(), 2);

        let non_empty = catalog
            .list_categories(CategoryQuery {
                hide_empty: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(non_empty.len(), 1);
        assert_eq!(non_empty[0].name, "Clothing");
    }

    #[tokio::test]
    async fn test_batch_applies_sections() {
        let catalog = InMemoryCatalog::with_sample_products();
        let request = BatchRequest {
            create: vec![payload("New", "NEW-1", "4.00")],
            update: vec![
                ProductUpdate {
                    id: 101,
                    payload: ProductPayload {
                        name: Some("Edited".to_string()),
                        ..Default::default()
                    },
                },
                ProductUpdate {
                    id: 999,
                    payload: ProductPayload::default(),
                },
            ],
            delete: vec![102],
        };

        let result = catalog.batch(request).await.unwrap();
        assert_eq!(result.create[0].id, FIRST_ASSIGNED_ID);
        assert_eq!(result.update.len(), 1);
        assert_eq!(result.delete[0].id, 102);
        assert_eq!(catalog.products().len(), 2);
        assert_eq!(catalog.call_count(CatalogOperation::Batch), 1);
    }
}

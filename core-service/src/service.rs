//! Catalog service façade
//!
//! Every operation the request layer exposes, returning structured data the
//! caller renders into a response. Mutations commit locally and enqueue a
//! propagation task; they never wait for the remote outcome.

use bridge_traits::catalog::{
    BatchRequest, BatchResult, CategoryQuery, ProductQuery, RemoteCatalog, RemoteCategory,
    RemoteProduct,
};
use bridge_traits::time::Clock;
use core_catalog::{
    NewProduct, Page, PageRequest, Product, ProductChanges, ProductFilter, ProductId,
    ProductRepository, SqliteProductRepository, SyncStatus,
};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus, Receiver};
use core_sync::{
    CatalogReconciler, PropagationDispatcher, PropagationQueue, PropagationTask,
    PropagationWorker, QueueStats, ReconcileStats, SyncOperation, TaskId,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{info, instrument};

use crate::error::{CoreError, Result};

/// Default page size for listings.
pub const DEFAULT_PER_PAGE: u32 = 10;

/// How a caller names a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ProductKey {
    /// Local id
    Internal(ProductId),
    /// Remote catalog id
    External(i64),
}

impl std::fmt::Display for ProductKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductKey::Internal(id) => write!(f, "id {}", id),
            ProductKey::External(id) => write!(f, "external id {}", id),
        }
    }
}

/// Where reads are served from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// The local mirror
    #[default]
    Local,
    /// Straight from the remote catalog
    Live,
}

/// Listing parameters. `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub source: Source,
    pub page: u32,
    pub per_page: u32,
    pub search: Option<String>,
    pub sku: Option<String>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            source: Source::Local,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            search: None,
            sku: None,
        }
    }
}

impl ListRequest {
    pub fn live() -> Self {
        Self {
            source: Source::Live,
            ..Default::default()
        }
    }

    pub fn page(mut self, page: u32, per_page: u32) -> Self {
        self.page = page;
        self.per_page = per_page;
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn sku(mut self, sku: impl Into<String>) -> Self {
        self.sku = Some(sku.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum ProductListing {
    Local(Page<Product>),
    Live { products: Vec<RemoteProduct> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", content = "product", rename_all = "lowercase")]
pub enum ProductView {
    Local(Product),
    Live(RemoteProduct),
}

/// Result of a local mutation that was queued for propagation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationReceipt {
    pub product_id: ProductId,
    pub external_id: Option<i64>,
    pub sync_status: SyncStatus,
    pub task_id: TaskId,
    pub operation: SyncOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReceipt {
    pub local_deleted: bool,
    /// `None` when no remote id was known
    pub remote_deleted: Option<bool>,
}

/// Handles the service is built from.
pub struct CatalogDependencies {
    pub pool: SqlitePool,
    pub remote: Arc<dyn RemoteCatalog>,
    pub clock: Arc<dyn Clock>,
    pub event_bus: EventBus,
}

/// Primary façade exposed to host applications.
pub struct CatalogService {
    pool: SqlitePool,
    products: Arc<dyn ProductRepository>,
    remote: Arc<dyn RemoteCatalog>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    queue: Arc<PropagationQueue>,
    dispatcher: PropagationDispatcher,
    reconciler: CatalogReconciler,
}

impl CatalogService {
    /// Wire the store, queue, worker pool and reconciler. Workers are not
    /// started; call [`CatalogService::start`].
    pub async fn new(deps: CatalogDependencies, settings: &SyncSettings) -> Result<Self> {
        let CatalogDependencies {
            pool,
            remote,
            clock,
            event_bus,
        } = deps;

        let products: Arc<dyn ProductRepository> =
            Arc::new(SqliteProductRepository::new(pool.clone()));

        let queue = Arc::new(PropagationQueue::new(pool.clone(), clock.clone()).await?);
        queue.recover_interrupted().await?;

        let worker = Arc::new(
            PropagationWorker::new(
                products.clone(),
                remote.clone(),
                clock.clone(),
                event_bus.clone(),
            )
            .with_policy(settings.into()),
        );
        let dispatcher = PropagationDispatcher::new(queue.clone(), worker, settings);

        let reconciler = CatalogReconciler::new(
            products.clone(),
            remote.clone(),
            clock.clone(),
            event_bus.clone(),
        )
        .with_page_size(settings.reconcile_page_size);

        Ok(Self {
            pool,
            products,
            remote,
            clock,
            event_bus,
            queue,
            dispatcher,
            reconciler,
        })
    }

    /// Start the background propagation workers.
    pub fn start(&self) {
        self.dispatcher.start();
    }

    /// Create a product locally as `pending` and queue its remote create.
    #[instrument(skip(self, new), fields(sku = new.sku.as_deref().unwrap_or_default()))]
    pub async fn create_product(&self, mut new: NewProduct) -> Result<MutationReceipt> {
        validate_new(&new)?;
        new.external_id = None;

        let product = self
            .products
            .insert(&Product::draft(new, self.clock.unix_timestamp()))
            .await?;

        info!(product_id = %product.id, "Product created locally");
        self.emit(CatalogEvent::ProductCreated {
            product_id: product.id.value(),
            sku: product.sku.clone(),
        });

        self.enqueue(&product, SyncOperation::Create).await
    }

    /// Apply a partial edit locally, reset the product to `pending` and queue
    /// its propagation: an update when the remote id is known, otherwise the
    /// create that never went through.
    #[instrument(skip(self, changes))]
    pub async fn update_product(
        &self,
        key: ProductKey,
        changes: ProductChanges,
    ) -> Result<MutationReceipt> {
        changes.validate()?;

        let mut product = self.require(key).await?;
        let now = self.clock.unix_timestamp();
        product.apply_changes(changes, now);
        product.mark_pending(now);
        self.products.update(&product).await?;

        info!(product_id = %product.id, "Product updated locally");
        self.emit(CatalogEvent::ProductUpdated {
            product_id: product.id.value(),
            external_id: product.external_id,
        });

        self.enqueue(&product, propagation_for(&product)).await
    }

    /// Delete the local row and, when a remote id is known, the remote
    /// product too.
    ///
    /// Deleting by external id reaches the remote even when no local row
    /// mirrors it.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, key: ProductKey) -> Result<DeleteReceipt> {
        let local = self.find(key).await?;

        let external_id = match key {
            ProductKey::External(id) => Some(id),
            ProductKey::Internal(id) => match &local {
                Some(product) => product.external_id,
                None => return Err(CoreError::NotFound(format!("Product {}", id))),
            },
        };

        let local_deleted = match &local {
            Some(product) => self.products.delete(product.id).await?,
            None => false,
        };

        let remote_deleted = match external_id {
            Some(id) => Some(self.remote.delete_product(id, true).await?.deleted),
            None => None,
        };

        info!(local_deleted, ?remote_deleted, "Product deleted");
        self.emit(CatalogEvent::ProductDeleted {
            product_id: local.map(|p| p.id.value()),
            external_id,
        });

        Ok(DeleteReceipt {
            local_deleted,
            remote_deleted,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, key: ProductKey, source: Source) -> Result<ProductView> {
        match source {
            Source::Local => Ok(ProductView::Local(self.require(key).await?)),
            Source::Live => {
                let external_id = match key {
                    ProductKey::External(id) => id,
                    ProductKey::Internal(_) => self.require(key).await?.external_id.ok_or_else(
                        || CoreError::NotFound(format!("Remote product for {}", key)),
                    )?,
                };
                Ok(ProductView::Live(
                    self.remote.get_product(external_id).await?,
                ))
            }
        }
    }

    /// Local listing newest first, or a pass-through of the remote listing.
    #[instrument(skip(self))]
    pub async fn list_products(&self, request: ListRequest) -> Result<ProductListing> {
        let per_page = if request.per_page == 0 {
            DEFAULT_PER_PAGE
        } else {
            request.per_page
        };

        match request.source {
            Source::Local => {
                let filter = ProductFilter {
                    search: request.search,
                    sku: request.sku,
                    sync_status: None,
                };
                let page = self
                    .products
                    .query(&filter, PageRequest::from_one_based(request.page, per_page))
                    .await?;
                Ok(ProductListing::Local(page))
            }
            Source::Live => {
                let mut query = ProductQuery::page(request.page.max(1), per_page);
                query.search = request.search;
                query.sku = request.sku;
                let products = self.remote.list_products(query).await?;
                Ok(ProductListing::Live { products })
            }
        }
    }

    pub async fn list_categories(&self, query: CategoryQuery) -> Result<Vec<RemoteCategory>> {
        Ok(self.remote.list_categories(query).await?)
    }

    /// Forward a bulk create/update/delete to the remote catalog as-is.
    pub async fn batch(&self, request: BatchRequest) -> Result<BatchResult> {
        if request.is_empty() {
            return Err(CoreError::validation(
                "batch",
                "at least one create, update or delete is required",
            ));
        }
        Ok(self.remote.batch(request).await?)
    }

    /// Pull the whole remote catalog into the local mirror.
    pub async fn reconcile(&self) -> Result<ReconcileStats> {
        Ok(self.reconciler.reconcile().await?)
    }

    /// Queue a fresh propagation for a product, typically one that failed
    /// permanently. Creates when no remote id is known yet, otherwise updates.
    #[instrument(skip(self))]
    pub async fn retry_propagation(&self, product_id: ProductId) -> Result<MutationReceipt> {
        let mut product = self.require(ProductKey::Internal(product_id)).await?;
        let operation = propagation_for(&product);

        product.mark_pending(self.clock.unix_timestamp());
        self.products.update(&product).await?;

        info!(operation = %operation, "Re-dispatching propagation");
        self.enqueue(&product, operation).await
    }

    /// Run every task that is ready now on the calling task.
    pub async fn process_pending(&self) -> Result<usize> {
        Ok(self.dispatcher.drain_ready().await?)
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        Ok(self.queue.stats().await?)
    }

    pub async fn failed_tasks(&self) -> Result<Vec<PropagationTask>> {
        Ok(self.queue.failed_tasks().await?)
    }

    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Stop the workers after their current task and close the database.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
        self.pool.close().await;
        info!("Catalog service stopped");
    }

    async fn enqueue(
        &self,
        product: &Product,
        operation: SyncOperation,
    ) -> Result<MutationReceipt> {
        let task = self.queue.enqueue(product.id, operation).await?;
        Ok(MutationReceipt {
            product_id: product.id,
            external_id: product.external_id,
            sync_status: product.sync_status,
            task_id: task.id,
            operation,
        })
    }

    async fn find(&self, key: ProductKey) -> Result<Option<Product>> {
        let product = match key {
            ProductKey::Internal(id) => self.products.find_by_id(id).await?,
            ProductKey::External(id) => self.products.find_by_external_id(id).await?,
        };
        Ok(product)
    }

    async fn require(&self, key: ProductKey) -> Result<Product> {
        self.find(key)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Product with {}", key)))
    }

    fn emit(&self, event: CatalogEvent) {
        self.event_bus.emit(CoreEvent::Catalog(event)).ok();
    }
}

/// A product the remote has never acknowledged still needs its create.
fn propagation_for(product: &Product) -> SyncOperation {
    if product.external_id.is_some() {
        SyncOperation::Update
    } else {
        SyncOperation::Create
    }
}

/// Creation requires a name, a SKU and a price.
fn validate_new(new: &NewProduct) -> Result<()> {
    new.validate()?;
    if new.sku.as_deref().map_or(true, |s| s.trim().is_empty()) {
        return Err(CoreError::validation("sku", "Product SKU is required"));
    }
    if new.price.is_none() {
        return Err(CoreError::validation("price", "Product price is required"));
    }
    Ok(())
}

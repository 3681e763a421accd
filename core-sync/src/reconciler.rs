//! # Catalog Reconciler
//!
//! Pulls the remote catalog page by page and merges it into the local store.
//!
//! ## Merge rules
//!
//! Each remote item is matched to a local product by `external_id`:
//!
//! - **Found**: every attribute the remote provides overwrites the local
//!   value, then the product is marked `synced`. Attributes the remote leaves
//!   absent keep their local value.
//! - **Not found**: a new product is created with the remote id and marked
//!   `synced` immediately.
//! - **SKU held by another local product**: the item is skipped and counted.
//!
//! Paging stops at the first empty or short page. A remote error aborts the
//! run; pages already merged stay committed, and re-running is safe because
//! every merge is keyed by `external_id`. Local products missing from the
//! remote are never deleted.

use bridge_traits::catalog::{ProductQuery, RemoteCatalog, RemoteProduct};
use bridge_traits::time::Clock;
use core_catalog::{CatalogError, CategoryRef, NewProduct, Product, ProductRepository};
use core_runtime::events::{CoreEvent, EventBus, ReconcileEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Default `per_page` for remote listing.
pub const DEFAULT_RECONCILE_PAGE_SIZE: u32 = 100;

/// Outcome of a reconcile run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileStats {
    /// Remote items merged, new plus updated
    pub total_synced: u64,
    pub new_count: u64,
    pub updated_count: u64,
    /// Items skipped because their SKU belongs to another local product
    pub skipped_conflicts: u64,
    pub pages_fetched: u32,
}

enum MergeOutcome {
    Created,
    Updated,
    Skipped,
}

pub struct CatalogReconciler {
    products: Arc<dyn ProductRepository>,
    remote: Arc<dyn RemoteCatalog>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    page_size: u32,
}

impl CatalogReconciler {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        remote: Arc<dyn RemoteCatalog>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            products,
            remote,
            clock,
            event_bus,
            page_size: DEFAULT_RECONCILE_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Run one full pass over the remote catalog.
    #[instrument(skip(self), fields(run_id = tracing::field::Empty, page_size = self.page_size))]
    pub async fn reconcile(&self) -> Result<ReconcileStats> {
        let run_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());
        let started = Instant::now();

        info!("Starting catalog reconcile");
        self.emit(ReconcileEvent::Started {
            run_id: run_id.clone(),
            page_size: self.page_size,
        });

        let mut stats = ReconcileStats::default();
        let mut page = 1u32;

        loop {
            let items = match self
                .remote
                .list_products(ProductQuery::page(page, self.page_size))
                .await
            {
                Ok(items) => items,
                Err(e) => {
                    let error = SyncError::from(e);
                    return Err(self.abort(&run_id, &stats, error));
                }
            };
            stats.pages_fetched += 1;

            let fetched = items.len();
            debug!(page, items = fetched, "Fetched remote page");
            self.emit(ReconcileEvent::PageFetched {
                run_id: run_id.clone(),
                page,
                items: fetched as u64,
            });

            for item in items {
                let outcome = match self.merge(item).await {
                    Ok(outcome) => outcome,
                    Err(error) => return Err(self.abort(&run_id, &stats, error)),
                };
                match outcome {
                    MergeOutcome::Created => stats.new_count += 1,
                    MergeOutcome::Updated => stats.updated_count += 1,
                    MergeOutcome::Skipped => stats.skipped_conflicts += 1,
                }
            }

            if fetched < self.page_size as usize {
                break;
            }
            page += 1;
        }

        stats.total_synced = stats.new_count + stats.updated_count;

        info!(
            total_synced = stats.total_synced,
            new_products = stats.new_count,
            updated_products = stats.updated_count,
            skipped_conflicts = stats.skipped_conflicts,
            pages = stats.pages_fetched,
            "Catalog reconcile completed"
        );
        self.emit(ReconcileEvent::Completed {
            run_id,
            total_synced: stats.total_synced,
            new_products: stats.new_count,
            updated_products: stats.updated_count,
            skipped_conflicts: stats.skipped_conflicts,
            duration_ms: started.elapsed().as_millis() as u64,
        });

        Ok(stats)
    }

    async fn merge(&self, item: RemoteProduct) -> Result<MergeOutcome> {
        let now = self.clock.unix_timestamp();
        let external_id = item.id;

        let result = match self.products.find_by_external_id(external_id).await? {
            Some(mut product) => {
                apply_remote(&mut product, item);
                product.mark_synced(now);
                self.products
                    .update(&product)
                    .await
                    .map(|_| MergeOutcome::Updated)
            }
            None => {
                let mut product = Product::draft(new_from_remote(item), now);
                product.mark_synced(now);
                self.products
                    .insert(&product)
                    .await
                    .map(|_| MergeOutcome::Created)
            }
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(CatalogError::Conflict { field, value }) => {
                warn!(
                    external_id,
                    field = %field,
                    value = %value,
                    "Skipping remote product that conflicts with a local product"
                );
                Ok(MergeOutcome::Skipped)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn abort(&self, run_id: &str, stats: &ReconcileStats, error: SyncError) -> SyncError {
        warn!(
            error = %error,
            pages_committed = stats.pages_fetched,
            "Catalog reconcile aborted"
        );
        self.emit(ReconcileEvent::Failed {
            run_id: run_id.to_string(),
            message: error.to_string(),
            pages_committed: stats.pages_fetched,
        });
        error
    }

    fn emit(&self, event: ReconcileEvent) {
        self.event_bus.emit(CoreEvent::Reconcile(event)).ok();
    }
}

fn remote_categories(item: &RemoteProduct) -> Option<Vec<CategoryRef>> {
    item.categories
        .as_ref()
        .map(|refs| refs.iter().map(|c| CategoryRef { id: c.id }).collect())
}

/// Overwrite local attributes with every value the remote provides.
fn apply_remote(product: &mut Product, item: RemoteProduct) {
    let price = item.effective_price();
    let categories = remote_categories(&item);

    if let Some(name) = item.name {
        product.name = name;
    }
    if let Some(sku) = item.sku {
        product.sku = Some(sku);
    }
    if let Some(price) = price {
        product.price = Some(price);
    }
    if let Some(description) = item.description {
        product.description = Some(description);
    }
    if let Some(short_description) = item.short_description {
        product.short_description = Some(short_description);
    }
    if let Some(quantity) = item.stock_quantity {
        product.quantity = Some(quantity);
    }
    if let Some(weight) = item.weight {
        product.weight = Some(weight);
    }
    if categories.is_some() {
        product.categories = categories;
    }
}

fn new_from_remote(item: RemoteProduct) -> NewProduct {
    let price = item.effective_price();
    let categories = remote_categories(&item);

    NewProduct {
        name: item.name.unwrap_or_default(),
        sku: item.sku,
        price,
        description: item.description,
        short_description: item.short_description,
        quantity: item.stock_quantity,
        weight: item.weight,
        categories,
        external_id: Some(item.id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::catalog::RemoteCategoryRef;
    use rust_decimal::Decimal;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    #[test]
    fn test_apply_remote_keeps_absent_fields() {
        let mut product = Product::draft(
            NewProduct::new("Old")
                .with_sku("LOCAL-1")
                .with_price(dec("5.00"))
                .with_quantity(4),
            0,
        );

        apply_remote(
            &mut product,
            RemoteProduct {
                id: 101,
                name: Some("New".to_string()),
                ..Default::default()
            },
        );

        assert_eq!(product.name, "New");
        assert_eq!(product.sku.as_deref(), Some("LOCAL-1"));
        assert_eq!(product.price, Some(dec("5.00")));
        assert_eq!(product.quantity, Some(4));
    }

    #[test]
    fn test_regular_price_used_when_price_absent() {
        let new = new_from_remote(RemoteProduct {
            id: 7,
            name: Some("Poster".to_string()),
            regular_price: Some(dec("12.00")),
            categories: Some(vec![RemoteCategoryRef {
                id: 16,
                name: None,
                slug: None,
            }]),
            ..Default::default()
        });

        assert_eq!(new.external_id, Some(7));
        assert_eq!(new.price, Some(dec("12.00")));
        assert_eq!(new.categories, Some(vec![CategoryRef { id: 16 }]));
    }
}

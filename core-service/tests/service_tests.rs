//! End-to-end catalog flows through the service façade

use bridge_traits::catalog::{BatchRequest, CategoryQuery, ProductPayload};
use bridge_traits::time::SystemClock;
use core_catalog::db::create_test_pool;
use core_catalog::{NewProduct, ProductChanges, ProductId, SyncStatus};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CatalogEvent, CoreEvent, EventBus};
use core_service::{
    CatalogDependencies, CatalogService, CoreError, ListRequest, ProductKey, ProductListing,
    ProductView, Source,
};
use core_sync::SyncOperation;
use provider_woocommerce::{CatalogOperation, InMemoryCatalog, FIRST_ASSIGNED_ID};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

fn dec(value: &str) -> Decimal {
    value.parse().unwrap()
}

async fn service_with(remote: Arc<InMemoryCatalog>) -> CatalogService {
    let pool = create_test_pool().await.unwrap();
    let settings = SyncSettings {
        retry_delay: Duration::ZERO,
        ..SyncSettings::default()
    };

    CatalogService::new(
        CatalogDependencies {
            pool,
            remote,
            clock: Arc::new(SystemClock),
            event_bus: EventBus::new(64),
        },
        &settings,
    )
    .await
    .unwrap()
}

fn lamp() -> NewProduct {
    NewProduct::new("Lamp")
        .with_sku("LAMP-1")
        .with_price(dec("24.00"))
        .with_quantity(5)
        .with_categories([16])
}

#[tokio::test]
async fn test_create_returns_before_propagation() {
    let remote = Arc::new(InMemoryCatalog::new());
    let service = service_with(remote.clone()).await;

    let receipt = service.create_product(lamp()).await.unwrap();
    assert_eq!(receipt.sync_status, SyncStatus::Pending);
    assert_eq!(receipt.external_id, None);
    assert_eq!(receipt.operation, SyncOperation::Create);
    assert_eq!(remote.call_count(CatalogOperation::CreateProduct), 0);

    assert_eq!(service.process_pending().await.unwrap(), 1);

    let view = service
        .get_product(ProductKey::Internal(receipt.product_id), Source::Local)
        .await
        .unwrap();
    let ProductView::Local(product) = view else {
        panic!("expected a local product");
    };
    assert_eq!(product.sync_status, SyncStatus::Synced);
    assert_eq!(product.external_id, Some(FIRST_ASSIGNED_ID));

    let created = remote.created_payloads();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].regular_price.as_deref(), Some("24.00"));
    assert_eq!(created[0].manage_stock, Some(true));
}

#[tokio::test]
async fn test_create_requires_sku_and_price() {
    let service = service_with(Arc::new(InMemoryCatalog::new())).await;

    let missing_sku = service
        .create_product(NewProduct::new("Lamp").with_price(dec("1.00")))
        .await
        .unwrap_err();
    assert!(missing_sku.is_validation());
    assert_eq!(missing_sku.http_status(), 422);

    let missing_price = service
        .create_product(NewProduct::new("Lamp").with_sku("LAMP-1"))
        .await
        .unwrap_err();
    assert!(missing_price.is_validation());

    let blank_name = service
        .create_product(NewProduct::new("  ").with_sku("X").with_price(dec("1")))
        .await
        .unwrap_err();
    assert!(blank_name.is_validation());
}

#[tokio::test]
async fn test_duplicate_sku_is_a_conflict() {
    let service = service_with(Arc::new(InMemoryCatalog::new())).await;
    service.create_product(lamp()).await.unwrap();

    let error = service.create_product(lamp()).await.unwrap_err();
    assert!(matches!(error, CoreError::Catalog(_)));
    assert_eq!(error.http_status(), 500);
}

#[tokio::test]
async fn test_update_by_external_id_propagates() {
    let remote = Arc::new(InMemoryCatalog::with_sample_products());
    let service = service_with(remote.clone()).await;
    service.reconcile().await.unwrap();

    let receipt = service
        .update_product(
            ProductKey::External(101),
            ProductChanges {
                name: Some("Renamed".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(receipt.sync_status, SyncStatus::Pending);
    assert_eq!(receipt.external_id, Some(101));

    service.process_pending().await.unwrap();

    let updates = remote.updated_payloads();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].0, 101);
    assert_eq!(updates[0].1.name.as_deref(), Some("Renamed"));
    assert_eq!(remote.product(101).unwrap().name.as_deref(), Some("Renamed"));
}

#[tokio::test]
async fn test_update_of_unsynced_product_queues_create() {
    let remote = Arc::new(InMemoryCatalog::new());
    let service = service_with(remote.clone()).await;
    remote.fail_next(CatalogOperation::CreateProduct, 3);

    let created = service.create_product(lamp()).await.unwrap();
    service.process_pending().await.unwrap();

    let receipt = service
        .update_product(
            ProductKey::Internal(created.product_id),
            ProductChanges {
                name: Some("Desk Lamp".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(receipt.operation, SyncOperation::Create);
    assert_eq!(receipt.sync_status, SyncStatus::Pending);

    service.process_pending().await.unwrap();
    assert_eq!(remote.call_count(CatalogOperation::UpdateProduct), 0);

    let ProductView::Local(product) = service
        .get_product(ProductKey::Internal(created.product_id), Source::Local)
        .await
        .unwrap()
    else {
        panic!("expected a local product");
    };
    assert_eq!(product.sync_status, SyncStatus::Synced);
    assert_eq!(product.external_id, Some(FIRST_ASSIGNED_ID));
    let created_payloads = remote.created_payloads();
    assert_eq!(created_payloads.len(), 1);
    assert_eq!(created_payloads[0].name.as_deref(), Some("Desk Lamp"));
}

#[tokio::test]
async fn test_update_unknown_product_is_not_found() {
    let service = service_with(Arc::new(InMemoryCatalog::new())).await;

    let error = service
        .update_product(ProductKey::External(999), ProductChanges::default())
        .await
        .unwrap_err();
    assert!(matches!(error, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_failed_propagation_can_be_retried() {
    let remote = Arc::new(InMemoryCatalog::new());
    let service = service_with(remote.clone()).await;
    remote.fail_next(CatalogOperation::CreateProduct, 3);

    let receipt = service.create_product(lamp()).await.unwrap();
    service.process_pending().await.unwrap();

    let stats = service.queue_stats().await.unwrap();
    assert_eq!(stats.failed, 1);
    assert_eq!(service.failed_tasks().await.unwrap().len(), 1);

    let retry = service.retry_propagation(receipt.product_id).await.unwrap();
    assert_eq!(retry.operation, SyncOperation::Create);
    service.process_pending().await.unwrap();

    let ProductView::Local(product) = service
        .get_product(ProductKey::Internal(receipt.product_id), Source::Local)
        .await
        .unwrap()
    else {
        panic!("expected a local product");
    };
    assert_eq!(product.sync_status, SyncStatus::Synced);
    assert_eq!(remote.call_count(CatalogOperation::CreateProduct), 4);
}

#[tokio::test]
async fn test_delete_removes_local_and_remote() {
    let remote = Arc::new(InMemoryCatalog::with_sample_products());
    let service = service_with(remote.clone()).await;
    service.reconcile().await.unwrap();

    let receipt = service
        .delete_product(ProductKey::External(101))
        .await
        .unwrap();
    assert!(receipt.local_deleted);
    assert_eq!(receipt.remote_deleted, Some(true));
    assert!(remote.product(101).is_none());

    let error = service
        .get_product(ProductKey::External(101), Source::Local)
        .await
        .unwrap_err();
    assert!(matches!(error, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_delete_unsynced_product_stays_local() {
    let remote = Arc::new(InMemoryCatalog::new());
    let service = service_with(remote.clone()).await;
    let created = service.create_product(lamp()).await.unwrap();

    let receipt = service
        .delete_product(ProductKey::Internal(created.product_id))
        .await
        .unwrap();
    assert!(receipt.local_deleted);
    assert_eq!(receipt.remote_deleted, None);
    assert_eq!(remote.call_count(CatalogOperation::DeleteProduct), 0);
}

#[tokio::test]
async fn test_delete_missing_internal_product() {
    let service = service_with(Arc::new(InMemoryCatalog::new())).await;
    let error = service
        .delete_product(ProductKey::Internal(ProductId(42)))
        .await
        .unwrap_err();
    assert!(matches!(error, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_local_and_live_listing() {
    let remote = Arc::new(InMemoryCatalog::with_sample_products());
    let service = service_with(remote).await;
    service.reconcile().await.unwrap();
    service.create_product(lamp()).await.unwrap();

    let ProductListing::Local(page) = service
        .list_products(ListRequest::default().search("mock"))
        .await
        .unwrap()
    else {
        panic!("expected a local listing");
    };
    assert_eq!(page.total, 2);

    let ProductListing::Local(page) = service
        .list_products(ListRequest::default().sku("LAMP"))
        .await
        .unwrap()
    else {
        panic!("expected a local listing");
    };
    assert_eq!(page.items.len(), 1);

    let ProductListing::Live { products } = service
        .list_products(ListRequest::live().sku("MOCK-002"))
        .await
        .unwrap()
    else {
        panic!("expected a live listing");
    };
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, 102);
}

#[tokio::test]
async fn test_live_get_uses_remote() {
    let remote = Arc::new(InMemoryCatalog::with_sample_products());
    let service = service_with(remote.clone()).await;

    let view = service
        .get_product(ProductKey::External(102), Source::Live)
        .await
        .unwrap();
    assert!(matches!(view, ProductView::Live(ref p) if p.id == 102));
    assert_eq!(remote.call_count(CatalogOperation::GetProduct), 1);

    let missing = service
        .get_product(ProductKey::External(7), Source::Live)
        .await
        .unwrap_err();
    assert!(matches!(missing, CoreError::Remote(_)));
}

#[tokio::test]
async fn test_categories_and_batch_pass_through() {
    let remote = Arc::new(InMemoryCatalog::with_sample_products());
    let service = service_with(remote).await;

    let categories = service
        .list_categories(CategoryQuery::default())
        .await
        .unwrap();
    assert_eq!(categories.len(), 2);

    let result = service
        .batch(BatchRequest {
            create: vec![ProductPayload {
                name: Some("Poster".to_string()),
                sku: Some("POSTER-1".to_string()),
                ..Default::default()
            }],
            update: vec![],
            delete: vec![102],
        })
        .await
        .unwrap();
    assert_eq!(result.create.len(), 1);
    assert_eq!(result.delete.len(), 1);

    let empty = service.batch(BatchRequest::default()).await.unwrap_err();
    assert!(empty.is_validation());
}

#[tokio::test]
async fn test_mutations_publish_catalog_events() {
    let service = service_with(Arc::new(InMemoryCatalog::new())).await;
    let mut events = service.subscribe();

    let receipt = service.create_product(lamp()).await.unwrap();

    match events.try_recv().unwrap() {
        CoreEvent::Catalog(CatalogEvent::ProductCreated { product_id, sku }) => {
            assert_eq!(product_id, receipt.product_id.value());
            assert_eq!(sku.as_deref(), Some("LAMP-1"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn test_background_workers_converge() {
    let remote = Arc::new(InMemoryCatalog::new());
    let service = service_with(remote).await;
    service.start();

    let receipt = service.create_product(lamp()).await.unwrap();

    let synced = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Ok(ProductView::Local(p)) = service
                .get_product(ProductKey::Internal(receipt.product_id), Source::Local)
                .await
            {
                if p.sync_status == SyncStatus::Synced {
                    return p;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("product never synced");

    assert_eq!(synced.external_id, Some(FIRST_ASSIGNED_ID));
    service.shutdown().await;
}

//! Queue-driven propagation through the dispatcher

use bridge_traits::time::SystemClock;
use core_catalog::db::create_test_pool;
use core_catalog::{
    NewProduct, Product, ProductId, ProductRepository, SqliteProductRepository, SyncStatus,
};
use core_runtime::config::SyncSettings;
use core_runtime::events::EventBus;
use core_sync::{
    PropagationDispatcher, PropagationPolicy, PropagationQueue, PropagationWorker, SyncOperation,
    TaskStatus,
};
use provider_woocommerce::{CatalogOperation, InMemoryCatalog, FIRST_ASSIGNED_ID};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    store: Arc<SqliteProductRepository>,
    remote: Arc<InMemoryCatalog>,
    queue: Arc<PropagationQueue>,
    dispatcher: PropagationDispatcher,
}

async fn harness() -> Harness {
    let pool = create_test_pool().await.unwrap();
    let store = Arc::new(SqliteProductRepository::new(pool.clone()));
    let remote = Arc::new(InMemoryCatalog::new());
    let clock = Arc::new(SystemClock);

    let settings = SyncSettings {
        retry_delay: Duration::ZERO,
        poll_interval: Duration::from_millis(10),
        worker_count: 2,
        ..SyncSettings::default()
    };

    let queue = Arc::new(PropagationQueue::new(pool, clock.clone()).await.unwrap());
    let worker = Arc::new(
        PropagationWorker::new(store.clone(), remote.clone(), clock, EventBus::new(64))
            .with_policy(PropagationPolicy::from(&settings)),
    );
    let dispatcher = PropagationDispatcher::new(queue.clone(), worker, &settings);

    Harness {
        store,
        remote,
        queue,
        dispatcher,
    }
}

async fn local_product(store: &SqliteProductRepository, name: &str, sku: &str) -> ProductId {
    store
        .insert(&Product::draft(NewProduct::new(name).with_sku(sku), 0))
        .await
        .unwrap()
        .id
}

#[tokio::test]
async fn test_drain_runs_queued_create() {
    let h = harness().await;
    let id = local_product(&h.store, "Mug", "MUG-1").await;
    h.queue.enqueue(id, SyncOperation::Create).await.unwrap();

    assert_eq!(h.dispatcher.drain_ready().await.unwrap(), 1);

    let product = h.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(product.sync_status, SyncStatus::Synced);
    assert_eq!(product.external_id, Some(FIRST_ASSIGNED_ID));

    let stats = h.queue.stats().await.unwrap();
    assert_eq!(stats.completed, 1);
    assert!(stats.is_idle());
}

#[tokio::test]
async fn test_transient_failure_is_retried_from_queue() {
    let h = harness().await;
    let id = local_product(&h.store, "Mug", "MUG-1").await;
    h.remote.fail_next(CatalogOperation::CreateProduct, 1);
    h.queue.enqueue(id, SyncOperation::Create).await.unwrap();

    assert_eq!(h.dispatcher.drain_ready().await.unwrap(), 2);
    assert_eq!(h.remote.call_count(CatalogOperation::CreateProduct), 2);

    let product = h.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(product.sync_status, SyncStatus::Synced);
}

#[tokio::test]
async fn test_exhausted_task_lands_in_failed_list() {
    let h = harness().await;
    let id = local_product(&h.store, "Mug", "MUG-1").await;
    h.remote.fail_next(CatalogOperation::CreateProduct, 10);
    let task = h.queue.enqueue(id, SyncOperation::Create).await.unwrap();

    assert_eq!(h.dispatcher.drain_ready().await.unwrap(), 3);
    assert_eq!(h.remote.call_count(CatalogOperation::CreateProduct), 3);

    let stored = h.queue.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.attempt, 3);
    assert_eq!(h.queue.failed_tasks().await.unwrap().len(), 1);

    let product = h.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(product.sync_status, SyncStatus::Failed);
    assert!(product
        .sync_error
        .unwrap()
        .starts_with("permanently failed after 3 attempts"));
}

#[tokio::test]
async fn test_create_is_not_resent_when_local_record_fails() {
    let h = harness().await;
    // Local rows already hold the ids the remote hands out next
    for offset in 0..3 {
        let mut new =
            NewProduct::new(format!("Held {offset}")).with_sku(format!("HELD-{offset}"));
        new.external_id = Some(FIRST_ASSIGNED_ID + offset);
        h.store.insert(&Product::draft(new, 0)).await.unwrap();
    }
    let id = local_product(&h.store, "Mug", "MUG-1").await;
    let task = h.queue.enqueue(id, SyncOperation::Create).await.unwrap();

    assert_eq!(h.dispatcher.drain_ready().await.unwrap(), 1);
    assert_eq!(h.remote.call_count(CatalogOperation::CreateProduct), 1);
    assert_eq!(h.remote.products().len(), 1);

    let stored = h.queue.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(h.queue.stats().await.unwrap().failed, 1);

    let product = h.store.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(product.sync_status, SyncStatus::Failed);
    assert_eq!(product.external_id, None);
    let message = product.sync_error.unwrap();
    assert!(message.starts_with("permanently failed after 1 attempts"), "{message}");
    assert!(message.contains(&FIRST_ASSIGNED_ID.to_string()), "{message}");
}

#[tokio::test]
async fn test_update_without_external_id_fails_task_once() {
    let h = harness().await;
    let id = local_product(&h.store, "Mug", "MUG-1").await;
    h.queue.enqueue(id, SyncOperation::Update).await.unwrap();

    assert_eq!(h.dispatcher.drain_ready().await.unwrap(), 1);
    assert_eq!(h.remote.call_count(CatalogOperation::UpdateProduct), 0);
    assert_eq!(h.queue.stats().await.unwrap().failed, 1);
}

#[tokio::test]
async fn test_worker_pool_processes_enqueued_tasks() {
    let h = harness().await;
    h.dispatcher.start();
    assert!(h.dispatcher.is_running());

    let first = local_product(&h.store, "Mug", "MUG-1").await;
    let second = local_product(&h.store, "Cup", "CUP-1").await;
    h.queue.enqueue(first, SyncOperation::Create).await.unwrap();
    h.queue.enqueue(second, SyncOperation::Create).await.unwrap();

    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if h.queue.stats().await.unwrap().completed == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(settled.is_ok(), "workers did not drain the queue");

    h.dispatcher.shutdown().await;
    assert!(!h.dispatcher.is_running());
    assert_eq!(h.remote.products().len(), 2);

    let result = h.queue.enqueue(first, SyncOperation::Update).await;
    assert!(result.is_err());
}

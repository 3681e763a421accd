//! # Catalog Sync
//!
//! Keeps the local catalog and the remote storefront in agreement.
//!
//! ## Overview
//!
//! Two independent flows live here:
//! - **Propagation** (outbound): a local create or update is recorded as a
//!   [`PropagationTask`], queued durably, and pushed to the remote by a
//!   worker pool with a bounded, fixed-delay retry budget
//! - **Reconciliation** (inbound): an operator-triggered pass that pulls the
//!   remote catalog page by page and upserts it by `external_id`
//!
//! ## Components
//!
//! - **Tasks** (`task`): task record, operation and status types
//! - **Queue** (`queue`): SQLite-backed queue with atomic claims and delayed retries
//! - **Payload** (`payload`): local product to remote payload mapping
//! - **Worker** (`propagation`): one attempt per call, owns product sync bookkeeping
//! - **Dispatcher** (`dispatcher`): fixed-size tokio worker pool over the queue
//! - **Reconciler** (`reconciler`): paginated pull and merge

pub mod dispatcher;
pub mod error;
pub mod payload;
pub mod propagation;
pub mod queue;
pub mod reconciler;
pub mod task;

pub use dispatcher::PropagationDispatcher;
pub use error::{Result, SyncError};
pub use payload::build_payload;
pub use propagation::{PropagationPolicy, PropagationWorker, TaskDisposition};
pub use queue::{
    PropagationQueue, PropagationQueueRepository, QueueStats, SqlitePropagationQueueRepository,
};
pub use reconciler::{CatalogReconciler, ReconcileStats, DEFAULT_RECONCILE_PAGE_SIZE};
pub use task::{PropagationTask, SyncOperation, TaskId, TaskStatus};

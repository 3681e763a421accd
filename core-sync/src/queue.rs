//! # Propagation Queue
//!
//! Durable queue of [`PropagationTask`]s consumed by the worker pool.
//!
//! ## Overview
//!
//! - **Persistence**: tasks live in the `propagation_tasks` table so pending
//!   work survives a restart
//! - **Atomic claims**: a task moves from `pending` to `processing` with a
//!   conditional update, so two workers never run the same task
//! - **Delayed retries**: a rescheduled task is invisible until its
//!   `available_at` time
//! - **Wake-ups**: enqueueing notifies one idle worker
//!
//! ## Usage
//!
//! ```ignore
//! let queue = PropagationQueue::new(pool.clone(), clock.clone()).await?;
//! queue.enqueue(product.id, SyncOperation::Create).await?;
//!
//! while let Some(mut task) = queue.claim_next_ready().await? {
//!     match worker.attempt(&mut task).await {
//!         TaskDisposition::Completed { .. } => queue.mark_complete(&mut task).await?,
//!         TaskDisposition::RetryAfter { delay, error } => {
//!             queue.schedule_retry(&mut task, delay, error.to_string()).await?
//!         }
//!         TaskDisposition::Failed(error) => queue.mark_failed(&mut task, error.to_string()).await?,
//!     }
//! }
//! ```

use async_trait::async_trait;
use bridge_traits::time::Clock;
use core_catalog::ProductId;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};
use crate::task::{PropagationTask, SyncOperation, TaskId, TaskStatus};

/// Claims retried when another worker wins the race for the same row.
const MAX_CLAIM_RACES: usize = 8;

/// Repository trait for persisting propagation tasks
#[async_trait]
pub trait PropagationQueueRepository: Send + Sync {
    async fn insert(&self, task: &PropagationTask) -> Result<()>;

    async fn update(&self, task: &PropagationTask) -> Result<()>;

    async fn find_by_id(&self, id: TaskId) -> Result<Option<PropagationTask>>;

    /// Atomically move the oldest ready task to `processing` and return it.
    async fn claim_next_ready(&self, now_ms: i64) -> Result<Option<PropagationTask>>;

    async fn count_by_status(&self, status: TaskStatus) -> Result<u64>;

    async fn delete_completed(&self) -> Result<u64>;

    async fn find_failed(&self) -> Result<Vec<PropagationTask>>;

    /// Return every `processing` task to `pending`.
    async fn reset_processing(&self, now_ms: i64) -> Result<u64>;
}

/// SQLite implementation of the propagation queue repository
pub struct SqlitePropagationQueueRepository {
    pool: SqlitePool,
}

const TASK_COLUMNS: &str = "id, product_id, operation, attempt, status, last_error, \
     available_at, created_at, updated_at";

impl SqlitePropagationQueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Initialize database table if it doesn't exist
    pub async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS propagation_tasks (
                id TEXT PRIMARY KEY,
                product_id INTEGER NOT NULL,
                operation TEXT NOT NULL CHECK (operation IN ('create', 'update')),
                attempt INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                last_error TEXT,
                available_at INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_propagation_tasks_ready
            ON propagation_tasks(status, available_at ASC, created_at ASC)
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    fn task_from_row(row: &SqliteRow) -> Result<PropagationTask> {
        Ok(PropagationTask {
            id: TaskId::from_string(&row.get::<String, _>("id"))?,
            product_id: ProductId(row.get("product_id")),
            operation: row.get::<String, _>("operation").parse()?,
            attempt: row.get::<i64, _>("attempt") as u32,
            status: row.get::<String, _>("status").parse()?,
            last_error: row.get("last_error"),
            available_at: row.get("available_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl PropagationQueueRepository for SqlitePropagationQueueRepository {
    async fn insert(&self, task: &PropagationTask) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO propagation_tasks (
                id, product_id, operation, attempt, status, last_error,
                available_at, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id.as_str())
        .bind(task.product_id.value())
        .bind(task.operation.as_str())
        .bind(task.attempt as i64)
        .bind(task.status.as_str())
        .bind(&task.last_error)
        .bind(task.available_at)
        .bind(task.created_at)
        .bind(task.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn update(&self, task: &PropagationTask) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE propagation_tasks SET
                attempt = ?,
                status = ?,
                last_error = ?,
                available_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(task.attempt as i64)
        .bind(task.status.as_str())
        .bind(&task.last_error)
        .bind(task.available_at)
        .bind(task.updated_at)
        .bind(task.id.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> Result<Option<PropagationTask>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM propagation_tasks WHERE id = ?",
            TASK_COLUMNS
        ))
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        row.as_ref().map(Self::task_from_row).transpose()
    }

    async fn claim_next_ready(&self, now_ms: i64) -> Result<Option<PropagationTask>> {
        for _ in 0..MAX_CLAIM_RACES {
            let row = sqlx::query(&format!(
                r#"
                SELECT {} FROM propagation_tasks
                WHERE status = 'pending' AND available_at <= ?
                ORDER BY available_at ASC, created_at ASC
                LIMIT 1
                "#,
                TASK_COLUMNS
            ))
            .bind(now_ms)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

            let Some(row) = row else {
                return Ok(None);
            };
            let mut task = Self::task_from_row(&row)?;

            let claimed = sqlx::query(
                r#"
                UPDATE propagation_tasks SET status = 'processing', updated_at = ?
                WHERE id = ? AND status = 'pending'
                "#,
            )
            .bind(now_ms)
            .bind(task.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

            if claimed.rows_affected() == 1 {
                task.start_processing(now_ms);
                return Ok(Some(task));
            }

            debug!(task_id = %task.id, "Task claimed by another worker");
        }

        Ok(None)
    }

    async fn count_by_status(&self, status: TaskStatus) -> Result<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM propagation_tasks WHERE status = ?")
                .bind(status.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(count as u64)
    }

    async fn delete_completed(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM propagation_tasks WHERE status = 'completed'")
            .execute(&self.pool)
            .await
            .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn find_failed(&self) -> Result<Vec<PropagationTask>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM propagation_tasks WHERE status = 'failed' ORDER BY updated_at DESC",
            TASK_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        rows.iter().map(Self::task_from_row).collect()
    }

    async fn reset_processing(&self, now_ms: i64) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE propagation_tasks SET status = 'pending', available_at = ?, updated_at = ?
            WHERE status = 'processing'
            "#,
        )
        .bind(now_ms)
        .bind(now_ms)
        .execute(&self.pool)
        .await
        .map_err(|e| SyncError::Database(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

/// Queue of propagation tasks shared by the service and the worker pool
pub struct PropagationQueue {
    repository: Arc<dyn PropagationQueueRepository>,
    clock: Arc<dyn Clock>,
    notify: Arc<Notify>,
    closed: AtomicBool,
}

impl PropagationQueue {
    /// Create a queue backed by SQLite, creating its table if needed.
    pub async fn new(pool: SqlitePool, clock: Arc<dyn Clock>) -> Result<Self> {
        let repository = SqlitePropagationQueueRepository::new(pool);
        repository.initialize().await?;

        Ok(Self::with_repository(Arc::new(repository), clock))
    }

    pub fn with_repository(
        repository: Arc<dyn PropagationQueueRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            clock,
            notify: Arc::new(Notify::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Persist a new task and wake one idle worker.
    pub async fn enqueue(
        &self,
        product_id: ProductId,
        operation: SyncOperation,
    ) -> Result<PropagationTask> {
        if self.is_closed() {
            return Err(SyncError::QueueClosed);
        }

        let task = PropagationTask::new(product_id, operation, self.clock.unix_timestamp_millis());
        self.repository.insert(&task).await?;
        self.notify.notify_one();

        info!(
            task_id = %task.id,
            product_id = %product_id,
            operation = %operation,
            "Enqueued propagation task"
        );

        Ok(task)
    }

    /// Claim the oldest task whose retry delay has elapsed.
    pub async fn claim_next_ready(&self) -> Result<Option<PropagationTask>> {
        let task = self
            .repository
            .claim_next_ready(self.clock.unix_timestamp_millis())
            .await?;

        if let Some(task) = &task {
            debug!(
                task_id = %task.id,
                product_id = %task.product_id,
                attempt = task.attempt,
                "Claimed propagation task"
            );
        }

        Ok(task)
    }

    /// Put a claimed task back, invisible until `delay` has passed.
    pub async fn schedule_retry(
        &self,
        task: &mut PropagationTask,
        delay: Duration,
        error: String,
    ) -> Result<()> {
        let now = self.clock.unix_timestamp_millis();
        let available_at = now.saturating_add(delay.as_millis() as i64);
        task.reschedule(error, available_at, now);
        self.repository.update(task).await?;

        warn!(
            task_id = %task.id,
            product_id = %task.product_id,
            attempt = task.attempt,
            retry_in_ms = delay.as_millis() as u64,
            error = task.last_error.as_deref().unwrap_or_default(),
            "Propagation attempt failed, will retry"
        );

        Ok(())
    }

    pub async fn mark_complete(&self, task: &mut PropagationTask) -> Result<()> {
        task.complete(self.clock.unix_timestamp_millis());
        self.repository.update(task).await?;

        info!(
            task_id = %task.id,
            product_id = %task.product_id,
            attempts = task.attempt,
            "Propagation task completed"
        );

        Ok(())
    }

    pub async fn mark_failed(&self, task: &mut PropagationTask, error: String) -> Result<()> {
        task.fail(error, self.clock.unix_timestamp_millis());
        self.repository.update(task).await?;

        warn!(
            task_id = %task.id,
            product_id = %task.product_id,
            attempts = task.attempt,
            error = task.last_error.as_deref().unwrap_or_default(),
            "Propagation task failed permanently"
        );

        Ok(())
    }

    pub async fn get(&self, id: TaskId) -> Result<Option<PropagationTask>> {
        self.repository.find_by_id(id).await
    }

    pub async fn stats(&self) -> Result<QueueStats> {
        Ok(QueueStats {
            pending: self.repository.count_by_status(TaskStatus::Pending).await?,
            processing: self
                .repository
                .count_by_status(TaskStatus::Processing)
                .await?,
            completed: self
                .repository
                .count_by_status(TaskStatus::Completed)
                .await?,
            failed: self.repository.count_by_status(TaskStatus::Failed).await?,
        })
    }

    /// Tasks that need an operator re-dispatch, most recent first.
    pub async fn failed_tasks(&self) -> Result<Vec<PropagationTask>> {
        self.repository.find_failed().await
    }

    /// Return tasks left `processing` by an interrupted run to the queue.
    pub async fn recover_interrupted(&self) -> Result<u64> {
        let recovered = self
            .repository
            .reset_processing(self.clock.unix_timestamp_millis())
            .await?;

        if recovered > 0 {
            info!(recovered, "Recovered interrupted propagation tasks");
            self.notify.notify_waiters();
        }

        Ok(recovered)
    }

    pub async fn purge_completed(&self) -> Result<u64> {
        let deleted = self.repository.delete_completed().await?;
        info!(deleted_count = deleted, "Purged completed propagation tasks");
        Ok(deleted)
    }

    /// Handle idle workers wait on for new work.
    pub fn notifier(&self) -> Arc<Notify> {
        Arc::clone(&self.notify)
    }

    /// Refuse further enqueues and wake every waiting worker.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Queue statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    /// Tasks that exhausted their attempts or were rejected
    pub failed: u64,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    /// No work left to run
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::time::ManualClock;
    use chrono::TimeZone;
    use core_catalog::db::create_test_pool;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            chrono::Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        ))
    }

    async fn queue(clock: Arc<ManualClock>) -> PropagationQueue {
        let pool = create_test_pool().await.unwrap();
        PropagationQueue::new(pool, clock).await.unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_and_claim() {
        let queue = queue(clock()).await;
        let task = queue
            .enqueue(ProductId(1), SyncOperation::Create)
            .await
            .unwrap();

        let claimed = queue.claim_next_ready().await.unwrap().unwrap();
        assert_eq!(claimed.id, task.id);
        assert_eq!(claimed.status, TaskStatus::Processing);
        assert!(queue.claim_next_ready().await.unwrap().is_none());

        let stored = queue.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Processing);
    }

    #[tokio::test]
    async fn test_claims_oldest_first() {
        let clock = clock();
        let queue = queue(clock.clone()).await;
        let first = queue
            .enqueue(ProductId(1), SyncOperation::Create)
            .await
            .unwrap();
        clock.advance(chrono::Duration::milliseconds(5));
        queue
            .enqueue(ProductId(2), SyncOperation::Update)
            .await
            .unwrap();

        let claimed = queue.claim_next_ready().await.unwrap().unwrap();
        assert_eq!(claimed.id, first.id);
    }

    #[tokio::test]
    async fn test_retry_is_delayed() {
        let clock = clock();
        let queue = queue(clock.clone()).await;
        queue
            .enqueue(ProductId(1), SyncOperation::Update)
            .await
            .unwrap();

        let mut task = queue.claim_next_ready().await.unwrap().unwrap();
        task.attempt = 1;
        queue
            .schedule_retry(&mut task, Duration::from_secs(10), "503".to_string())
            .await
            .unwrap();

        assert!(queue.claim_next_ready().await.unwrap().is_none());

        clock.advance(chrono::Duration::seconds(10));
        let retried = queue.claim_next_ready().await.unwrap().unwrap();
        assert_eq!(retried.id, task.id);
        assert_eq!(retried.attempt, 1);
        assert_eq!(retried.last_error.as_deref(), Some("503"));
    }

    #[tokio::test]
    async fn test_stats_and_failed_tasks() {
        let queue = queue(clock()).await;
        queue
            .enqueue(ProductId(1), SyncOperation::Create)
            .await
            .unwrap();
        queue
            .enqueue(ProductId(2), SyncOperation::Create)
            .await
            .unwrap();
        queue
            .enqueue(ProductId(3), SyncOperation::Create)
            .await
            .unwrap();

        let mut done = queue.claim_next_ready().await.unwrap().unwrap();
        queue.mark_complete(&mut done).await.unwrap();
        let mut broken = queue.claim_next_ready().await.unwrap().unwrap();
        queue
            .mark_failed(&mut broken, "permanently failed".to_string())
            .await
            .unwrap();

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 3);
        assert!(!stats.is_idle());

        let failed = queue.failed_tasks().await.unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].id, broken.id);

        assert_eq!(queue.purge_completed().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_recover_interrupted() {
        let queue = queue(clock()).await;
        queue
            .enqueue(ProductId(1), SyncOperation::Create)
            .await
            .unwrap();
        queue.claim_next_ready().await.unwrap().unwrap();

        assert_eq!(queue.recover_interrupted().await.unwrap(), 1);
        assert!(queue.claim_next_ready().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_closed_queue_rejects_enqueue() {
        let queue = queue(clock()).await;
        queue.close();

        let result = queue.enqueue(ProductId(1), SyncOperation::Create).await;
        assert!(matches!(result, Err(SyncError::QueueClosed)));
    }
}

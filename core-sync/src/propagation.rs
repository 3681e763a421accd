//! # Propagation Worker
//!
//! Pushes a local product to the remote catalog and converges the product's
//! sync bookkeeping with the outcome.
//!
//! One call to [`PropagationWorker::process`] is one attempt:
//!
//! 1. Build the remote payload from the stored product
//! 2. Create, or update by `external_id` (an update without one is a
//!    precondition failure and never reaches the remote)
//! 3. On success store the remote id (create) and mark the product `synced`
//! 4. On failure mark the product `failed` right away, then either ask for a
//!    retry after the fixed delay or, on the last attempt, record the
//!    terminal "permanently failed after N attempts" message
//!
//! A remote write that succeeded is never repeated. If the local row cannot
//! record its outcome, the task ends failed on that attempt.
//!
//! Retry scheduling belongs to the caller: the dispatcher reschedules the
//! task in the queue, while [`PropagationWorker::propagate`] sleeps inline.

use bridge_traits::catalog::{RemoteCatalog, RemoteProduct};
use bridge_traits::time::Clock;
use core_catalog::{Product, ProductId, ProductRepository};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, PropagationEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{Result, SyncError};
use crate::payload::build_payload;
use crate::task::{PropagationTask, SyncOperation};

/// Attempt budget and spacing for one propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropagationPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for PropagationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

impl From<&SyncSettings> for PropagationPolicy {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            retry_delay: settings.retry_delay,
        }
    }
}

/// What should happen to a task after one attempt.
#[derive(Debug)]
pub enum TaskDisposition {
    /// The remote accepted the write
    Completed { external_id: i64 },
    /// Attempt failed; run again after `delay`
    RetryAfter { delay: Duration, error: SyncError },
    /// No further automatic attempts
    Failed(SyncError),
}

pub struct PropagationWorker {
    products: Arc<dyn ProductRepository>,
    remote: Arc<dyn RemoteCatalog>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    policy: PropagationPolicy,
}

impl PropagationWorker {
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
            policy: PropagationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: PropagationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PropagationPolicy {
        self.policy
    }

    /// Run one attempt of `task`, incrementing its attempt counter.
    ///
    /// Remote and precondition failures are reported through the returned
    /// disposition. `Err` means the local store failed while no remote write
    /// had gone through; [`attempt`](Self::attempt) folds that case into a
    /// disposition as well.
    #[instrument(
        skip(self, task),
        fields(task_id = %task.id, product_id = %task.product_id, operation = %task.operation)
    )]
    pub async fn process(&self, task: &mut PropagationTask) -> Result<TaskDisposition> {
        task.attempt += 1;

        let Some(product) = self.products.find_by_id(task.product_id).await? else {
            warn!("Product no longer exists, dropping propagation task");
            return Ok(TaskDisposition::Failed(SyncError::NotFound(format!(
                "Product {}",
                task.product_id
            ))));
        };

        debug!(attempt = task.attempt, "Dispatching product to remote catalog");

        match self.dispatch(&product, task.operation).await {
            Ok(remote) => {
                let remote_id = remote.id;
                match self.record_success(&product, task, remote).await {
                    Ok(disposition) => Ok(disposition),
                    Err(error) => Ok(self.record_unsaved_success(task, remote_id, error).await),
                }
            }
            Err(error) => {
                let disposition = self.classify(task.attempt, error);
                self.record_failure(task, &disposition).await?;
                Ok(disposition)
            }
        }
    }

    /// Run one attempt and always come back with a disposition.
    ///
    /// A local store error before the remote write is retried like a remote
    /// failure. When the budget is spent the product still gets the terminal
    /// failure message, as far as the store lets it be written.
    pub async fn attempt(&self, task: &mut PropagationTask) -> TaskDisposition {
        match self.process(task).await {
            Ok(disposition) => disposition,
            Err(error) => {
                let disposition = self.classify(task.attempt, error);
                if let Err(e) = self.record_failure(task, &disposition).await {
                    error!(error = %e, "Could not record propagation failure on the product");
                }
                disposition
            }
        }
    }

    /// Run attempts inline until the product is synced or the attempt budget
    /// is spent, sleeping the retry delay between attempts.
    ///
    /// Returns the remote id on success.
    #[instrument(skip(self))]
    pub async fn propagate(&self, product_id: ProductId, operation: SyncOperation) -> Result<i64> {
        let mut task =
            PropagationTask::new(product_id, operation, self.clock.unix_timestamp_millis());

        loop {
            match self.attempt(&mut task).await {
                TaskDisposition::Completed { external_id } => return Ok(external_id),
                TaskDisposition::RetryAfter { delay, .. } => tokio::time::sleep(delay).await,
                TaskDisposition::Failed(error) => return Err(error),
            }
        }
    }

    async fn dispatch(&self, product: &Product, operation: SyncOperation) -> Result<RemoteProduct> {
        match operation {
            SyncOperation::Create => {
                let payload = build_payload(product);
                Ok(self.remote.create_product(payload).await?)
            }
            SyncOperation::Update => {
                let external_id = product.external_id.ok_or_else(|| {
                    SyncError::Precondition(format!(
                        "product {} has no external id to update",
                        product.id
                    ))
                })?;
                let payload = build_payload(product);
                Ok(self.remote.update_product(external_id, payload).await?)
            }
        }
    }

    /// Retry while the error is retryable and attempts remain.
    fn classify(&self, attempt: u32, error: SyncError) -> TaskDisposition {
        if !error.is_retryable() {
            TaskDisposition::Failed(error)
        } else if attempt >= self.policy.max_attempts {
            TaskDisposition::Failed(SyncError::Exhausted {
                attempts: attempt,
                message: error.to_string(),
            })
        } else {
            TaskDisposition::RetryAfter {
                delay: self.policy.retry_delay,
                error,
            }
        }
    }

    async fn record_success(
        &self,
        product: &Product,
        task: &PropagationTask,
        remote: RemoteProduct,
    ) -> Result<TaskDisposition> {
        let now = self.clock.unix_timestamp();
        let external_id = match task.operation {
            SyncOperation::Create => remote.id,
            SyncOperation::Update => product.external_id.unwrap_or(remote.id),
        };
        let operation = task.operation;

        self.save_state(product.id, move |p| {
            if operation == SyncOperation::Create {
                p.external_id = Some(external_id);
            }
            p.mark_synced(now);
        })
        .await?;

        info!(external_id, attempt = task.attempt, "Propagation succeeded");
        self.event_bus
            .emit(CoreEvent::Propagation(PropagationEvent::Succeeded {
                product_id: task.product_id.value(),
                external_id,
                operation: task.operation.to_string(),
                attempt: task.attempt,
            }))
            .ok();

        Ok(TaskDisposition::Completed { external_id })
    }

    /// The remote accepted the write but the local row could not record it.
    /// Repeating the attempt would send the write again, so the task ends here.
    async fn record_unsaved_success(
        &self,
        task: &PropagationTask,
        remote_id: i64,
        error: SyncError,
    ) -> TaskDisposition {
        warn!(remote_id, error = %error, "Remote write succeeded but local bookkeeping failed");

        let disposition = TaskDisposition::Failed(SyncError::Exhausted {
            attempts: task.attempt,
            message: format!(
                "remote product {} was written but the local record failed: {}",
                remote_id, error
            ),
        });
        if let Err(e) = self.record_failure(task, &disposition).await {
            error!(error = %e, "Could not record propagation failure on the product");
        }
        disposition
    }

    /// Mark the product failed with the attempt's error and publish the
    /// matching event.
    async fn record_failure(
        &self,
        task: &PropagationTask,
        disposition: &TaskDisposition,
    ) -> Result<()> {
        let (message, will_retry) = match disposition {
            TaskDisposition::RetryAfter { error, .. } => (error.to_string(), true),
            TaskDisposition::Failed(error) => (error.to_string(), false),
            TaskDisposition::Completed { .. } => return Ok(()),
        };
        let now = self.clock.unix_timestamp();
        let attempt = task.attempt;

        let recorded = message.clone();
        self.save_state(task.product_id, move |p| p.mark_failed(recorded, now))
            .await?;

        let event = if will_retry {
            warn!(attempt, error = %message, "Propagation attempt failed");
            PropagationEvent::AttemptFailed {
                product_id: task.product_id.value(),
                operation: task.operation.to_string(),
                attempt,
                message,
                will_retry,
            }
        } else {
            error!(attempt, error = %message, "Propagation failed permanently");
            PropagationEvent::PermanentlyFailed {
                product_id: task.product_id.value(),
                operation: task.operation.to_string(),
                attempts: attempt,
                message,
            }
        };
        self.event_bus.emit(CoreEvent::Propagation(event)).ok();

        Ok(())
    }

    /// Apply sync bookkeeping to the latest stored row, so attribute edits
    /// made while the remote call was in flight are kept.
    async fn save_state<F>(&self, product_id: ProductId, apply: F) -> Result<()>
    where
        F: FnOnce(&mut Product) + Send,
    {
        let Some(mut latest) = self.products.find_by_id(product_id).await? else {
            debug!(product_id = %product_id, "Product removed during propagation");
            return Ok(());
        };

        apply(&mut latest);
        self.products.update(&latest).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = PropagationPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_policy_from_settings() {
        let settings = SyncSettings {
            max_attempts: 5,
            retry_delay: Duration::from_millis(250),
            ..SyncSettings::default()
        };

        let policy = PropagationPolicy::from(&settings);
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.retry_delay, Duration::from_millis(250));
    }
}

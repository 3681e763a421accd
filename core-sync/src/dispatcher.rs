//! # Propagation Dispatcher
//!
//! Fixed-size pool of tokio tasks draining the [`PropagationQueue`].
//!
//! Idle workers wait on the queue's `Notify` and wake at least every
//! `poll_interval` to pick up delayed retries. A task that has been claimed
//! always runs to a disposition; shutdown only stops workers between tasks.

use core_runtime::config::SyncSettings;
use futures::future::join_all;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::error::Result;
use crate::propagation::{PropagationWorker, TaskDisposition};
use crate::queue::PropagationQueue;
use crate::task::PropagationTask;

pub struct PropagationDispatcher {
    queue: Arc<PropagationQueue>,
    worker: Arc<PropagationWorker>,
    worker_count: usize,
    poll_interval: Duration,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl PropagationDispatcher {
    pub fn new(
        queue: Arc<PropagationQueue>,
        worker: Arc<PropagationWorker>,
        settings: &SyncSettings,
    ) -> Self {
        Self {
            queue,
            worker,
            worker_count: settings.worker_count.max(1),
            poll_interval: settings.poll_interval,
            cancel: CancellationToken::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker pool. Calling it again while running is a no-op.
    pub fn start(&self) {
        let Ok(mut handles) = self.handles.lock() else {
            error!("Dispatcher handle list poisoned; workers not started");
            return;
        };
        if !handles.is_empty() || self.cancel.is_cancelled() {
            return;
        }

        for index in 0..self.worker_count {
            handles.push(tokio::spawn(run_worker(
                index,
                Arc::clone(&self.queue),
                Arc::clone(&self.worker),
                self.cancel.clone(),
                self.poll_interval,
            )));
        }

        info!(workers = self.worker_count, "Propagation workers started");
    }

    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
            && self
                .handles
                .lock()
                .map(|handles| !handles.is_empty())
                .unwrap_or(false)
    }

    /// Run every task that is ready right now on the calling task.
    ///
    /// Returns the number of attempts made. Retries scheduled during the
    /// drain are left for later.
    pub async fn drain_ready(&self) -> Result<usize> {
        let mut attempts = 0;
        while let Some(task) = self.queue.claim_next_ready().await? {
            run_task(&self.queue, &self.worker, task).await?;
            attempts += 1;
        }
        Ok(attempts)
    }

    /// Stop accepting work and wait for every worker to finish its current
    /// task. Unfinished tasks stay in the queue.
    pub async fn shutdown(&self) {
        self.queue.close();
        self.cancel.cancel();

        let handles = match self.handles.lock() {
            Ok(mut handles) => std::mem::take(&mut *handles),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        for result in join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "Propagation worker panicked");
            }
        }

        info!("Propagation workers stopped");
    }
}

async fn run_worker(
    index: usize,
    queue: Arc<PropagationQueue>,
    worker: Arc<PropagationWorker>,
    cancel: CancellationToken,
    poll_interval: Duration,
) {
    let notify = queue.notifier();
    debug!(worker = index, "Propagation worker running");

    while !cancel.is_cancelled() {
        match queue.claim_next_ready().await {
            Ok(Some(task)) => {
                if let Err(e) = run_task(&queue, &worker, task).await {
                    error!(worker = index, error = %e, "Failed to record task outcome");
                }
            }
            Ok(None) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = notify.notified() => {}
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
            Err(e) => {
                error!(worker = index, error = %e, "Failed to claim propagation task");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(poll_interval) => {}
                }
            }
        }
    }

    debug!(worker = index, "Propagation worker exiting");
}

/// Run one attempt of a claimed task and store the outcome in the queue.
async fn run_task(
    queue: &PropagationQueue,
    worker: &PropagationWorker,
    mut task: PropagationTask,
) -> Result<()> {
    match worker.attempt(&mut task).await {
        TaskDisposition::Completed { .. } => queue.mark_complete(&mut task).await,
        TaskDisposition::RetryAfter { delay, error } => {
            queue.schedule_retry(&mut task, delay, error.to_string()).await
        }
        TaskDisposition::Failed(error) => queue.mark_failed(&mut task, error.to_string()).await,
    }
}

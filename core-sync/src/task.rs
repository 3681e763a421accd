//! Propagation task records
//!
//! A task is the durable unit of work handed from a local mutation to the
//! worker pool: which product, which remote operation, and how many attempts
//! have already been made.

use core_catalog::ProductId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, SyncError};

/// Type-safe task identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a task ID from a string
    pub fn from_string(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| SyncError::InvalidTaskId(e.to_string()))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Remote operation a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOperation {
    Create,
    Update,
}

impl SyncOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncOperation {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            _ => Err(SyncError::InvalidStatus(format!(
                "unknown operation '{}'",
                s
            ))),
        }
    }
}

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for a worker, possibly until `available_at`
    Pending,
    /// Claimed by a worker
    Processing,
    Completed,
    /// Exhausted or rejected; needs an operator re-dispatch
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(SyncError::InvalidStatus(s.to_string())),
        }
    }
}

/// One queued propagation of a product to the remote catalog.
///
/// Timestamps are unix milliseconds so sub-second retry delays can be
/// scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationTask {
    pub id: TaskId,
    pub product_id: ProductId,
    pub operation: SyncOperation,
    /// Attempts made so far
    pub attempt: u32,
    pub status: TaskStatus,
    pub last_error: Option<String>,
    /// Earliest time a worker may claim the task
    pub available_at: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl PropagationTask {
    pub fn new(product_id: ProductId, operation: SyncOperation, now_ms: i64) -> Self {
        Self {
            id: TaskId::new(),
            product_id,
            operation,
            attempt: 0,
            status: TaskStatus::Pending,
            last_error: None,
            available_at: now_ms,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub(crate) fn start_processing(&mut self, now_ms: i64) {
        self.status = TaskStatus::Processing;
        self.updated_at = now_ms;
    }

    pub(crate) fn reschedule(&mut self, error: String, available_at: i64, now_ms: i64) {
        self.status = TaskStatus::Pending;
        self.last_error = Some(error);
        self.available_at = available_at;
        self.updated_at = now_ms;
    }

    pub(crate) fn complete(&mut self, now_ms: i64) {
        self.status = TaskStatus::Completed;
        self.last_error = None;
        self.updated_at = now_ms;
    }

    pub(crate) fn fail(&mut self, error: String, now_ms: i64) {
        self.status = TaskStatus::Failed;
        self.last_error = Some(error);
        self.updated_at = now_ms;
    }
}

use bridge_traits::error::BridgeError;
use core_catalog::CatalogError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// A unique attribute is already held by another local product.
    #[error("Conflict: {field} '{value}' is already in use")]
    Conflict { field: String, value: String },

    #[error("Not found: {0}")]
    NotFound(String),

    /// Network or API failure reported by the remote catalog.
    #[error("Remote catalog error: {0}")]
    RemoteTransport(String),

    /// The task cannot run against the product in its current state.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Every propagation attempt failed.
    #[error("permanently failed after {attempts} attempts: {message}")]
    Exhausted { attempts: u32, message: String },

    #[error("Catalog error: {0}")]
    Catalog(CatalogError),

    #[error("Propagation queue is closed")]
    QueueClosed,

    #[error("Invalid task ID: {0}")]
    InvalidTaskId(String),

    #[error("Invalid value: {0}")]
    InvalidStatus(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl SyncError {
    /// Whether another propagation attempt may succeed.
    ///
    /// Precondition failures and exhausted tasks never are; everything else
    /// is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            SyncError::Precondition(_)
                | SyncError::Exhausted { .. }
                | SyncError::QueueClosed
                | SyncError::InvalidTaskId(_)
                | SyncError::InvalidStatus(_)
        )
    }
}

impl From<CatalogError> for SyncError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::Conflict { field, value } => SyncError::Conflict { field, value },
            CatalogError::NotFound { entity_type, id } => {
                SyncError::NotFound(format!("{} {}", entity_type, id))
            }
            other => SyncError::Catalog(other),
        }
    }
}

impl From<BridgeError> for SyncError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::NotFound(resource) => SyncError::NotFound(resource),
            other => SyncError::RemoteTransport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

use bridge_traits::error::BridgeError;
use core_catalog::CatalogError;
use core_sync::SyncError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Input rejected before it reached the catalog or the sync core.
    #[error("Validation failed: {field} - {message}")]
    Validation { field: String, message: String },

    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Product not found: {0}")]
    NotFound(String),

    #[error("Catalog error: {0}")]
    Catalog(CatalogError),

    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    #[error("Remote catalog error: {0}")]
    Remote(#[from] BridgeError),
}

impl CoreError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation { .. })
    }

    /// Status code the response layer should use: 422 for rejected input,
    /// 500 for every operational failure.
    pub fn http_status(&self) -> u16 {
        if self.is_validation() {
            422
        } else {
            500
        }
    }
}

impl From<CatalogError> for CoreError {
    fn from(error: CatalogError) -> Self {
        match error {
            CatalogError::InvalidInput { field, message } => {
                CoreError::Validation { field, message }
            }
            CatalogError::NotFound { entity_type, id } => {
                CoreError::NotFound(format!("{} {}", entity_type, id))
            }
            other => CoreError::Catalog(other),
        }
    }
}

impl From<core_runtime::error::Error> for CoreError {
    fn from(error: core_runtime::error::Error) -> Self {
        match error {
            core_runtime::error::Error::CapabilityMissing {
                capability,
                message,
            } => CoreError::CapabilityMissing {
                capability,
                message,
            },
            other => CoreError::Config(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_maps_to_422() {
        let error: CoreError = CatalogError::InvalidInput {
            field: "name".to_string(),
            message: "must not be empty".to_string(),
        }
        .into();
        assert!(error.is_validation());
        assert_eq!(error.http_status(), 422);
    }

    #[test]
    fn test_operational_failures_map_to_500() {
        let conflict: CoreError = CatalogError::conflict("sku", "MUG-1").into();
        assert_eq!(conflict.http_status(), 500);

        let remote: CoreError = BridgeError::OperationFailed("503".to_string()).into();
        assert_eq!(remote.http_status(), 500);

        let sync: CoreError = SyncError::Precondition("no external id".to_string()).into();
        assert_eq!(sync.http_status(), 500);
    }

    #[test]
    fn test_config_error_conversion() {
        let error: CoreError = core_runtime::error::Error::Config("bad url".to_string()).into();
        assert!(matches!(error, CoreError::Config(_)));
    }
}

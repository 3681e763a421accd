use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// The remote side answered that the addressed resource does not exist.
    #[error("Remote resource not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Transport-level failures that may succeed when attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::NotAvailable(_) | BridgeError::OperationFailed(_) | BridgeError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(BridgeError::OperationFailed("timeout".into()).is_retryable());
        assert!(BridgeError::NotAvailable("offline".into()).is_retryable());
        assert!(!BridgeError::NotFound("products/7".into()).is_retryable());
        assert!(!BridgeError::InvalidResponse("bad json".into()).is_retryable());
    }
}

//! Error types for the WooCommerce provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// WooCommerce provider errors
#[derive(Error, Debug)]
pub enum WooCommerceError {
    /// The store answered with a non-success status
    #[error("WooCommerce API error (status {status_code}, code {code}): {message}")]
    ApiError {
        status_code: u16,
        code: String,
        message: String,
    },

    /// The addressed resource does not exist
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Connector settings are unusable
    #[error("Invalid connector configuration: {0}")]
    Configuration(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for WooCommerce operations
pub type Result<T> = std::result::Result<T, WooCommerceError>;

impl From<WooCommerceError> for BridgeError {
    fn from(error: WooCommerceError) -> Self {
        match error {
            WooCommerceError::ApiError {
                status_code,
                code,
                message,
            } => BridgeError::OperationFailed(format!(
                "API error (status {}, {}): {}",
                status_code, code, message
            )),
            WooCommerceError::NotFound { resource } => BridgeError::NotFound(resource),
            WooCommerceError::ParseError(msg) => {
                BridgeError::InvalidResponse(format!("Parse error: {}", msg))
            }
            WooCommerceError::Configuration(msg) => BridgeError::NotAvailable(msg),
            WooCommerceError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = WooCommerceError::ApiError {
            status_code: 400,
            code: "product_invalid_sku".to_string(),
            message: "Invalid or duplicated SKU.".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "WooCommerce API error (status 400, code product_invalid_sku): Invalid or duplicated SKU."
        );
    }

    #[test]
    fn test_not_found_stays_distinguishable() {
        let bridge_error: BridgeError = WooCommerceError::NotFound {
            resource: "products/42".to_string(),
        }
        .into();

        assert!(matches!(bridge_error, BridgeError::NotFound(ref r) if r == "products/42"));
        assert!(!bridge_error.is_retryable());
    }

    #[test]
    fn test_api_error_is_retryable_transport_failure() {
        let bridge_error: BridgeError = WooCommerceError::ApiError {
            status_code: 503,
            code: "unavailable".to_string(),
            message: "maintenance".to_string(),
        }
        .into();

        assert!(bridge_error.is_retryable());
    }
}

//! # Checkout Error Types
//!
//! Typed error handling for the storefront checkout engine.
//! All fallible operations return `Result<T, CheckoutError>`.

use thiserror::Error;

/// Core error type for checkout, gateway and persistence operations
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// Configuration errors (missing keys, invalid config)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Order total is under the minimum chargeable amount
    #[error("Order total {total} is below the minimum of {minimum}")]
    BelowMinimum { total: String, minimum: String },

    /// Line items priced in different currencies
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch { expected: String, found: String },

    /// Gateway order creation failed or returned no payment session
    #[error("Order creation failed: {0}")]
    OrderCreationFailed(String),

    /// Payment provider API error
    #[error("Provider error [{provider}]: {message}")]
    ProviderError { provider: String, message: String },

    /// Network/HTTP error communicating with a remote service
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Rate limited by provider
    #[error("Rate limited by {provider}, retry after {retry_after_secs} seconds")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    /// Webhook signature verification failed
    #[error("Webhook verification failed: {0}")]
    WebhookVerificationFailed(String),

    /// Webhook payload parsing error
    #[error("Webhook parse error: {0}")]
    WebhookParseError(String),

    /// Persisted order not found
    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    /// Order already exists in the store
    #[error("Order already exists: {order_id}")]
    DuplicateOrder { order_id: String },

    /// Fulfillment status change that the lifecycle does not allow
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    /// Document store failure
    #[error("Store error: {0}")]
    Store(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CheckoutError {
    /// Returns true if this error is worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::NetworkError(_)
                | CheckoutError::RateLimited { .. }
                | CheckoutError::ProviderError { .. }
                | CheckoutError::Store(_)
        )
    }

    /// Returns the HTTP status code appropriate for this error
    pub fn status_code(&self) -> u16 {
        match self {
            CheckoutError::Configuration(_) => 500,
            CheckoutError::InvalidRequest(_) => 400,
            CheckoutError::BelowMinimum { .. } => 400,
            CheckoutError::CurrencyMismatch { .. } => 400,
            CheckoutError::OrderCreationFailed(_) => 502,
            CheckoutError::ProviderError { .. } => 502,
            CheckoutError::NetworkError(_) => 503,
            CheckoutError::RateLimited { .. } => 429,
            CheckoutError::WebhookVerificationFailed(_) => 401,
            CheckoutError::WebhookParseError(_) => 400,
            CheckoutError::OrderNotFound { .. } => 404,
            CheckoutError::DuplicateOrder { .. } => 409,
            CheckoutError::InvalidStatusTransition { .. } => 409,
            CheckoutError::Store(_) => 502,
            CheckoutError::Internal(_) => 500,
            CheckoutError::Serialization(_) => 500,
        }
    }
}

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Serialization(err.to_string())
    }
}

/// Result type alias for checkout operations
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CheckoutError::NetworkError("timeout".into()).is_retryable());
        assert!(CheckoutError::Store("503".into()).is_retryable());
        assert!(CheckoutError::RateLimited {
            provider: "cashfree".into(),
            retry_after_secs: 60
        }
        .is_retryable());
        assert!(!CheckoutError::BelowMinimum {
            total: "0.50".into(),
            minimum: "₹1.00".into()
        }
        .is_retryable());
        assert!(!CheckoutError::InvalidRequest("bad data".into()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(CheckoutError::InvalidRequest("bad data".into()).status_code(), 400);
        assert_eq!(
            CheckoutError::OrderNotFound {
                order_id: "order_1".into()
            }
            .status_code(),
            404
        );
        assert_eq!(
            CheckoutError::InvalidStatusTransition {
                from: "delivered".into(),
                to: "pending".into()
            }
            .status_code(),
            409
        );
    }
}

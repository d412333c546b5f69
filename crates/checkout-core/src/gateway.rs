//! # Payment Gateway Contracts
//!
//! Wire types and traits for the two halves of the payment gateway:
//!
//! ```text
//! ┌────────────────────────────┐        ┌─────────────────────────────┐
//! │  OrderService (server)     │        │  PaymentCollector (client)  │
//! │  ├── create_order()        │        │  └── collect()              │
//! │  └── fetch_payments()      │        │      Redirect | Error |     │
//! └────────────────────────────┘        │      Completed              │
//!                                       └─────────────────────────────┘
//! ```
//!
//! The order service holds the signed merchant credentials. The collector
//! drives the customer through the hosted checkout for a payment session.

use crate::error::{CheckoutError, CheckoutResult};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

/// Customer contact block sent with a gateway order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
}

/// Order metadata sent with a gateway order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderMeta {
    /// Where the gateway sends the customer after a redirect payment
    pub return_url: String,
}

/// Request to create a gateway order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    /// Amount in currency units
    pub order_amount: f64,
    pub order_currency: String,
    /// Locally generated order id
    pub order_id: String,
    pub customer_details: CustomerDetails,
    pub order_meta: OrderMeta,
}

/// Response to an order creation request.
///
/// Every field is optional on the wire; [`CreateOrderResponse::into_session`]
/// decides whether the response is usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CreateOrderResponse {
    /// Successful response
    pub fn created(
        cf_order_id: impl Into<String>,
        payment_session_id: impl Into<String>,
        order_id: impl Into<String>,
    ) -> Self {
        Self {
            cf_order_id: Some(cf_order_id.into()),
            payment_session_id: Some(payment_session_id.into()),
            order_id: Some(order_id.into()),
            error: None,
        }
    }

    /// Error response
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Validate the response into a payment session. An explicit error field
    /// or a missing session id fails the order.
    pub fn into_session(self, requested_order_id: &str) -> CheckoutResult<PaymentSession> {
        if let Some(error) = self.error {
            return Err(CheckoutError::OrderCreationFailed(error));
        }
        let payment_session_id = self
            .payment_session_id
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                CheckoutError::OrderCreationFailed("No payment session returned".to_string())
            })?;

        Ok(PaymentSession {
            payment_session_id,
            order_id: self
                .order_id
                .unwrap_or_else(|| requested_order_id.to_string()),
            cf_order_id: self.cf_order_id,
        })
    }
}

/// A payment session the collector can open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub payment_session_id: String,
    pub order_id: String,
    #[serde(default)]
    pub cf_order_id: Option<String>,
}

/// Payment status reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Success,
    Pending,
    Failed,
    Cancelled,
    /// Any status this service does not act on (USER_DROPPED, VOID, ...)
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Cancelled => "CANCELLED",
            PaymentStatus::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One payment attempt against a gateway order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    #[serde(
        default,
        deserialize_with = "string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub cf_payment_id: Option<String>,

    pub payment_status: PaymentStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_currency: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_reference: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_message: Option<String>,
}

impl PaymentRecord {
    /// Record carrying only a status
    pub fn with_status(payment_status: PaymentStatus) -> Self {
        Self {
            cf_payment_id: None,
            payment_status,
            payment_amount: None,
            payment_currency: None,
            payment_time: None,
            payment_method: None,
            bank_reference: None,
            payment_message: None,
        }
    }
}

/// The gateway sends payment ids as numbers on older API versions.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// How a payment collection error should be presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Customer closed or abandoned the checkout
    UserAborted,
    /// Connectivity problem between the customer and the gateway
    Network,
    Other,
}

/// Error reported by the payment collector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayFailure {
    #[serde(default)]
    pub code: Option<String>,
    pub message: String,
}

impl GatewayFailure {
    pub fn new(code: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            code: code.map(String::from),
            message: message.into(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        let code = self.code.as_deref().unwrap_or_default();
        if code == "payment_aborted" {
            return FailureKind::UserAborted;
        }
        if code.contains("network") || self.message.to_lowercase().contains("network") {
            return FailureKind::Network;
        }
        FailureKind::Other
    }
}

/// Terminal result of collecting a payment
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// Customer must finish in another window; the gateway returns them to
    /// the order's return URL.
    Redirect { url: Option<String> },
    /// Collection failed
    Error(GatewayFailure),
    /// Customer completed the checkout; the payment still needs verifying
    Completed,
}

/// Server-side gateway order operations
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Create a gateway order and payment session
    async fn create_order(&self, request: &CreateOrderRequest) -> CheckoutResult<CreateOrderResponse>;

    /// Payment attempts for an order, most recent first
    async fn fetch_payments(&self, order_id: &str) -> CheckoutResult<Vec<PaymentRecord>>;

    /// Provider name (for logging)
    fn provider_name(&self) -> &'static str;
}

/// Client-side hosted checkout
#[async_trait]
pub trait PaymentCollector: Send + Sync {
    async fn collect(&self, session: &PaymentSession) -> PaymentOutcome;
}

/// Type alias for a shared order service (dynamic dispatch)
pub type BoxedOrderService = Arc<dyn OrderService>;

/// Type alias for a shared payment collector
pub type BoxedPaymentCollector = Arc<dyn PaymentCollector>;

//! # Cashfree Webhook Handling
//!
//! Signature verification and dispatch for Cashfree payment webhooks.
//! Webhooks report payment results independently of the customer's browser,
//! which makes them the place to notice payments whose order never got
//! saved.
//!
//! Signature: `base64(HMAC-SHA256(client_secret, timestamp + raw_body))`,
//! carried in `x-webhook-signature` with the timestamp in
//! `x-webhook-timestamp` (milliseconds).

use crate::config::CashfreeConfig;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use checkout_core::{CheckoutError, CheckoutResult, PaymentRecord};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";
pub const TIMESTAMP_HEADER: &str = "x-webhook-timestamp";

/// Cashfree webhook event kinds this service reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventType {
    PaymentSuccess,
    PaymentFailed,
    PaymentUserDropped,
    Unknown(String),
}

impl WebhookEventType {
    fn parse(value: &str) -> Self {
        match value {
            "PAYMENT_SUCCESS_WEBHOOK" => Self::PaymentSuccess,
            "PAYMENT_FAILED_WEBHOOK" => Self::PaymentFailed,
            "PAYMENT_USER_DROPPED_WEBHOOK" => Self::PaymentUserDropped,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// A verified payment webhook
#[derive(Debug, Clone)]
pub struct PaymentWebhookEvent {
    pub event_type: WebhookEventType,
    pub order_id: Option<String>,
    pub order_amount: Option<f64>,
    pub order_currency: Option<String>,
    pub customer_id: Option<String>,
    pub payment: Option<PaymentRecord>,
    pub event_time: Option<String>,
    pub raw_data: serde_json::Value,
}

/// Verifies webhook signatures with the merchant secret
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    /// Maximum accepted clock skew, in seconds
    tolerance_secs: u64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_secs", &self.tolerance_secs)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: 300,
        }
    }

    pub fn from_config(config: &CashfreeConfig) -> Self {
        Self::new(config.client_secret.clone())
    }

    /// Builder: set the accepted clock skew
    pub fn with_tolerance_secs(mut self, secs: u64) -> Self {
        self.tolerance_secs = secs;
        self
    }

    /// Verify the signature and parse the event
    #[instrument(skip(self, payload, signature, timestamp))]
    pub fn verify(
        &self,
        payload: &[u8],
        signature: &str,
        timestamp: &str,
    ) -> CheckoutResult<PaymentWebhookEvent> {
        let sent_at: i64 = timestamp.trim().parse().map_err(|_| {
            CheckoutError::WebhookVerificationFailed("Invalid timestamp header".to_string())
        })?;

        let now_ms = Utc::now().timestamp_millis();
        if now_ms.abs_diff(sent_at) > self.tolerance_secs.saturating_mul(1000) {
            return Err(CheckoutError::WebhookVerificationFailed(
                "Timestamp outside tolerance".to_string(),
            ));
        }

        let provided = BASE64.decode(signature.trim()).map_err(|_| {
            CheckoutError::WebhookVerificationFailed("Signature is not base64".to_string())
        })?;

        // verify_slice compares in constant time
        self.mac_for(timestamp.trim(), payload)?
            .verify_slice(&provided)
            .map_err(|_| CheckoutError::WebhookVerificationFailed("Signature mismatch".to_string()))?;

        let event = parse_event(payload)?;
        debug!("Verified Cashfree webhook: type={:?}", event.event_type);
        Ok(event)
    }

    /// Signature for a payload, as Cashfree would send it
    pub fn sign(&self, timestamp: &str, payload: &[u8]) -> CheckoutResult<String> {
        let mac = self.mac_for(timestamp, payload)?;
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    fn mac_for(&self, timestamp: &str, payload: &[u8]) -> CheckoutResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| CheckoutError::Internal(format!("Invalid webhook key: {}", e)))?;
        mac.update(timestamp.as_bytes());
        mac.update(payload);
        Ok(mac)
    }
}

fn parse_event(payload: &[u8]) -> CheckoutResult<PaymentWebhookEvent> {
    let raw: serde_json::Value = serde_json::from_slice(payload).map_err(|e| {
        CheckoutError::WebhookParseError(format!("Failed to parse webhook: {}", e))
    })?;

    let body: CashfreeWebhookPayload = serde_json::from_value(raw.clone()).map_err(|e| {
        CheckoutError::WebhookParseError(format!("Unexpected webhook shape: {}", e))
    })?;

    let order = body.data.order.unwrap_or_default();
    Ok(PaymentWebhookEvent {
        event_type: WebhookEventType::parse(&body.event_type),
        order_id: order.order_id,
        order_amount: order.order_amount,
        order_currency: order.order_currency,
        customer_id: body.data.customer_details.and_then(|c| c.customer_id),
        payment: body.data.payment,
        event_time: body.event_time,
        raw_data: raw,
    })
}

// =============================================================================
// Cashfree Webhook Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CashfreeWebhookPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    event_time: Option<String>,
    data: CashfreeWebhookData,
}

#[derive(Debug, Deserialize)]
struct CashfreeWebhookData {
    #[serde(default)]
    order: Option<CashfreeWebhookOrder>,
    #[serde(default)]
    payment: Option<PaymentRecord>,
    #[serde(default)]
    customer_details: Option<CashfreeWebhookCustomer>,
}

#[derive(Debug, Default, Deserialize)]
struct CashfreeWebhookOrder {
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    order_amount: Option<f64>,
    #[serde(default)]
    order_currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CashfreeWebhookCustomer {
    #[serde(default)]
    customer_id: Option<String>,
}

// =============================================================================
// Dispatch
// =============================================================================

/// Webhook event handler
///
/// Implement this trait to react to payment events. Every method has a
/// logging default.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    /// Payment captured
    async fn on_payment_success(&self, event: &PaymentWebhookEvent) -> CheckoutResult<()> {
        info!(
            "Payment succeeded: order={:?}, amount={:?}",
            event.order_id, event.order_amount
        );
        Ok(())
    }

    async fn on_payment_failed(&self, event: &PaymentWebhookEvent) -> CheckoutResult<()> {
        warn!(
            "Payment failed: order={:?}, reason={:?}",
            event.order_id,
            event.payment.as_ref().and_then(|p| p.payment_message.as_deref())
        );
        Ok(())
    }

    /// Customer left the checkout before paying
    async fn on_payment_user_dropped(&self, event: &PaymentWebhookEvent) -> CheckoutResult<()> {
        info!("Payment dropped by customer: order={:?}", event.order_id);
        Ok(())
    }

    async fn on_unknown_event(&self, event: &PaymentWebhookEvent) -> CheckoutResult<()> {
        debug!("Unhandled webhook event: {:?}", event.event_type);
        Ok(())
    }
}

/// Handler that only logs events
pub struct LoggingWebhookHandler;

impl WebhookHandler for LoggingWebhookHandler {}

/// Dispatch a webhook event to the matching handler method
pub async fn dispatch_webhook_event(
    handler: &dyn WebhookHandler,
    event: &PaymentWebhookEvent,
) -> CheckoutResult<()> {
    match &event.event_type {
        WebhookEventType::PaymentSuccess => handler.on_payment_success(event).await,
        WebhookEventType::PaymentFailed => handler.on_payment_failed(event).await,
        WebhookEventType::PaymentUserDropped => handler.on_payment_user_dropped(event).await,
        WebhookEventType::Unknown(_) => handler.on_unknown_event(event).await,
    }
}

/// Events to enable on the Cashfree dashboard
pub const REQUIRED_WEBHOOK_EVENTS: &[&str] = &[
    "PAYMENT_SUCCESS_WEBHOOK",
    "PAYMENT_FAILED_WEBHOOK",
    "PAYMENT_USER_DROPPED_WEBHOOK",
];

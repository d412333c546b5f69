//! # Payment Reconciliation
//!
//! Webhook handler that cross-checks captured payments against the order
//! store. A successful payment with no stored order means the customer was
//! charged but every write of their order failed.

use async_trait::async_trait;
use checkout_cashfree::{PaymentWebhookEvent, WebhookHandler};
use checkout_core::{CheckoutResult, OrderStore};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of checking one payment against the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Order document exists
    Matched,
    /// Payment captured but no order document
    MissingOrder { order_id: String },
    /// Event carried no order id
    Unidentified,
}

pub struct ReconcilingWebhookHandler {
    store: Arc<dyn OrderStore>,
}

impl ReconcilingWebhookHandler {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// Look up the order a successful payment belongs to
    pub async fn reconcile(&self, event: &PaymentWebhookEvent) -> CheckoutResult<Reconciliation> {
        let Some(order_id) = event.order_id.as_deref() else {
            return Ok(Reconciliation::Unidentified);
        };

        match self.store.get(order_id).await? {
            Some(_) => Ok(Reconciliation::Matched),
            None => Ok(Reconciliation::MissingOrder {
                order_id: order_id.to_string(),
            }),
        }
    }
}

#[async_trait]
impl WebhookHandler for ReconcilingWebhookHandler {
    async fn on_payment_success(&self, event: &PaymentWebhookEvent) -> CheckoutResult<()> {
        match self.reconcile(event).await? {
            Reconciliation::Matched => {
                info!(order_id = ?event.order_id, "Payment confirmed for stored order");
            }
            Reconciliation::MissingOrder { order_id } => {
                warn!(
                    %order_id,
                    amount = ?event.order_amount,
                    customer_id = ?event.customer_id,
                    cf_payment_id = ?event.payment.as_ref().and_then(|p| p.cf_payment_id.as_deref()),
                    "Reconciliation needed: payment captured but no order saved"
                );
            }
            Reconciliation::Unidentified => {
                warn!("Payment webhook without order id");
            }
        }
        Ok(())
    }
}

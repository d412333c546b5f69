//! # Hosted Checkout
//!
//! Payment collection through the Cashfree hosted checkout page. The page
//! is opened in a separate window, so collection always ends in a redirect:
//! the gateway sends the customer back to the order's return URL and the
//! order history picks the payment up from there.

use crate::config::CashfreeConfig;
use async_trait::async_trait;
use checkout_core::{GatewayFailure, PaymentCollector, PaymentOutcome, PaymentSession};
use tracing::{debug, instrument};

/// Collector that hands the customer to the hosted checkout page
#[derive(Debug, Clone)]
pub struct HostedCheckoutCollector {
    config: CashfreeConfig,
}

impl HostedCheckoutCollector {
    pub fn new(config: &CashfreeConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

#[async_trait]
impl PaymentCollector for HostedCheckoutCollector {
    #[instrument(skip(self, session), fields(order_id = %session.order_id))]
    async fn collect(&self, session: &PaymentSession) -> PaymentOutcome {
        if session.payment_session_id.is_empty() {
            return PaymentOutcome::Error(GatewayFailure::new(
                Some("session_invalid"),
                "Payment session id is empty",
            ));
        }

        let url = self.config.checkout_url_for(&session.payment_session_id);
        debug!("Redirecting customer to hosted checkout");
        PaymentOutcome::Redirect { url: Some(url) }
    }
}

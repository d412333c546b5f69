//! # Checkout Policy
//!
//! Tunables for the checkout flow, loaded from `config/checkout.toml`.
//! Every field has a default, so an empty file (or no file) yields the
//! storefront's standard policy.

use crate::money::{Currency, Price};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Checkout policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutPolicy {
    /// Currency every order is charged in
    pub currency: Currency,

    /// Subtotal (currency units) at or above which delivery is free
    pub free_delivery_threshold: f64,

    /// Delivery fee (currency units) for items with no fee of their own
    pub default_delivery_fee: f64,

    /// Smallest order total (currency units) the gateway will accept
    pub minimum_order_amount: f64,

    /// Attempts for the order document write
    pub persist_attempts: u32,

    /// Pause between write attempts, in milliseconds
    pub persist_retry_delay_ms: u64,

    /// Gateway return URL; `{order_id}` is substituted
    pub return_url: String,

    /// Order history route
    pub orders_path: String,

    /// Cart route
    pub cart_path: String,

    /// Platform tag written on every order
    pub platform: String,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        Self {
            currency: Currency::INR,
            free_delivery_threshold: 499.0,
            default_delivery_fee: 50.0,
            minimum_order_amount: 1.0,
            persist_attempts: 3,
            persist_retry_delay_ms: 1000,
            return_url: "http://localhost:3000/orders?order_id={order_id}".to_string(),
            orders_path: "/orders".to_string(),
            cart_path: "/cart".to_string(),
            platform: "web".to_string(),
        }
    }
}

impl CheckoutPolicy {
    /// Load policy from a TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    pub fn free_delivery_threshold(&self) -> Price {
        Price::new(self.free_delivery_threshold, self.currency)
    }

    pub fn default_delivery_fee(&self) -> Price {
        Price::new(self.default_delivery_fee, self.currency)
    }

    pub fn minimum_order_amount(&self) -> Price {
        Price::new(self.minimum_order_amount, self.currency)
    }

    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }

    /// Return URL for a specific gateway order
    pub fn return_url_for(&self, order_id: &str) -> String {
        self.return_url.replace("{order_id}", order_id)
    }

    /// Builder: set the return URL template
    pub fn with_return_url(mut self, url: impl Into<String>) -> Self {
        self.return_url = url.into();
        self
    }
}

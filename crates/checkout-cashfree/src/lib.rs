//! # checkout-cashfree
//!
//! Cashfree payment gateway adapter for storefront-checkout.
//!
//! This crate provides both halves of the gateway contract:
//!
//! 1. **CashfreeOrderService** - Orders API (server side)
//!    - Creates gateway orders and payment sessions
//!    - Reads payment attempts back for verification
//!
//! 2. **HostedCheckoutCollector** - Hosted checkout (customer side)
//!    - Hands the payment session to the hosted checkout page
//!    - Always ends in a redirect back to the order's return URL
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkout_cashfree::{CashfreeConfig, CashfreeOrderService, HostedCheckoutCollector};
//! use checkout_core::OrderService;
//!
//! let config = CashfreeConfig::from_env()?;
//! let orders = CashfreeOrderService::new(config.clone())?;
//! let collector = HostedCheckoutCollector::new(&config);
//!
//! let response = orders.create_order(&request).await?;
//! ```
//!
//! ## Webhook Handling
//!
//! ```rust,ignore
//! use checkout_cashfree::webhook::{dispatch_webhook_event, LoggingWebhookHandler, WebhookVerifier};
//!
//! let verifier = WebhookVerifier::from_config(&config);
//! let event = verifier.verify(body, signature, timestamp)?;
//! dispatch_webhook_event(&LoggingWebhookHandler, &event).await?;
//! ```

pub mod config;
pub mod hosted;
pub mod orders;
pub mod webhook;

// Re-exports
pub use config::{CashfreeConfig, CashfreeEnvironment};
pub use hosted::HostedCheckoutCollector;
pub use orders::CashfreeOrderService;
pub use webhook::{
    dispatch_webhook_event, LoggingWebhookHandler, PaymentWebhookEvent, WebhookEventType,
    WebhookHandler, WebhookVerifier, REQUIRED_WEBHOOK_EVENTS, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

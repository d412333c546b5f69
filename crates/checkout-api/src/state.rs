//! # Application State
//!
//! Shared state for the Axum application.
//! Contains the gateway order service, webhook verifier, order store, and
//! checkout policy.

use crate::store::{DocumentStoreConfig, RestDocumentStore};
use anyhow::Context;
use checkout_cashfree::{CashfreeConfig, CashfreeOrderService, WebhookVerifier};
use checkout_core::{BoxedOrderService, CheckoutPolicy, InMemoryOrderStore, OrderStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the storefront
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Gateway order service
    pub orders: BoxedOrderService,
    /// Webhook signature verifier
    pub webhooks: WebhookVerifier,
    /// Persisted orders
    pub store: Arc<dyn OrderStore>,
    /// Checkout policy
    pub policy: Arc<CheckoutPolicy>,
    /// Application config
    pub config: AppConfig,
}

impl AppState {
    /// Build state from the environment and `config/checkout.toml`
    pub fn new() -> anyhow::Result<Self> {
        let config = AppConfig::from_env();
        let policy = load_checkout_policy()?;

        let cashfree = CashfreeConfig::from_env()
            .map_err(|e| anyhow::anyhow!("Failed to load Cashfree config: {}", e))?
            .with_checkout_page_url(format!(
                "{}/pay?session_id={{session_id}}",
                config.base_url.trim_end_matches('/')
            ));
        let webhooks = WebhookVerifier::from_config(&cashfree);
        let orders = CashfreeOrderService::new(cashfree)
            .map_err(|e| anyhow::anyhow!("Failed to initialize Cashfree: {}", e))?;

        let store: Arc<dyn OrderStore> = match DocumentStoreConfig::from_env()? {
            Some(store_config) => {
                info!("Orders persisted to {}", store_config.endpoint);
                Arc::new(RestDocumentStore::new(store_config)?)
            }
            None => {
                warn!("DOCUMENT_STORE_URL not set, orders are kept in memory");
                Arc::new(InMemoryOrderStore::new())
            }
        };

        Ok(Self::from_parts(Arc::new(orders), webhooks, store, policy, config))
    }

    /// Assemble state from prepared parts
    pub fn from_parts(
        orders: BoxedOrderService,
        webhooks: WebhookVerifier,
        store: Arc<dyn OrderStore>,
        policy: CheckoutPolicy,
        config: AppConfig,
    ) -> Self {
        Self {
            orders,
            webhooks,
            store,
            policy: Arc::new(policy),
            config,
        }
    }
}

/// Load checkout policy from config file
fn load_checkout_policy() -> anyhow::Result<CheckoutPolicy> {
    let config_paths = [
        "config/checkout.toml",
        "../config/checkout.toml",
        "../../config/checkout.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            let policy = CheckoutPolicy::from_toml(&content)
                .with_context(|| format!("Failed to parse {}", path))?;
            info!(
                "Loaded checkout policy from {}: free delivery from {}",
                path,
                policy.free_delivery_threshold().display()
            );
            return Ok(policy);
        }
    }

    warn!("No checkout policy found, using defaults");
    Ok(CheckoutPolicy::default())
}

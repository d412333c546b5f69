//! # Cashfree Configuration
//!
//! Configuration management for the Cashfree PG integration.
//! Credentials are loaded from environment variables.

use checkout_core::CheckoutError;
use std::env;

const SANDBOX_BASE_URL: &str = "https://sandbox.cashfree.com/pg";
const PRODUCTION_BASE_URL: &str = "https://api.cashfree.com/pg";
const API_VERSION: &str = "2023-08-01";

/// Cashfree deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CashfreeEnvironment {
    Sandbox,
    Production,
}

impl CashfreeEnvironment {
    pub fn parse(value: &str) -> Result<Self, CheckoutError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sandbox" | "test" => Ok(Self::Sandbox),
            "production" | "prod" | "live" => Ok(Self::Production),
            other => Err(CheckoutError::Configuration(format!(
                "CASHFREE_ENVIRONMENT must be sandbox or production, got '{}'",
                other
            ))),
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Self::Sandbox => SANDBOX_BASE_URL,
            Self::Production => PRODUCTION_BASE_URL,
        }
    }
}

/// Cashfree API configuration
#[derive(Debug, Clone)]
pub struct CashfreeConfig {
    /// App id (x-client-id)
    pub client_id: String,

    /// Secret key (x-client-secret); also signs webhooks
    pub client_secret: String,

    pub environment: CashfreeEnvironment,

    /// API base URL (overridable for testing)
    pub api_base_url: String,

    /// x-api-version header
    pub api_version: String,

    /// Hosted checkout page. `{session_id}` is replaced with the payment
    /// session id.
    pub checkout_page_url: String,
}

impl CashfreeConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `CASHFREE_CLIENT_ID`
    /// - `CASHFREE_CLIENT_SECRET`
    ///
    /// Optional:
    /// - `CASHFREE_ENVIRONMENT` (`sandbox` by default)
    /// - `CASHFREE_CHECKOUT_PAGE_URL`
    pub fn from_env() -> Result<Self, CheckoutError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let client_id = env::var("CASHFREE_CLIENT_ID").map_err(|_| {
            CheckoutError::Configuration("CASHFREE_CLIENT_ID not set".to_string())
        })?;

        let client_secret = env::var("CASHFREE_CLIENT_SECRET").map_err(|_| {
            CheckoutError::Configuration("CASHFREE_CLIENT_SECRET not set".to_string())
        })?;

        if client_id.trim().is_empty() || client_secret.trim().is_empty() {
            return Err(CheckoutError::Configuration(
                "Cashfree credentials must not be empty".to_string(),
            ));
        }

        let environment = match env::var("CASHFREE_ENVIRONMENT") {
            Ok(value) => CashfreeEnvironment::parse(&value)?,
            Err(_) => CashfreeEnvironment::Sandbox,
        };

        let mut config = Self::new(client_id, client_secret, environment);
        if let Ok(page) = env::var("CASHFREE_CHECKOUT_PAGE_URL") {
            config.checkout_page_url = page;
        }
        Ok(config)
    }

    /// Create config with explicit values (for testing)
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        environment: CashfreeEnvironment,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            environment,
            api_base_url: environment.base_url().to_string(),
            api_version: API_VERSION.to_string(),
            checkout_page_url: "http://localhost:3000/pay?session_id={session_id}".to_string(),
        }
    }

    pub fn is_sandbox(&self) -> bool {
        self.environment == CashfreeEnvironment::Sandbox
    }

    /// Hosted checkout URL for a payment session
    pub fn checkout_url_for(&self, payment_session_id: &str) -> String {
        self.checkout_page_url
            .replace("{session_id}", payment_session_id)
    }

    /// Builder: set custom API base URL (for testing)
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Builder: set the hosted checkout page template
    pub fn with_checkout_page_url(mut self, url: impl Into<String>) -> Self {
        self.checkout_page_url = url.into();
        self
    }
}

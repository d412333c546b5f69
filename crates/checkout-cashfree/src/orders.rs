//! # Cashfree Orders API
//!
//! Server-side half of the gateway: creates orders (which yields the payment
//! session the hosted checkout opens) and reads back payment attempts for
//! verification.

use crate::config::CashfreeConfig;
use async_trait::async_trait;
use checkout_core::{
    CheckoutError, CheckoutResult, CreateOrderRequest, CreateOrderResponse, OrderService,
    PaymentRecord,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

const PROVIDER: &str = "cashfree";

/// Cashfree PG order service
pub struct CashfreeOrderService {
    config: CashfreeConfig,
    client: Client,
}

impl CashfreeOrderService {
    /// Create a new order service with a 30 s request timeout
    pub fn new(config: CashfreeConfig) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    /// Create from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        Self::new(CashfreeConfig::from_env()?)
    }

    pub fn config(&self) -> &CashfreeConfig {
        &self.config
    }

    /// Attach credentials and versioning headers
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-client-id", &self.config.client_id)
            .header("x-client-secret", &self.config.client_secret)
            .header("x-api-version", &self.config.api_version)
            .header("x-request-id", Uuid::new_v4().to_string())
    }

    /// Read a response body, mapping non-2xx statuses to errors
    async fn read_json<T: DeserializeOwned>(response: Response) -> CheckoutResult<T> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get("x-ratelimit-retry")
            .or_else(|| response.headers().get(reqwest::header::RETRY_AFTER))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let body = response
            .text()
            .await
            .map_err(|e| CheckoutError::NetworkError(e.to_string()))?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CheckoutError::RateLimited {
                provider: PROVIDER.to_string(),
                retry_after_secs: retry_after.unwrap_or(1),
            });
        }

        if !status.is_success() {
            error!("Cashfree API error: status={}, body={}", status, body);

            let message = match serde_json::from_str::<CashfreeErrorResponse>(&body) {
                Ok(err) => match err.code {
                    Some(code) => format!("{} ({})", err.message, code),
                    None => err.message,
                },
                Err(_) => format!("HTTP {}: {}", status, body),
            };
            return Err(CheckoutError::ProviderError {
                provider: PROVIDER.to_string(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            CheckoutError::Serialization(format!("Failed to parse Cashfree response: {}", e))
        })
    }
}

#[async_trait]
impl OrderService for CashfreeOrderService {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_order(&self, request: &CreateOrderRequest) -> CheckoutResult<CreateOrderResponse> {
        check_order_id(&request.order_id)?;
        if request.order_amount <= 0.0 {
            return Err(CheckoutError::InvalidRequest(
                "Order amount must be positive".to_string(),
            ));
        }

        debug!(
            "Creating Cashfree order: amount={} {}",
            request.order_amount, request.order_currency
        );

        let url = format!("{}/orders", self.config.api_base_url);
        let response = self
            .authorized(self.client.post(&url))
            .json(request)
            .send()
            .await
            .map_err(|e| CheckoutError::NetworkError(e.to_string()))?;

        let order: CashfreeOrderEntity = Self::read_json(response).await?;

        info!(
            "Created Cashfree order: cf_order_id={:?}, status={:?}",
            order.cf_order_id, order.order_status
        );

        Ok(CreateOrderResponse {
            cf_order_id: order.cf_order_id.map(id_to_string),
            payment_session_id: order.payment_session_id,
            order_id: order.order_id,
            error: None,
        })
    }

    #[instrument(skip(self))]
    async fn fetch_payments(&self, order_id: &str) -> CheckoutResult<Vec<PaymentRecord>> {
        check_order_id(order_id)?;

        let url = format!("{}/orders/{}/payments", self.config.api_base_url, order_id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| CheckoutError::NetworkError(e.to_string()))?;

        let payments: Vec<PaymentRecord> = Self::read_json(response).await?;
        debug!("Fetched {} payment(s)", payments.len());
        Ok(payments)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

// =============================================================================
// Cashfree API Types
// =============================================================================

#[derive(Debug, Deserialize)]
struct CashfreeOrderEntity {
    #[serde(default)]
    cf_order_id: Option<serde_json::Value>,
    #[serde(default)]
    order_id: Option<String>,
    #[serde(default)]
    payment_session_id: Option<String>,
    #[serde(default)]
    order_status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CashfreeErrorResponse {
    message: String,
    #[serde(default)]
    code: Option<String>,
}

/// Order ids arrive as strings on current API versions, numbers on older ones.
/// Cashfree order ids: 1 to 45 characters from `[A-Za-z0-9_-]`
fn check_order_id(order_id: &str) -> CheckoutResult<()> {
    if order_id.is_empty() {
        return Err(CheckoutError::InvalidRequest("order_id is required".to_string()));
    }
    let valid = order_id.len() <= 45
        && order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        return Err(CheckoutError::InvalidRequest(format!(
            "Invalid order_id: {}",
            order_id
        )));
    }
    Ok(())
}

fn id_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

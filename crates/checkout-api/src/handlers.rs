//! # Request Handlers
//!
//! Axum request handlers for the checkout API.

use crate::reconcile::ReconcilingWebhookHandler;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use checkout_cashfree::{dispatch_webhook_event, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use checkout_core::{
    CheckoutError, CreateOrderRequest, CreateOrderResponse, Currency, LineItem, OrderStatus,
    OrderSummary, PaymentRecord, PersistedOrder, SummaryDocument,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Verify payment request
#[derive(Debug, Deserialize)]
pub struct VerifyOrderRequest {
    pub order_id: String,
}

/// Order summary request
#[derive(Debug, Deserialize)]
pub struct SummaryRequest {
    /// Line items selected for checkout
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// Order summary response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: SummaryDocument,
    pub currency: Currency,
    pub free_delivery: bool,
    pub free_delivery_threshold: f64,
    pub item_count: u32,
}

/// Order history query
#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Order history response
#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<PersistedOrder>,
    pub count: usize,
}

/// Status change request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: u16) -> Self {
        Self {
            error: error.into(),
            code,
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn checkout_error_to_response(err: CheckoutError) -> ApiError {
    let code = err.status_code();
    let mut response = ErrorResponse::new(err.to_string(), code);
    if err.is_retryable() {
        response = response.with_details("retryable");
    }
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        Json(response),
    )
}

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(message, 400)),
    )
}

// =============================================================================
// Handlers
// =============================================================================

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "storefront-checkout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Create a gateway order and payment session
#[instrument(skip(state, request), fields(order_id = %request.order_id))]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    if request.order_id.trim().is_empty() {
        return Err(bad_request("order_id is required"));
    }

    let currency = Currency::from_code(&request.order_currency)
        .ok_or_else(|| bad_request(format!("Unsupported currency: {}", request.order_currency)))?;
    if currency != state.policy.currency {
        return Err(checkout_error_to_response(CheckoutError::CurrencyMismatch {
            expected: state.policy.currency.as_str().to_string(),
            found: currency.as_str().to_string(),
        }));
    }

    let minimum = state.policy.minimum_order_amount();
    if request.order_amount < minimum.as_decimal() {
        return Err(checkout_error_to_response(CheckoutError::BelowMinimum {
            total: format!("{:.2}", request.order_amount),
            minimum: minimum.display(),
        }));
    }

    info!(
        "Creating order: amount={} {}, customer={}",
        request.order_amount, request.order_currency, request.customer_details.customer_id
    );

    let response = state.orders.create_order(&request).await.map_err(|e| {
        error!("Failed to create order: {}", e);
        checkout_error_to_response(e)
    })?;

    Ok(Json(response))
}

/// Fetch payment attempts for an order
#[instrument(skip(state, request), fields(order_id = %request.order_id))]
pub async fn verify_order(
    State(state): State<AppState>,
    Json(request): Json<VerifyOrderRequest>,
) -> Result<Json<Vec<PaymentRecord>>, ApiError> {
    if request.order_id.trim().is_empty() {
        return Err(bad_request("order_id is required"));
    }

    let payments = state
        .orders
        .fetch_payments(&request.order_id)
        .await
        .map_err(|e| {
            warn!("Payment verification failed: {}", e);
            checkout_error_to_response(e)
        })?;

    Ok(Json(payments))
}

/// Price a set of line items
#[instrument(skip(state, request), fields(items = request.items.len()))]
pub async fn checkout_summary(
    State(state): State<AppState>,
    Json(request): Json<SummaryRequest>,
) -> Result<Json<SummaryResponse>, ApiError> {
    let summary =
        OrderSummary::compute(&request.items, &state.policy).map_err(checkout_error_to_response)?;

    Ok(Json(SummaryResponse {
        summary: SummaryDocument::from(&summary),
        currency: state.policy.currency,
        free_delivery: !request.items.is_empty() && summary.has_free_delivery(),
        free_delivery_threshold: state.policy.free_delivery_threshold,
        item_count: request
            .items
            .iter()
            .fold(0u32, |n, i| n.saturating_add(i.quantity)),
    }))
}

/// Order history for a user, newest first
#[instrument(skip(state))]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrdersQuery>,
) -> Result<Json<OrdersResponse>, ApiError> {
    let user_id = query
        .user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| bad_request("user_id is required"))?;

    let orders = state
        .store
        .list_for_user(&user_id)
        .await
        .map_err(checkout_error_to_response)?;

    Ok(Json(OrdersResponse {
        count: orders.len(),
        orders,
    }))
}

/// Single order
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<PersistedOrder>, ApiError> {
    let order = state
        .store
        .get(&order_id)
        .await
        .map_err(checkout_error_to_response)?
        .ok_or_else(|| checkout_error_to_response(CheckoutError::OrderNotFound { order_id }))?;

    Ok(Json(order))
}

/// Move an order to a new fulfillment status
#[instrument(skip(state, request), fields(status = %request.status))]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<PersistedOrder>, ApiError> {
    let order = state
        .store
        .update_status(&order_id, request.status)
        .await
        .map_err(|e| {
            warn!("Status update rejected: {}", e);
            checkout_error_to_response(e)
        })?;

    info!("Order {} is now {}", order.order_id, order.order_status);
    Ok(Json(order))
}

/// Handle Cashfree webhook
#[instrument(skip(state, headers, body))]
pub async fn cashfree_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| bad_request(format!("Missing {} header", name)))
    };
    let signature = header(SIGNATURE_HEADER)?;
    let timestamp = header(TIMESTAMP_HEADER)?;

    let event = state
        .webhooks
        .verify(&body, signature, timestamp)
        .map_err(|e| {
            error!("Webhook verification failed: {}", e);
            checkout_error_to_response(e)
        })?;

    info!(
        "Received webhook: type={:?}, order={:?}",
        event.event_type, event.order_id
    );

    let handler = ReconcilingWebhookHandler::new(state.store.clone());
    dispatch_webhook_event(&handler, &event).await.map_err(|e| {
        error!("Webhook handler error: {}", e);
        checkout_error_to_response(e)
    })?;

    Ok(StatusCode::OK)
}

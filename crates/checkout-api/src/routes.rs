//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Orders:
///   - POST  /api/v1/orders/create - Create gateway order and payment session
///   - POST  /api/v1/orders/verify - Payment attempts for an order
///   - GET   /api/v1/orders?user_id= - Order history
///   - GET   /api/v1/orders/{order_id} - Single order
///   - PATCH /api/v1/orders/{order_id}/status - Fulfillment status change
///
/// - Checkout:
///   - POST /api/v1/checkout/summary - Price selected line items
///
/// - Webhooks:
///   - POST /webhook/cashfree - Cashfree payment webhook
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/orders", get(handlers::list_orders))
        .route("/orders/create", post(handlers::create_order))
        .route("/orders/verify", post(handlers::verify_order))
        .route("/orders/{order_id}", get(handlers::get_order))
        .route("/orders/{order_id}/status", patch(handlers::update_order_status))
        .route("/checkout/summary", post(handlers::checkout_summary));

    // Webhooks read the raw body for signature verification
    let webhook_routes = Router::new().route("/cashfree", post(handlers::cashfree_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

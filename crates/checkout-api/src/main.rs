//! # Storefront Checkout
//!
//! Checkout and payment API for the storefront.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export CASHFREE_CLIENT_ID=...
//! export CASHFREE_CLIENT_SECRET=...
//! export CASHFREE_ENVIRONMENT=sandbox
//! export DOCUMENT_STORE_URL=https://cloud.appwrite.io/v1
//! export LOG_FORMAT=json   # optional
//!
//! # Run the server
//! storefront-checkout
//! ```

use checkout_api::{routes, state::AppState};
use checkout_cashfree::REQUIRED_WEBHOOK_EVENTS;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; LOG_FORMAT=json for structured output
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    let fmt_layer = if json_logs {
        fmt::layer().json().boxed()
    } else {
        fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Payment provider: {}", state.orders.provider_name());
    info!(
        "Checkout policy: free delivery from {}, {} persist attempts",
        state.policy.free_delivery_threshold().display(),
        state.policy.persist_attempts
    );

    let app = routes::create_router(state);

    info!(
        "storefront-checkout {} starting on http://{}",
        env!("CARGO_PKG_VERSION"),
        addr
    );

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Create order: POST http://{}/api/v1/orders/create", addr);
        info!("Webhook: POST http://{}/webhook/cashfree", addr);
        info!(
            "Enable these events on the Cashfree webhook: {}",
            REQUIRED_WEBHOOK_EVENTS.join(", ")
        );
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

//! # checkout-api
//!
//! HTTP API layer for storefront-checkout.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for gateway orders, order history, and checkout summaries
//! - Cashfree webhook handling with payment reconciliation
//! - REST document store for persisted orders
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | POST | `/api/v1/orders/create` | Create gateway order |
//! | POST | `/api/v1/orders/verify` | Payment attempts for an order |
//! | POST | `/api/v1/checkout/summary` | Price selected line items |
//! | GET | `/api/v1/orders?user_id=` | Order history |
//! | GET | `/api/v1/orders/{order_id}` | Get order |
//! | PATCH | `/api/v1/orders/{order_id}/status` | Update fulfillment status |
//! | POST | `/webhook/cashfree` | Cashfree webhook |

pub mod handlers;
pub mod reconcile;
pub mod routes;
pub mod state;
pub mod store;

pub use routes::create_router;
pub use state::{AppConfig, AppState};

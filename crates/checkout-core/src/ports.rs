//! # Checkout Collaborators
//!
//! Traits for the stores and sinks the checkout orchestrator is wired to.
//! Each one is injected as a trait object so the orchestrator never reaches
//! for ambient state.

use crate::address::Address;
use crate::cart::{LineItem, Variants};
use crate::error::CheckoutResult;
use crate::order::{OrderStatus, PersistedOrder};
use async_trait::async_trait;

/// Supplies the delivery address for the current checkout
#[async_trait]
pub trait AddressProvider: Send + Sync {
    async fn selected(&self) -> Option<Address>;
}

/// Owns the customer's cart and the subset selected for checkout
#[async_trait]
pub trait CartProvider: Send + Sync {
    /// Line items selected for checkout
    async fn list(&self) -> CheckoutResult<Vec<LineItem>>;

    /// Remove cart entries for a product with exactly these variants
    async fn remove_matching(&self, product_id: &str, variants: &Variants) -> CheckoutResult<()>;

    /// Forget which items were selected for checkout
    async fn clear_selection(&self) -> CheckoutResult<()>;
}

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Info,
    Warning,
    Error,
}

/// Sink for user-facing notifications (toasts)
pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NoticeKind, title: &str, message: &str);
}

/// Client-side navigation
pub trait Navigator: Send + Sync {
    /// Navigate, keeping the current page in history
    fn push(&self, path: &str);

    /// Navigate, replacing the current history entry
    fn replace(&self, path: &str);
}

/// Durable storage for persisted orders
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Write a new order document
    async fn create(&self, order: &PersistedOrder) -> CheckoutResult<()>;

    async fn get(&self, order_id: &str) -> CheckoutResult<Option<PersistedOrder>>;

    /// A user's orders, newest first
    async fn list_for_user(&self, user_id: &str) -> CheckoutResult<Vec<PersistedOrder>>;

    /// Move an order to a new fulfillment status
    async fn update_status(&self, order_id: &str, status: OrderStatus)
        -> CheckoutResult<PersistedOrder>;
}

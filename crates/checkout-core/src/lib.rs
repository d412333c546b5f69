//! # checkout-core
//!
//! Core types and traits for the storefront checkout flow.
//!
//! This crate provides:
//! - `CheckoutOrchestrator` driving cart → gateway order → payment → verified order
//! - `OrderService` and `PaymentCollector` traits for payment gateways
//! - `LineItem`, `OrderSummary`, and `PersistedOrder` for the order document
//! - `AddressProvider`, `CartProvider`, `OrderStore`, `Notifier`, `Navigator` collaborators
//! - `CheckoutPolicy` for delivery, minimum amount, and retry settings
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{CheckoutCollaborators, CheckoutOrchestrator, CheckoutOutcome, CheckoutPolicy};
//!
//! let orchestrator = CheckoutOrchestrator::new(CheckoutPolicy::default(), collaborators);
//!
//! match orchestrator.place_order("user_42").await {
//!     CheckoutOutcome::Placed(placed) => println!("placed {}", placed.order.order_id),
//!     CheckoutOutcome::AwaitingRedirect { url, .. } => println!("continue at {:?}", url),
//!     other => println!("not placed: {:?}", other),
//! }
//! ```

pub mod address;
pub mod cart;
pub mod checkout;
pub mod delivery;
pub mod error;
pub mod gateway;
pub mod memory;
pub mod money;
pub mod order;
pub mod policy;
pub mod ports;
pub mod retry;

// Re-exports for convenience
pub use address::{Address, AddressBook};
pub use cart::{variant_signature, CartKey, LineItem, Variants};
pub use checkout::{
    BlockReason, CheckoutCollaborators, CheckoutOrchestrator, CheckoutOutcome, CheckoutState,
    PlacedOrder,
};
pub use delivery::{delivery_fee, FreeDeliveryTracker};
pub use error::{CheckoutError, CheckoutResult};
pub use gateway::{
    BoxedOrderService, BoxedPaymentCollector, CreateOrderRequest, CreateOrderResponse,
    CustomerDetails, FailureKind, GatewayFailure, OrderMeta, OrderService, PaymentCollector,
    PaymentOutcome, PaymentRecord, PaymentSession, PaymentStatus,
};
pub use memory::{InMemoryCart, InMemoryOrderStore};
pub use money::{Currency, Price};
pub use order::{
    OrderDraft, OrderStatus, OrderSummary, OrderedProduct, PaymentDetails, PersistedOrder,
    SummaryDocument,
};
pub use policy::CheckoutPolicy;
pub use ports::{AddressProvider, CartProvider, Navigator, NoticeKind, Notifier, OrderStore};
pub use retry::{retry_with_fixed_delay, RetryPolicy};

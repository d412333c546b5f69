//! # Checkout Orchestrator
//!
//! Drives one checkout attempt from the customer's cart to a persisted
//! order:
//!
//! ```text
//! Idle ─► OrderCreated ─┬─► RedirectWait                      (return early)
//!                       ├─► PaymentError                      (end)
//!                       └─► PaymentComplete ─► Verifying ─┬─► Persisting ─► Done
//!                                                         └─► Ended
//! ```
//!
//! Every branch tells the customer what happened through the [`Notifier`]
//! and most of them navigate. Successful orders replace the checkout page in
//! history; soft failures push so the back button returns to checkout.
//!
//! Nothing is persisted before the gateway confirms payment, and no state
//! survives the process: a redirect payment relies on the gateway's return
//! URL to bring the customer back.

use crate::address::Address;
use crate::cart::{CartKey, LineItem};
use crate::delivery::FreeDeliveryTracker;
use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::{
    BoxedOrderService, BoxedPaymentCollector, CreateOrderRequest, CustomerDetails, FailureKind,
    OrderMeta, PaymentOutcome, PaymentRecord, PaymentSession, PaymentStatus,
};
use crate::order::{OrderDraft, OrderSummary, PaymentDetails, PersistedOrder};
use crate::policy::CheckoutPolicy;
use crate::ports::{AddressProvider, CartProvider, Navigator, NoticeKind, Notifier, OrderStore};
use crate::retry::{retry_with_fixed_delay, RetryPolicy};
use chrono::Utc;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

/// Where a checkout attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Idle,
    OrderCreated,
    RedirectWait,
    PaymentError,
    PaymentComplete,
    Verifying,
    Persisting,
    Done,
    /// Finished without an order being placed
    Ended,
}

/// Why an attempt was refused before any remote call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockReason {
    /// Another attempt is still running
    InProgress,
    MissingAddress,
    BelowMinimum { total: String, minimum: String },
    InvalidCart(String),
}

/// An order that was paid for and saved
#[derive(Debug)]
pub struct PlacedOrder {
    pub order: PersistedOrder,
    /// Background cart cleanup; the checkout flow does not wait for it
    pub cleanup: JoinHandle<()>,
}

/// Result of [`CheckoutOrchestrator::place_order`]
#[derive(Debug)]
pub enum CheckoutOutcome {
    Blocked(BlockReason),
    OrderCreationFailed {
        message: String,
    },
    /// Customer is completing payment elsewhere
    AwaitingRedirect {
        order_id: String,
        url: Option<String>,
    },
    PaymentFailed {
        order_id: String,
        kind: FailureKind,
        message: String,
    },
    /// Verification gave no answer; the order history will show the result
    VerificationUnclear {
        order_id: String,
    },
    PaymentNotCompleted {
        order_id: String,
        status: PaymentStatus,
    },
    Placed(PlacedOrder),
    /// Payment succeeded but every write of the order document failed. The
    /// document is handed back so the caller can reconcile it.
    Unsaved {
        order: PersistedOrder,
        error: String,
    },
}

impl CheckoutOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, CheckoutOutcome::Placed(_))
    }
}

/// The collaborators a checkout is wired to
#[derive(Clone)]
pub struct CheckoutCollaborators {
    pub addresses: Arc<dyn AddressProvider>,
    pub cart: Arc<dyn CartProvider>,
    pub orders: BoxedOrderService,
    pub collector: BoxedPaymentCollector,
    pub store: Arc<dyn OrderStore>,
    pub notifier: Arc<dyn Notifier>,
    pub navigator: Arc<dyn Navigator>,
}

/// Coordinates address, cart, gateway and order store for one customer
/// session.
pub struct CheckoutOrchestrator {
    policy: CheckoutPolicy,
    deps: CheckoutCollaborators,
    free_delivery: FreeDeliveryTracker,
    processing: AtomicBool,
    state: watch::Sender<CheckoutState>,
}

/// Clears the processing flag however the attempt ends
struct ProcessingGuard<'a>(&'a AtomicBool);

impl Drop for ProcessingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl CheckoutOrchestrator {
    pub fn new(policy: CheckoutPolicy, deps: CheckoutCollaborators) -> Self {
        let (state, _) = watch::channel(CheckoutState::Idle);
        Self {
            policy,
            deps,
            free_delivery: FreeDeliveryTracker::new(),
            processing: AtomicBool::new(false),
            state,
        }
    }

    pub fn policy(&self) -> &CheckoutPolicy {
        &self.policy
    }

    /// Current state
    pub fn state(&self) -> CheckoutState {
        *self.state.borrow()
    }

    /// Watch state changes
    pub fn subscribe(&self) -> watch::Receiver<CheckoutState> {
        self.state.subscribe()
    }

    /// Whether an attempt is running (the submit button is disabled)
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::SeqCst)
    }

    fn set_state(&self, next: CheckoutState) {
        debug!(state = ?next, "checkout state");
        self.state.send_replace(next);
    }

    fn notify(&self, kind: NoticeKind, title: &str, message: &str) {
        self.deps.notifier.notify(kind, title, message);
    }

    /// Recompute the order summary for the selected items. Fires the free
    /// delivery notification the first time it is reached this session.
    pub async fn refresh_summary(&self) -> CheckoutResult<OrderSummary> {
        let items = self.deps.cart.list().await?;
        let summary = OrderSummary::compute(&items, &self.policy)?;

        if self.free_delivery.observe(&items, summary.delivery_fee) {
            self.notify(
                NoticeKind::Success,
                "Free delivery unlocked",
                "Your order now ships free.",
            );
        }
        Ok(summary)
    }

    /// Run one checkout attempt for `customer_id`.
    #[instrument(skip(self))]
    pub async fn place_order(&self, customer_id: &str) -> CheckoutOutcome {
        if self.processing.swap(true, Ordering::SeqCst) {
            warn!("Checkout already in progress");
            return CheckoutOutcome::Blocked(BlockReason::InProgress);
        }
        let _guard = ProcessingGuard(&self.processing);

        self.set_state(CheckoutState::Idle);
        self.run(customer_id).await
    }

    async fn run(&self, customer_id: &str) -> CheckoutOutcome {
        let (address, draft) = match self.check_preconditions().await {
            Ok(ready) => ready,
            Err(reason) => return CheckoutOutcome::Blocked(reason),
        };

        let session = match self.create_remote_order(customer_id, &address, &draft).await {
            Ok(session) => session,
            Err(message) => {
                self.set_state(CheckoutState::Ended);
                return CheckoutOutcome::OrderCreationFailed { message };
            }
        };
        self.set_state(CheckoutState::OrderCreated);

        match self.deps.collector.collect(&session).await {
            PaymentOutcome::Redirect { url } => {
                self.set_state(CheckoutState::RedirectWait);
                info!(order_id = %session.order_id, "Payment continues in gateway window");
                self.notify(
                    NoticeKind::Info,
                    "Complete your payment",
                    "Finish the payment in the gateway window. You will be brought back to your orders.",
                );
                return CheckoutOutcome::AwaitingRedirect {
                    order_id: session.order_id,
                    url,
                };
            }
            PaymentOutcome::Error(failure) => {
                self.set_state(CheckoutState::PaymentError);
                let kind = failure.kind();
                warn!(order_id = %session.order_id, ?kind, "Payment collection failed: {}", failure.message);
                match kind {
                    FailureKind::UserAborted => self.notify(
                        NoticeKind::Warning,
                        "Payment cancelled",
                        "You closed the payment window. No money was taken.",
                    ),
                    FailureKind::Network => self.notify(
                        NoticeKind::Error,
                        "Network error",
                        "We could not reach the payment gateway. Check your connection and try again.",
                    ),
                    FailureKind::Other => {
                        self.notify(NoticeKind::Error, "Payment failed", &failure.message)
                    }
                }
                return CheckoutOutcome::PaymentFailed {
                    order_id: session.order_id,
                    kind,
                    message: failure.message,
                };
            }
            PaymentOutcome::Completed => self.set_state(CheckoutState::PaymentComplete),
        }

        self.set_state(CheckoutState::Verifying);
        let record = match self.verify_payment(&session.order_id).await {
            Some(record) => record,
            None => {
                self.set_state(CheckoutState::Ended);
                self.notify(
                    NoticeKind::Info,
                    "Verifying payment",
                    "We could not confirm your payment yet. Check your orders for the latest status.",
                );
                self.deps.navigator.push(&self.policy.orders_path);
                return CheckoutOutcome::VerificationUnclear {
                    order_id: session.order_id,
                };
            }
        };

        if record.payment_status != PaymentStatus::Success {
            self.set_state(CheckoutState::Ended);
            self.handle_unsuccessful_payment(record.payment_status);
            return CheckoutOutcome::PaymentNotCompleted {
                order_id: session.order_id,
                status: record.payment_status,
            };
        }

        self.set_state(CheckoutState::Persisting);
        let order = PersistedOrder::from_paid_draft(
            session.order_id.clone(),
            customer_id,
            &draft,
            &address,
            PaymentDetails::from_record(session.cf_order_id.clone(), &record),
            &self.policy,
        );
        self.persist(order, draft.items).await
    }

    async fn check_preconditions(&self) -> Result<(Address, OrderDraft), BlockReason> {
        let Some(address) = self.deps.addresses.selected().await else {
            self.notify(
                NoticeKind::Error,
                "Address required",
                "Please add a delivery address before placing your order.",
            );
            return Err(BlockReason::MissingAddress);
        };

        let draft = match self.deps.cart.list().await.and_then(|items| {
            OrderDraft::from_items(items, &self.policy)
        }) {
            Ok(draft) => draft,
            Err(e) => {
                error!("Could not build order from cart: {}", e);
                self.notify(NoticeKind::Error, "Cart unavailable", &e.to_string());
                return Err(BlockReason::InvalidCart(e.to_string()));
            }
        };

        let minimum = self.policy.minimum_order_amount();
        if draft.total().amount < minimum.amount {
            let total = draft.total().display();
            self.notify(
                NoticeKind::Error,
                "Invalid amount",
                &format!("Order total must be at least {}.", minimum.display()),
            );
            return Err(BlockReason::BelowMinimum {
                total,
                minimum: minimum.display(),
            });
        }

        Ok((address, draft))
    }

    async fn create_remote_order(
        &self,
        customer_id: &str,
        address: &Address,
        draft: &OrderDraft,
    ) -> Result<PaymentSession, String> {
        let order_id = local_order_id();
        let request = CreateOrderRequest {
            order_amount: draft.total().as_decimal(),
            order_currency: draft.currency.as_str().to_string(),
            order_id: order_id.clone(),
            customer_details: CustomerDetails {
                customer_id: customer_id.to_string(),
                customer_name: address.name.clone(),
                customer_phone: address.phone.clone(),
                customer_email: address.email.clone(),
            },
            order_meta: OrderMeta {
                return_url: self.policy.return_url_for(&order_id),
            },
        };

        info!(
            order_id = %order_id,
            provider = self.deps.orders.provider_name(),
            "Creating gateway order: {} items, total={}",
            draft.item_count(),
            draft.total().display()
        );

        let created = self
            .deps
            .orders
            .create_order(&request)
            .await
            .and_then(|response| response.into_session(&order_id));

        match created {
            Ok(session) => Ok(session),
            Err(e) => {
                error!(order_id = %order_id, "Failed to create gateway order: {}", e);
                let message = e.to_string();
                self.notify(NoticeKind::Error, "Could not start payment", &message);
                Err(message)
            }
        }
    }

    async fn verify_payment(&self, order_id: &str) -> Option<PaymentRecord> {
        match self.deps.orders.fetch_payments(order_id).await {
            Ok(payments) => {
                let first = payments.into_iter().next();
                if first.is_none() {
                    warn!(%order_id, "Gateway returned no payments for order");
                }
                first
            }
            Err(e) => {
                warn!(%order_id, "Payment verification failed: {}", e);
                None
            }
        }
    }

    fn handle_unsuccessful_payment(&self, status: PaymentStatus) {
        info!(%status, "Payment not successful, order not saved");
        let nav = &self.deps.navigator;
        match status {
            PaymentStatus::Pending => {
                self.notify(
                    NoticeKind::Warning,
                    "Payment pending",
                    "Your payment is still processing. We will update your order once it clears.",
                );
                nav.push(&self.policy.orders_path);
            }
            PaymentStatus::Failed => {
                self.notify(
                    NoticeKind::Error,
                    "Payment failed",
                    "Your payment did not go through. Please try again.",
                );
                nav.push(&self.policy.cart_path);
            }
            PaymentStatus::Cancelled => {
                self.notify(
                    NoticeKind::Warning,
                    "Payment cancelled",
                    "The payment was cancelled. Your cart is unchanged.",
                );
                nav.push(&self.policy.cart_path);
            }
            PaymentStatus::Success | PaymentStatus::Unknown => {
                self.notify(
                    NoticeKind::Info,
                    "Payment status unknown",
                    "Check your orders for the latest payment status.",
                );
                nav.push(&self.policy.orders_path);
            }
        }
    }

    async fn persist(&self, order: PersistedOrder, items: Vec<LineItem>) -> CheckoutOutcome {
        let retry = RetryPolicy::new(self.policy.persist_attempts, self.policy.persist_retry_delay());
        let store = self.deps.store.as_ref();
        let document = &order;

        let saved = retry_with_fixed_delay(
            &retry,
            |attempt, err| {
                self.notify(
                    NoticeKind::Error,
                    "Saving order failed",
                    &format!("Attempt {} of {}: {}", attempt, retry.max_attempts, err),
                );
            },
            || async move {
                match store.create(document).await {
                    // An earlier attempt landed but its response was lost
                    Err(CheckoutError::DuplicateOrder { order_id })
                        if order_id == document.order_id =>
                    {
                        info!(%order_id, "Order already stored by an earlier attempt");
                        Ok(())
                    }
                    other => other,
                }
            },
        )
        .await;

        match saved {
            Ok(()) => {
                self.set_state(CheckoutState::Done);
                info!(order_id = %order.order_id, "Order saved");
                self.notify(
                    NoticeKind::Success,
                    "Order placed",
                    &format!("Order {} is confirmed.", order.order_id),
                );
                self.deps.navigator.replace(&self.policy.orders_path);
                let cleanup = self.spawn_cart_cleanup(items);
                CheckoutOutcome::Placed(PlacedOrder { order, cleanup })
            }
            Err(e) => {
                self.set_state(CheckoutState::Ended);
                error!(
                    order_id = %order.order_id,
                    amount = order.order_summary.final_amount,
                    "Payment captured but order could not be saved: {}",
                    e
                );
                self.notify(
                    NoticeKind::Error,
                    "Order not saved",
                    &format!(
                        "Your payment went through but we could not save order {}. Please contact support with this order id.",
                        order.order_id
                    ),
                );
                CheckoutOutcome::Unsaved {
                    order,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Remove purchased entries from the cart and clear the checkout
    /// selection, concurrently and off the checkout path.
    fn spawn_cart_cleanup(&self, items: Vec<LineItem>) -> JoinHandle<()> {
        let cart = Arc::clone(&self.deps.cart);
        let mut seen = HashSet::new();
        let keys: Vec<CartKey> = items
            .iter()
            .map(LineItem::cart_key)
            .filter(|key| seen.insert(key.clone()))
            .collect();
        let span = info_span!("cart_cleanup", entries = keys.len());

        tokio::spawn(
            async move {
                let remove_entries = async {
                    for key in &keys {
                        if let Err(e) = cart.remove_matching(&key.product_id, &key.variants).await {
                            warn!(product_id = %key.product_id, "Failed to remove cart entry: {}", e);
                        }
                    }
                };
                let (_, cleared) = tokio::join!(remove_entries, cart.clear_selection());
                if let Err(e) = cleared {
                    warn!("Failed to clear checkout selection: {}", e);
                }
                debug!("Cart cleanup finished");
            }
            .instrument(span),
        )
    }
}

/// Timestamp-based local order id
fn local_order_id() -> String {
    format!("order_{}", Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::AddressBook;
    use crate::cart::Variants;
    use crate::gateway::{CreateOrderResponse, GatewayFailure, OrderService, PaymentCollector};
    use crate::memory::{InMemoryCart, InMemoryOrderStore};
    use crate::money::{Currency, Price};
    use crate::order::OrderStatus;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    // ---------------------------------------------------------------------
    // Fakes
    // ---------------------------------------------------------------------

    struct FakeOrderService {
        create_response: CheckoutResult<CreateOrderResponse>,
        payments: CheckoutResult<Vec<PaymentRecord>>,
        created: Mutex<Vec<CreateOrderRequest>>,
        verified: AtomicU32,
    }

    impl FakeOrderService {
        fn paying(status: PaymentStatus) -> Self {
            Self {
                create_response: Ok(CreateOrderResponse::created("cf_9001", "session_abc", "ignored")),
                payments: Ok(vec![PaymentRecord {
                    cf_payment_id: Some("pay_1".into()),
                    payment_amount: Some(600.0),
                    ..PaymentRecord::with_status(status)
                }]),
                created: Mutex::new(Vec::new()),
                verified: AtomicU32::new(0),
            }
        }

        fn with_create_response(mut self, response: CheckoutResult<CreateOrderResponse>) -> Self {
            self.create_response = response;
            self
        }

        fn with_payments(mut self, payments: CheckoutResult<Vec<PaymentRecord>>) -> Self {
            self.payments = payments;
            self
        }

        fn create_calls(&self) -> usize {
            self.created.lock().unwrap().len()
        }

        fn verify_calls(&self) -> u32 {
            self.verified.load(Ordering::SeqCst)
        }
    }

    fn clone_result<T: Clone>(r: &CheckoutResult<T>) -> CheckoutResult<T> {
        match r {
            Ok(v) => Ok(v.clone()),
            Err(e) => Err(CheckoutError::ProviderError {
                provider: "fake".into(),
                message: e.to_string(),
            }),
        }
    }

    #[async_trait]
    impl OrderService for FakeOrderService {
        async fn create_order(&self, request: &CreateOrderRequest) -> CheckoutResult<CreateOrderResponse> {
            self.created.lock().unwrap().push(request.clone());
            clone_result(&self.create_response).map(|mut r| {
                if r.order_id.is_some() {
                    r.order_id = Some(request.order_id.clone());
                }
                r
            })
        }

        async fn fetch_payments(&self, _order_id: &str) -> CheckoutResult<Vec<PaymentRecord>> {
            self.verified.fetch_add(1, Ordering::SeqCst);
            clone_result(&self.payments)
        }

        fn provider_name(&self) -> &'static str {
            "fake"
        }
    }

    struct FakeCollector {
        outcome: PaymentOutcome,
        gate: Option<Arc<Notify>>,
    }

    impl FakeCollector {
        fn resolving(outcome: PaymentOutcome) -> Self {
            Self { outcome, gate: None }
        }
    }

    #[async_trait]
    impl PaymentCollector for FakeCollector {
        async fn collect(&self, _session: &PaymentSession) -> PaymentOutcome {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.outcome.clone()
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notices: Mutex<Vec<(NoticeKind, String, String)>>,
    }

    impl RecordingNotifier {
        fn titles(&self) -> Vec<String> {
            self.notices.lock().unwrap().iter().map(|n| n.1.clone()).collect()
        }

        fn count(&self, title: &str) -> usize {
            self.titles().iter().filter(|t| *t == title).count()
        }

        fn kind_of(&self, title: &str) -> Option<NoticeKind> {
            self.notices
                .lock()
                .unwrap()
                .iter()
                .find(|n| n.1 == title)
                .map(|n| n.0)
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, kind: NoticeKind, title: &str, message: &str) {
            self.notices
                .lock()
                .unwrap()
                .push((kind, title.to_string(), message.to_string()));
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Nav {
        Push(String),
        Replace(String),
    }

    #[derive(Default)]
    struct RecordingNavigator {
        history: Mutex<Vec<Nav>>,
    }

    impl RecordingNavigator {
        fn history(&self) -> Vec<Nav> {
            self.history.lock().unwrap().clone()
        }
    }

    impl Navigator for RecordingNavigator {
        fn push(&self, path: &str) {
            self.history.lock().unwrap().push(Nav::Push(path.to_string()));
        }

        fn replace(&self, path: &str) {
            self.history.lock().unwrap().push(Nav::Replace(path.to_string()));
        }
    }

    /// Order store that fails its first `failures` writes. The first
    /// `lost_acks` writes are stored but still reported as failed.
    struct FlakyStore {
        inner: InMemoryOrderStore,
        failures: u32,
        lost_acks: u32,
        attempts: Mutex<Vec<Instant>>,
    }

    impl FlakyStore {
        fn failing(failures: u32) -> Self {
            Self {
                inner: InMemoryOrderStore::new(),
                failures,
                lost_acks: 0,
                attempts: Mutex::new(Vec::new()),
            }
        }

        fn losing_acks(mut self, lost_acks: u32) -> Self {
            self.lost_acks = lost_acks;
            self
        }

        fn attempts(&self) -> Vec<Instant> {
            self.attempts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl OrderStore for FlakyStore {
        async fn create(&self, order: &PersistedOrder) -> CheckoutResult<()> {
            let attempt = {
                let mut attempts = self.attempts.lock().unwrap();
                attempts.push(Instant::now());
                attempts.len() as u32
            };
            if attempt <= self.failures {
                return Err(CheckoutError::Store("document store unavailable".into()));
            }
            if attempt <= self.lost_acks {
                self.inner.create(order).await?;
                return Err(CheckoutError::Store("timeout".into()));
            }
            self.inner.create(order).await
        }

        async fn get(&self, order_id: &str) -> CheckoutResult<Option<PersistedOrder>> {
            self.inner.get(order_id).await
        }

        async fn list_for_user(&self, user_id: &str) -> CheckoutResult<Vec<PersistedOrder>> {
            self.inner.list_for_user(user_id).await
        }

        async fn update_status(
            &self,
            order_id: &str,
            status: OrderStatus,
        ) -> CheckoutResult<PersistedOrder> {
            self.inner.update_status(order_id, status).await
        }
    }

    /// Cart that counts removals per entry
    #[derive(Default)]
    struct CountingCart {
        inner: InMemoryCart,
        removals: Mutex<HashMap<String, u32>>,
        selection_clears: AtomicU32,
    }

    impl CountingCart {
        fn with_items(items: Vec<LineItem>) -> Self {
            let cart = Self::default();
            for item in items {
                cart.inner.add(item);
            }
            cart
        }

        fn removals_of(&self, item: &LineItem) -> u32 {
            let key = format!("{}|{}", item.product_id, item.variant_signature());
            self.removals.lock().unwrap().get(&key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl CartProvider for CountingCart {
        async fn list(&self) -> CheckoutResult<Vec<LineItem>> {
            self.inner.list().await
        }

        async fn remove_matching(&self, product_id: &str, variants: &Variants) -> CheckoutResult<()> {
            let key = format!("{}|{}", product_id, crate::cart::variant_signature(variants));
            *self.removals.lock().unwrap().entry(key).or_insert(0) += 1;
            self.inner.remove_matching(product_id, variants).await
        }

        async fn clear_selection(&self) -> CheckoutResult<()> {
            self.selection_clears.fetch_add(1, Ordering::SeqCst);
            self.inner.clear_selection().await
        }
    }

    // ---------------------------------------------------------------------
    // Harness
    // ---------------------------------------------------------------------

    struct Harness {
        orchestrator: Arc<CheckoutOrchestrator>,
        orders: Arc<FakeOrderService>,
        store: Arc<FlakyStore>,
        cart: Arc<CountingCart>,
        notifier: Arc<RecordingNotifier>,
        navigator: Arc<RecordingNavigator>,
    }

    struct HarnessBuilder {
        address: Option<Address>,
        items: Vec<LineItem>,
        orders: FakeOrderService,
        collector: FakeCollector,
        store_failures: u32,
        lost_acks: u32,
    }

    fn inr(amount: f64) -> Price {
        Price::new(amount, Currency::INR)
    }

    fn address() -> Address {
        Address::new("addr_1", "Meera Iyer", "9123456780", "meera@example.com")
            .with_lines("221 Residency Road", None)
            .with_locality("Chennai", "Tamil Nadu", "600001")
            .as_default()
    }

    fn standard_items() -> Vec<LineItem> {
        vec![
            LineItem::new("saree", "Handloom Saree", inr(450.0), 1).with_variant("color", "indigo"),
            LineItem::new("bangle", "Glass Bangles", inr(150.0), 1).with_free_delivery(),
        ]
    }

    fn harness() -> HarnessBuilder {
        HarnessBuilder {
            address: Some(address()),
            items: standard_items(),
            orders: FakeOrderService::paying(PaymentStatus::Success),
            collector: FakeCollector::resolving(PaymentOutcome::Completed),
            store_failures: 0,
            lost_acks: 0,
        }
    }

    impl HarnessBuilder {
        fn without_address(mut self) -> Self {
            self.address = None;
            self
        }

        fn items(mut self, items: Vec<LineItem>) -> Self {
            self.items = items;
            self
        }

        fn orders(mut self, orders: FakeOrderService) -> Self {
            self.orders = orders;
            self
        }

        fn collector(mut self, collector: FakeCollector) -> Self {
            self.collector = collector;
            self
        }

        fn store_failures(mut self, failures: u32) -> Self {
            self.store_failures = failures;
            self
        }

        fn lost_acks(mut self, lost_acks: u32) -> Self {
            self.lost_acks = lost_acks;
            self
        }

        fn build(self) -> Harness {
            let book = AddressBook::new();
            if let Some(address) = self.address {
                book.add(address);
            }
            let orders = Arc::new(self.orders);
            let store = Arc::new(FlakyStore::failing(self.store_failures).losing_acks(self.lost_acks));
            let cart = Arc::new(CountingCart::with_items(self.items));
            let notifier = Arc::new(RecordingNotifier::default());
            let navigator = Arc::new(RecordingNavigator::default());

            let deps = CheckoutCollaborators {
                addresses: Arc::new(book),
                cart: cart.clone(),
                orders: orders.clone(),
                collector: Arc::new(self.collector),
                store: store.clone(),
                notifier: notifier.clone(),
                navigator: navigator.clone(),
            };

            Harness {
                orchestrator: Arc::new(CheckoutOrchestrator::new(CheckoutPolicy::default(), deps)),
                orders,
                store,
                cart,
                notifier,
                navigator,
            }
        }
    }

    // ---------------------------------------------------------------------
    // Preconditions
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_missing_address_blocks_before_network() {
        let h = harness().without_address().build();

        let outcome = h.orchestrator.place_order("user_1").await;

        assert!(matches!(outcome, CheckoutOutcome::Blocked(BlockReason::MissingAddress)));
        assert_eq!(h.orders.create_calls(), 0);
        assert_eq!(h.notifier.titles(), vec!["Address required"]);
        assert!(!h.orchestrator.is_processing());
    }

    #[tokio::test]
    async fn test_total_below_minimum_makes_no_order_call() {
        let h = harness()
            .items(vec![LineItem::new("sticker", "Sticker", inr(0.5), 1).with_free_delivery()])
            .build();

        let outcome = h.orchestrator.place_order("user_1").await;

        match outcome {
            CheckoutOutcome::Blocked(BlockReason::BelowMinimum { total, minimum }) => {
                assert_eq!(total, "₹0.50");
                assert_eq!(minimum, "₹1.00");
            }
            other => panic!("expected BelowMinimum, got {:?}", other),
        }
        assert_eq!(h.orders.create_calls(), 0);
        assert_eq!(h.notifier.kind_of("Invalid amount"), Some(NoticeKind::Error));
    }

    #[tokio::test]
    async fn test_mixed_currency_cart_is_blocked() {
        let h = harness()
            .items(vec![
                LineItem::new("mug", "Mug", inr(300.0), 1),
                LineItem::new("print", "Print", Price::new(20.0, Currency::USD), 1),
            ])
            .build();

        let outcome = h.orchestrator.place_order("user_1").await;

        assert!(matches!(outcome, CheckoutOutcome::Blocked(BlockReason::InvalidCart(_))));
        assert_eq!(h.orders.create_calls(), 0);
    }

    // ---------------------------------------------------------------------
    // Order creation and collection
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_order_request_shape() {
        let h = harness()
            .collector(FakeCollector::resolving(PaymentOutcome::Redirect { url: None }))
            .build();

        h.orchestrator.place_order("user_42").await;

        let request = h.orders.created.lock().unwrap()[0].clone();
        assert_eq!(request.order_amount, 600.0);
        assert_eq!(request.order_currency, "INR");
        assert!(request.order_id.starts_with("order_"));
        assert_eq!(request.customer_details.customer_id, "user_42");
        assert_eq!(request.customer_details.customer_name, "Meera Iyer");
        assert_eq!(request.customer_details.customer_phone, "9123456780");
        assert_eq!(
            request.order_meta.return_url,
            format!("http://localhost:3000/orders?order_id={}", request.order_id)
        );
    }

    #[tokio::test]
    async fn test_missing_session_id_aborts_without_retry() {
        let h = harness()
            .orders(
                FakeOrderService::paying(PaymentStatus::Success).with_create_response(Ok(
                    CreateOrderResponse {
                        cf_order_id: Some("cf_1".into()),
                        ..CreateOrderResponse::default()
                    },
                )),
            )
            .build();

        let outcome = h.orchestrator.place_order("user_1").await;

        assert!(matches!(outcome, CheckoutOutcome::OrderCreationFailed { .. }));
        assert_eq!(h.orders.create_calls(), 1);
        assert_eq!(h.orders.verify_calls(), 0);
        assert_eq!(h.notifier.kind_of("Could not start payment"), Some(NoticeKind::Error));
        assert_eq!(h.orchestrator.state(), CheckoutState::Ended);
    }

    #[tokio::test]
    async fn test_redirect_returns_early() {
        let h = harness()
            .collector(FakeCollector::resolving(PaymentOutcome::Redirect {
                url: Some("https://pay.example.com/s/abc".into()),
            }))
            .build();

        let outcome = h.orchestrator.place_order("user_1").await;

        match outcome {
            CheckoutOutcome::AwaitingRedirect { url, .. } => {
                assert_eq!(url.as_deref(), Some("https://pay.example.com/s/abc"))
            }
            other => panic!("expected AwaitingRedirect, got {:?}", other),
        }
        assert_eq!(h.orders.verify_calls(), 0);
        assert_eq!(h.orchestrator.state(), CheckoutState::RedirectWait);
        assert!(h.store.inner.is_empty());
    }

    #[tokio::test]
    async fn test_aborted_payment_warns_and_skips_verification() {
        let h = harness()
            .collector(FakeCollector::resolving(PaymentOutcome::Error(GatewayFailure::new(
                Some("payment_aborted"),
                "Payment window closed",
            ))))
            .build();

        let outcome = h.orchestrator.place_order("user_1").await;

        assert!(matches!(
            outcome,
            CheckoutOutcome::PaymentFailed {
                kind: FailureKind::UserAborted,
                ..
            }
        ));
        assert_eq!(h.notifier.kind_of("Payment cancelled"), Some(NoticeKind::Warning));
        assert_eq!(h.orders.verify_calls(), 0);
        assert_eq!(h.orchestrator.state(), CheckoutState::PaymentError);
    }

    #[tokio::test]
    async fn test_network_and_other_failures_use_error_notices() {
        let network = harness()
            .collector(FakeCollector::resolving(PaymentOutcome::Error(GatewayFailure::new(
                Some("network_error"),
                "offline",
            ))))
            .build();
        network.orchestrator.place_order("user_1").await;
        assert_eq!(network.notifier.kind_of("Network error"), Some(NoticeKind::Error));

        let other = harness()
            .collector(FakeCollector::resolving(PaymentOutcome::Error(GatewayFailure::new(
                Some("card_declined"),
                "Card declined by issuer",
            ))))
            .build();
        other.orchestrator.place_order("user_1").await;
        let notices = other.notifier.notices.lock().unwrap().clone();
        assert_eq!(notices[0].1, "Payment failed");
        assert_eq!(notices[0].2, "Card declined by issuer");
    }

    // ---------------------------------------------------------------------
    // Verification
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_unclear_verification_sends_customer_to_orders() {
        let h = harness()
            .orders(
                FakeOrderService::paying(PaymentStatus::Success)
                    .with_payments(Err(CheckoutError::NetworkError("timeout".into()))),
            )
            .build();

        let outcome = h.orchestrator.place_order("user_1").await;

        assert!(matches!(outcome, CheckoutOutcome::VerificationUnclear { .. }));
        assert_eq!(h.navigator.history(), vec![Nav::Push("/orders".into())]);
        assert_eq!(h.notifier.kind_of("Verifying payment"), Some(NoticeKind::Info));
        assert!(h.store.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_empty_payment_list_is_unclear() {
        let h = harness()
            .orders(FakeOrderService::paying(PaymentStatus::Success).with_payments(Ok(vec![])))
            .build();

        let outcome = h.orchestrator.place_order("user_1").await;
        assert!(matches!(outcome, CheckoutOutcome::VerificationUnclear { .. }));
    }

    #[tokio::test]
    async fn test_non_success_statuses_never_persist() {
        let cases = [
            (PaymentStatus::Pending, "Payment pending", Nav::Push("/orders".into())),
            (PaymentStatus::Failed, "Payment failed", Nav::Push("/cart".into())),
            (PaymentStatus::Cancelled, "Payment cancelled", Nav::Push("/cart".into())),
            (PaymentStatus::Unknown, "Payment status unknown", Nav::Push("/orders".into())),
        ];

        for (status, title, nav) in cases {
            let h = harness().orders(FakeOrderService::paying(status)).build();

            let outcome = h.orchestrator.place_order("user_1").await;

            match outcome {
                CheckoutOutcome::PaymentNotCompleted { status: s, .. } => assert_eq!(s, status),
                other => panic!("expected PaymentNotCompleted, got {:?}", other),
            }
            assert_eq!(h.notifier.count(title), 1, "{}", status);
            assert_eq!(h.navigator.history(), vec![nav]);
            assert!(h.store.attempts().is_empty());
            assert_eq!(h.cart.inner.entries().len(), 2);
        }
    }

    // ---------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn test_persist_retries_after_one_second() {
        let h = harness().store_failures(1).build();

        let outcome = h.orchestrator.place_order("user_1").await;

        assert!(outcome.is_placed());
        let attempts = h.store.attempts();
        assert_eq!(attempts.len(), 2);
        let gap = attempts[1] - attempts[0];
        assert!(gap >= Duration::from_secs(1) && gap < Duration::from_secs(2));
        assert_eq!(h.notifier.count("Saving order failed"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_gives_up_after_three_attempts() {
        let h = harness().store_failures(10).build();

        let outcome = h.orchestrator.place_order("user_1").await;

        match outcome {
            CheckoutOutcome::Unsaved { order, error } => {
                assert_eq!(order.payment_status, PaymentStatus::Success);
                assert!(error.contains("document store unavailable"));
            }
            other => panic!("expected Unsaved, got {:?}", other),
        }
        assert_eq!(h.store.attempts().len(), 3);
        assert_eq!(h.notifier.count("Saving order failed"), 3);
        assert_eq!(h.notifier.titles().last().map(String::as_str), Some("Order not saved"));
        assert_eq!(h.cart.inner.entries().len(), 2);
        assert!(h.navigator.history().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_persist_treats_lost_ack_as_saved() {
        let h = harness().lost_acks(1).build();

        let outcome = h.orchestrator.place_order("user_1").await;

        let placed = match outcome {
            CheckoutOutcome::Placed(placed) => placed,
            other => panic!("expected Placed, got {:?}", other),
        };
        placed.cleanup.await.unwrap();
        assert_eq!(h.store.attempts().len(), 2);
        assert_eq!(h.store.inner.len(), 1);
        assert_eq!(h.notifier.count("Saving order failed"), 1);
        assert_eq!(h.notifier.count("Order not saved"), 0);
        assert_eq!(h.notifier.count("Order placed"), 1);
        assert!(h.cart.inner.entries().is_empty());
    }

    #[tokio::test]
    async fn test_end_to_end_order_placement() {
        let h = harness().build();

        let summary = h.orchestrator.refresh_summary().await.unwrap();
        assert_eq!(summary.delivery_fee.amount, 0);
        assert_eq!(h.notifier.count("Free delivery unlocked"), 1);

        let outcome = h.orchestrator.place_order("user_7").await;

        let placed = match outcome {
            CheckoutOutcome::Placed(placed) => placed,
            other => panic!("expected Placed, got {:?}", other),
        };
        placed.cleanup.await.unwrap();

        let order = placed.order;
        assert_eq!(order.order_summary.final_amount, 600.0);
        assert_eq!(order.order_summary.delivery_fee, 0.0);
        assert_eq!(order.user_id, "user_7");
        assert_eq!(order.payment_details.cf_order_id.as_deref(), Some("cf_9001"));
        assert_eq!(order.payment_details.cf_payment_id.as_deref(), Some("pay_1"));
        assert_eq!(order.order_status, OrderStatus::Pending);

        let stored = h.store.get(&order.order_id).await.unwrap().unwrap();
        assert_eq!(stored, order);

        for item in standard_items() {
            assert_eq!(h.cart.removals_of(&item), 1, "{}", item.product_id);
        }
        assert!(h.cart.inner.entries().is_empty());
        assert_eq!(h.cart.selection_clears.load(Ordering::SeqCst), 1);

        assert_eq!(h.navigator.history(), vec![Nav::Replace("/orders".into())]);
        assert_eq!(h.notifier.kind_of("Order placed"), Some(NoticeKind::Success));
        assert_eq!(h.orchestrator.state(), CheckoutState::Done);
        assert!(!h.orchestrator.is_processing());
    }

    #[tokio::test]
    async fn test_cleanup_only_touches_purchased_entries() {
        let h = harness().build();
        h.cart.inner.add(LineItem::new("saree", "Handloom Saree", inr(450.0), 1).with_variant("color", "red"));
        h.cart.inner.select(standard_items().iter().map(LineItem::cart_key).collect());

        let outcome = h.orchestrator.place_order("user_1").await;
        let CheckoutOutcome::Placed(placed) = outcome else {
            panic!("expected Placed");
        };
        placed.cleanup.await.unwrap();

        let remaining = h.cart.inner.entries();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].variants["color"], "red");
        assert!(!h.cart.inner.has_selection());
    }

    // ---------------------------------------------------------------------
    // Session behaviour
    // ---------------------------------------------------------------------

    #[tokio::test]
    async fn test_second_submit_while_processing_is_rejected() {
        let gate = Arc::new(Notify::new());
        let h = harness()
            .collector(FakeCollector {
                outcome: PaymentOutcome::Redirect { url: None },
                gate: Some(gate.clone()),
            })
            .build();

        let first = {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move { orchestrator.place_order("user_1").await })
        };

        while h.orchestrator.state() != CheckoutState::OrderCreated {
            tokio::task::yield_now().await;
        }
        assert!(h.orchestrator.is_processing());

        let second = h.orchestrator.place_order("user_1").await;
        assert!(matches!(second, CheckoutOutcome::Blocked(BlockReason::InProgress)));

        gate.notify_one();
        let first = first.await.unwrap();
        assert!(matches!(first, CheckoutOutcome::AwaitingRedirect { .. }));
        assert_eq!(h.orders.create_calls(), 1);
        assert!(!h.orchestrator.is_processing());
    }

    #[tokio::test]
    async fn test_free_delivery_notice_fires_once_per_session() {
        let h = harness()
            .items(vec![LineItem::new("mug", "Mug", inr(200.0), 1)])
            .build();

        let summary = h.orchestrator.refresh_summary().await.unwrap();
        assert_eq!(summary.delivery_fee.amount, 5000);
        assert_eq!(h.notifier.count("Free delivery unlocked"), 0);

        h.cart.inner.add(LineItem::new("mug", "Mug", inr(200.0), 2));
        let summary = h.orchestrator.refresh_summary().await.unwrap();
        assert_eq!(summary.subtotal.amount, 60000);
        assert_eq!(summary.delivery_fee.amount, 0);

        h.orchestrator.refresh_summary().await.unwrap();
        assert_eq!(h.notifier.count("Free delivery unlocked"), 1);
    }

    #[tokio::test]
    async fn test_state_changes_are_observable() {
        let h = harness()
            .collector(FakeCollector::resolving(PaymentOutcome::Redirect { url: None }))
            .build();
        let mut rx = h.orchestrator.subscribe();

        h.orchestrator.place_order("user_1").await;

        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), CheckoutState::RedirectWait);
    }
}

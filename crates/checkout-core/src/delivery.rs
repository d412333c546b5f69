//! # Delivery Fee Policy
//!
//! Delivery is free when any item ships free (flagged, or with a zero fee)
//! or when the subtotal reaches the free-delivery threshold. Otherwise the
//! order pays the largest per-item fee, with unset fees counting as the
//! policy default.

use crate::cart::LineItem;
use crate::money::Price;
use crate::policy::CheckoutPolicy;
use std::sync::atomic::{AtomicBool, Ordering};

/// Delivery fee for a set of line items with a precomputed subtotal.
pub fn delivery_fee(items: &[LineItem], subtotal: Price, policy: &CheckoutPolicy) -> Price {
    let currency = policy.currency;
    if items.is_empty() {
        return Price::zero(currency);
    }

    let default_fee = policy.default_delivery_fee();
    let fee_of = |item: &LineItem| item.delivery_fee.unwrap_or(default_fee);

    let any_free = items
        .iter()
        .any(|item| item.free_delivery || fee_of(item).is_zero());

    if any_free || subtotal.amount >= policy.free_delivery_threshold().amount {
        return Price::zero(currency);
    }

    let max_fee = items.iter().map(|item| fee_of(item).amount).max().unwrap_or(0);
    Price::from_minor(max_fee, currency)
}

/// Remembers whether free delivery has been celebrated this session.
#[derive(Debug, Default)]
pub struct FreeDeliveryTracker {
    celebrated: AtomicBool,
}

impl FreeDeliveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true exactly once: the first time a non-empty item set
    /// reaches free delivery.
    pub fn observe(&self, items: &[LineItem], fee: Price) -> bool {
        if items.is_empty() || !fee.is_zero() {
            return false;
        }
        !self.celebrated.swap(true, Ordering::SeqCst)
    }
}

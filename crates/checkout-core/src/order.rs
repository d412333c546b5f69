//! # Order Types
//!
//! In-memory order drafts and the persisted order document.
//!
//! A draft exists only while the customer is paying. The persisted order is
//! written once, after the gateway reports a successful payment, and is
//! afterwards only changed through fulfillment status transitions.

use crate::address::Address;
use crate::cart::{LineItem, Variants};
use crate::delivery::delivery_fee;
use crate::error::{CheckoutError, CheckoutResult};
use crate::gateway::{PaymentRecord, PaymentStatus};
use crate::money::{Currency, Price};
use crate::policy::CheckoutPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Price breakdown of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderSummary {
    pub subtotal: Price,
    pub discount: Price,
    pub delivery_fee: Price,
    pub final_amount: Price,
}

impl OrderSummary {
    /// Compute the summary for a set of line items. All items must be
    /// priced in the policy currency.
    pub fn compute(items: &[LineItem], policy: &CheckoutPolicy) -> CheckoutResult<Self> {
        let currency = policy.currency;
        if let Some(item) = items.iter().find(|i| i.unit_price.currency != currency) {
            return Err(CheckoutError::CurrencyMismatch {
                expected: currency.to_string(),
                found: item.unit_price.currency.to_string(),
            });
        }

        let overflow = || CheckoutError::InvalidRequest("Order total is out of range".to_string());
        let subtotal = items.iter().try_fold(Price::zero(currency), |acc, item| {
            item.unit_price
                .checked_times(item.quantity)
                .and_then(|line| acc.checked_plus(line))
                .ok_or_else(overflow)
        })?;
        let delivery_fee = delivery_fee(items, subtotal, policy);
        // No discounts are offered yet.
        let discount = Price::zero(currency);
        let final_amount = subtotal
            .checked_plus(delivery_fee)
            .ok_or_else(overflow)?
            .saturating_minus(discount);

        Ok(Self {
            subtotal,
            discount,
            delivery_fee,
            final_amount,
        })
    }

    pub fn has_free_delivery(&self) -> bool {
        self.delivery_fee.is_zero()
    }
}

/// An order being paid for
#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub items: Vec<LineItem>,
    pub summary: OrderSummary,
    pub currency: Currency,
}

impl OrderDraft {
    pub fn from_items(items: Vec<LineItem>, policy: &CheckoutPolicy) -> CheckoutResult<Self> {
        let summary = OrderSummary::compute(&items, policy)?;
        Ok(Self {
            items,
            summary,
            currency: policy.currency,
        })
    }

    /// Amount to charge
    pub fn total(&self) -> Price {
        self.summary.final_amount
    }

    /// Get item count
    pub fn item_count(&self) -> u32 {
        self.items.iter().fold(0u32, |n, i| n.saturating_add(i.quantity))
    }
}

/// Fulfillment status of a persisted order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether fulfillment may move from `self` to `next`
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchased product as written in the order document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderedProduct {
    pub id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
    pub delivery_fee: f64,
    #[serde(default)]
    pub variants: Variants,
    pub subtotal: f64,
}

impl OrderedProduct {
    fn from_item(item: &LineItem, policy: &CheckoutPolicy) -> Self {
        let fee = if item.free_delivery {
            Price::zero(item.unit_price.currency)
        } else {
            item.delivery_fee.unwrap_or_else(|| policy.default_delivery_fee())
        };
        Self {
            id: item.product_id.clone(),
            name: item.name.clone(),
            price: item.unit_price.as_decimal(),
            quantity: item.quantity,
            delivery_fee: fee.as_decimal(),
            variants: item.variants.clone(),
            subtotal: item.subtotal().as_decimal(),
        }
    }
}

/// Order summary as written in the order document (currency units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
    pub subtotal: f64,
    pub discount: f64,
    pub delivery_fee: f64,
    pub final_amount: f64,
}

impl From<&OrderSummary> for SummaryDocument {
    fn from(summary: &OrderSummary) -> Self {
        Self {
            subtotal: summary.subtotal.as_decimal(),
            discount: summary.discount.as_decimal(),
            delivery_fee: summary.delivery_fee.as_decimal(),
            final_amount: summary.final_amount.as_decimal(),
        }
    }
}

/// Gateway payment details recorded with the order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    /// Gateway's own order id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_order_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_payment_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_amount: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_reference: Option<String>,
}

impl PaymentDetails {
    pub fn from_record(cf_order_id: Option<String>, record: &PaymentRecord) -> Self {
        Self {
            cf_order_id,
            cf_payment_id: record.cf_payment_id.clone(),
            payment_method: record.payment_method.clone(),
            payment_amount: record.payment_amount,
            payment_time: record.payment_time.clone(),
            bank_reference: record.bank_reference.clone(),
        }
    }
}

/// The durable order document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedOrder {
    pub order_id: String,
    pub user_id: String,
    pub selected_products: Vec<OrderedProduct>,
    pub order_summary: SummaryDocument,
    pub delivery_address: Address,
    pub order_status: OrderStatus,
    #[serde(default)]
    pub tracking_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub payment_details: PaymentDetails,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub platform: String,
    pub currency: Currency,
}

impl PersistedOrder {
    /// Build the document for a paid draft
    pub fn from_paid_draft(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        draft: &OrderDraft,
        address: &Address,
        payment: PaymentDetails,
        policy: &CheckoutPolicy,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            user_id: user_id.into(),
            selected_products: draft
                .items
                .iter()
                .map(|item| OrderedProduct::from_item(item, policy))
                .collect(),
            order_summary: SummaryDocument::from(&draft.summary),
            delivery_address: address.clone(),
            order_status: OrderStatus::Pending,
            tracking_id: None,
            payment_status: PaymentStatus::Success,
            payment_details: payment,
            created_at: now,
            last_updated: now,
            platform: policy.platform.clone(),
            currency: draft.currency,
        }
    }

    /// Apply a fulfillment status change
    pub fn transition(&mut self, next: OrderStatus) -> CheckoutResult<()> {
        if !self.order_status.can_transition_to(next) {
            return Err(CheckoutError::InvalidStatusTransition {
                from: self.order_status.to_string(),
                to: next.to_string(),
            });
        }
        self.order_status = next;
        self.last_updated = Utc::now();
        Ok(())
    }
}

//! # Cart Line Items
//!
//! Line items selected for checkout. A line item is immutable once it is in
//! checkout; the cart provider owns the mutable cart.

use crate::money::Price;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Variant selections (e.g. size, colour), ordered by key
pub type Variants = BTreeMap<String, String>;

/// A line item selected for checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Product ID
    pub product_id: String,

    /// Product name (denormalized for display)
    pub name: String,

    /// Unit price
    pub unit_price: Price,

    /// Quantity
    pub quantity: u32,

    /// Selected variants
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variants: Variants,

    /// Per-item delivery fee; the policy default applies when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_fee: Option<Price>,

    /// Item ships free regardless of the order subtotal
    #[serde(default)]
    pub free_delivery: bool,

    /// Optional image URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl LineItem {
    /// Create a line item with no variants and the default delivery fee
    pub fn new(
        product_id: impl Into<String>,
        name: impl Into<String>,
        unit_price: Price,
        quantity: u32,
    ) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            quantity,
            variants: Variants::new(),
            delivery_fee: None,
            free_delivery: false,
            image_url: None,
        }
    }

    /// Builder: add a variant selection
    pub fn with_variant(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variants.insert(key.into(), value.into());
        self
    }

    /// Builder: set the per-item delivery fee
    pub fn with_delivery_fee(mut self, fee: Price) -> Self {
        self.delivery_fee = Some(fee);
        self
    }

    /// Builder: mark as free delivery
    pub fn with_free_delivery(mut self) -> Self {
        self.free_delivery = true;
        self
    }

    /// Price × quantity
    pub fn subtotal(&self) -> Price {
        self.unit_price.times(self.quantity)
    }

    /// Deterministic signature of the variant selections, used to match
    /// cart entries of the same product with the same options.
    pub fn variant_signature(&self) -> String {
        variant_signature(&self.variants)
    }

    /// Key identifying the cart entry this item came from
    pub fn cart_key(&self) -> CartKey {
        CartKey {
            product_id: self.product_id.clone(),
            variants: self.variants.clone(),
        }
    }
}

/// `key=value` pairs sorted by key, joined with `;`
pub fn variant_signature(variants: &Variants) -> String {
    variants
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(";")
}

/// Identity of a cart entry: product id plus variant selections
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CartKey {
    pub product_id: String,
    #[serde(default)]
    pub variants: Variants,
}

impl CartKey {
    pub fn matches(&self, item: &LineItem) -> bool {
        self.product_id == item.product_id && self.variants == item.variants
    }
}

//! # Delivery Addresses
//!
//! Shipping addresses and an in-memory address book. The address book
//! resolves the selected address the same way the storefront does: an
//! explicit selection first, then the address flagged default, then the
//! first saved one.

use crate::ports::AddressProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// A saved delivery address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    /// Address identifier
    pub id: String,

    /// Recipient name
    pub name: String,

    /// Contact phone
    pub phone: String,

    /// Contact email
    pub email: String,

    /// First address line
    pub address_line1: String,

    /// Second address line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_line2: Option<String>,

    /// Pin / postal code
    pub pincode: String,

    pub city: String,

    pub state: String,

    #[serde(default = "default_country")]
    pub country: String,

    /// Whether this is the user's default address
    #[serde(default)]
    pub is_default: bool,
}

fn default_country() -> String {
    "India".to_string()
}

impl Address {
    /// Create a new address with required fields
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        phone: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            email: email.into(),
            address_line1: String::new(),
            address_line2: None,
            pincode: String::new(),
            city: String::new(),
            state: String::new(),
            country: default_country(),
            is_default: false,
        }
    }

    /// Builder: set street lines
    pub fn with_lines(mut self, line1: impl Into<String>, line2: Option<String>) -> Self {
        self.address_line1 = line1.into();
        self.address_line2 = line2;
        self
    }

    /// Builder: set locality
    pub fn with_locality(
        mut self,
        city: impl Into<String>,
        state: impl Into<String>,
        pincode: impl Into<String>,
    ) -> Self {
        self.city = city.into();
        self.state = state.into();
        self.pincode = pincode.into();
        self
    }

    /// Builder: mark as default
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }
}

/// In-memory address book implementing [`AddressProvider`]
#[derive(Debug, Default)]
pub struct AddressBook {
    inner: RwLock<AddressBookInner>,
}

#[derive(Debug, Default)]
struct AddressBookInner {
    addresses: Vec<Address>,
    selected_id: Option<String>,
}

impl AddressBook {
    /// Create an empty book
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an address
    pub fn with_address(self, address: Address) -> Self {
        self.add(address);
        self
    }

    /// Save an address. A new default address clears the flag on the others.
    pub fn add(&self, address: Address) {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if address.is_default {
            for a in inner.addresses.iter_mut() {
                a.is_default = false;
            }
        }
        inner.addresses.retain(|a| a.id != address.id);
        inner.addresses.push(address);
    }

    /// Select an address for the current checkout. Returns false for unknown ids.
    pub fn select(&self, address_id: &str) -> bool {
        let mut inner = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if inner.addresses.iter().any(|a| a.id == address_id) {
            inner.selected_id = Some(address_id.to_string());
            true
        } else {
            false
        }
    }

    /// Resolve the address used for delivery
    pub fn resolve(&self) -> Option<Address> {
        let inner = self.inner.read().unwrap_or_else(|e| e.into_inner());
        inner
            .selected_id
            .as_ref()
            .and_then(|id| inner.addresses.iter().find(|a| &a.id == id))
            .or_else(|| inner.addresses.iter().find(|a| a.is_default))
            .or_else(|| inner.addresses.first())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AddressProvider for AddressBook {
    async fn selected(&self) -> Option<Address> {
        self.resolve()
    }
}

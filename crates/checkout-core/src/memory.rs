//! # In-Memory Stores
//!
//! Process-local cart and order store. Used for development runs and as the
//! fixtures behind the orchestrator tests.

use crate::cart::{CartKey, LineItem, Variants};
use crate::error::{CheckoutError, CheckoutResult};
use crate::order::{OrderStatus, PersistedOrder};
use crate::ports::{CartProvider, OrderStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory cart. With no explicit selection the whole cart is checked out.
#[derive(Debug, Default)]
pub struct InMemoryCart {
    entries: RwLock<Vec<LineItem>>,
    selection: RwLock<Option<Vec<CartKey>>>,
}

impl InMemoryCart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add an entry
    pub fn with_item(self, item: LineItem) -> Self {
        self.add(item);
        self
    }

    /// Add an entry, merging quantity into an existing entry with the same key
    pub fn add(&self, item: LineItem) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let key = item.cart_key();
        match entries.iter_mut().find(|e| key.matches(e)) {
            Some(existing) => existing.quantity += item.quantity,
            None => entries.push(item),
        }
    }

    /// Restrict checkout to these entries
    pub fn select(&self, keys: Vec<CartKey>) {
        *self.selection.write().unwrap_or_else(|e| e.into_inner()) = Some(keys);
    }

    /// Every entry in the cart, selected or not
    pub fn entries(&self) -> Vec<LineItem> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn has_selection(&self) -> bool {
        self.selection
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

#[async_trait]
impl CartProvider for InMemoryCart {
    async fn list(&self) -> CheckoutResult<Vec<LineItem>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let selection = self.selection.read().unwrap_or_else(|e| e.into_inner());
        Ok(match selection.as_ref() {
            Some(keys) => entries
                .iter()
                .filter(|item| keys.iter().any(|k| k.matches(item)))
                .cloned()
                .collect(),
            None => entries.clone(),
        })
    }

    async fn remove_matching(&self, product_id: &str, variants: &Variants) -> CheckoutResult<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.retain(|item| !(item.product_id == product_id && &item.variants == variants));
        Ok(())
    }

    async fn clear_selection(&self) -> CheckoutResult<()> {
        *self.selection.write().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}

/// In-memory order store keyed by order id
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, PersistedOrder>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: &PersistedOrder) -> CheckoutResult<()> {
        let mut orders = self.orders.write().unwrap_or_else(|e| e.into_inner());
        if orders.contains_key(&order.order_id) {
            return Err(CheckoutError::DuplicateOrder {
                order_id: order.order_id.clone(),
            });
        }
        orders.insert(order.order_id.clone(), order.clone());
        Ok(())
    }

    async fn get(&self, order_id: &str) -> CheckoutResult<Option<PersistedOrder>> {
        Ok(self
            .orders
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(order_id)
            .cloned())
    }

    async fn list_for_user(&self, user_id: &str) -> CheckoutResult<Vec<PersistedOrder>> {
        let orders = self.orders.read().unwrap_or_else(|e| e.into_inner());
        let mut found: Vec<_> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn update_status(
        &self,
        order_id: &str,
        status: OrderStatus,
    ) -> CheckoutResult<PersistedOrder> {
        let mut orders = self.orders.write().unwrap_or_else(|e| e.into_inner());
        let order = orders
            .get_mut(order_id)
            .ok_or_else(|| CheckoutError::OrderNotFound {
                order_id: order_id.to_string(),
            })?;
        order.transition(status)?;
        Ok(order.clone())
    }
}

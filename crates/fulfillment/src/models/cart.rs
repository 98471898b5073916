//! The mutable pre-order basket.
//!
//! One active cart per user, created lazily on first access and deleted
//! exactly when an order is successfully assembled from it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tamarind_core::{CartId, CartItemId, ProductId, UserId, VariantId};

/// A user's cart with its items, in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Whether the cart has nothing to order.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One selected product (optionally a specific variant) and quantity.
///
/// `unit_price` is captured at add-time for display; order assembly re-prices
/// from the current catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub added_at: DateTime<Utc>,
}

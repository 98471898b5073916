//! Unified error handling for the fulfillment domain.
//!
//! All variants are expected, recoverable-by-caller conditions. Each carries
//! enough context (SKU, requested vs. available quantity, current vs.
//! requested state) for the caller to present a user-facing message.

use thiserror::Error;

use tamarind_core::{OrderId, OrderStatus, ProductId, Sku, VariantId};

use crate::db::RepositoryError;
use crate::models::order::OrderTransition;

/// Domain-level error type for fulfillment operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The user's cart has no items.
    #[error("cart is empty")]
    EmptyCart,

    /// The product is deleted or otherwise not orderable.
    #[error("product {product_id} is unavailable")]
    ProductUnavailable { product_id: ProductId },

    /// The variant is deleted or does not belong to the ordered product.
    #[error("variant {variant_id} is invalid")]
    VariantInvalid { variant_id: VariantId },

    /// No stock left for the SKU.
    #[error("{sku} is out of stock")]
    OutOfStock { sku: Sku },

    /// Stock exists but not enough of it.
    #[error("insufficient stock for {sku}: requested {requested}, available {available}")]
    InsufficientStock {
        sku: Sku,
        requested: i32,
        available: i32,
    },

    /// A required field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested status transition is not allowed from the current status.
    #[error("order is {current}, cannot {requested}")]
    InvalidTransition {
        current: OrderStatus,
        requested: OrderTransition,
    },

    /// No order with the given id.
    #[error("order {order_id} not found")]
    OrderNotFound { order_id: OrderId },

    /// `MarkPaid` on an order whose payment status is already `Paid`.
    #[error("order {order_id} is already paid")]
    AlreadyPaid { order_id: OrderId },

    /// `MarkRefunded` on an order that was never paid.
    #[error("order {order_id} is not paid")]
    NotPaid { order_id: OrderId },

    /// Storage failure underneath a domain operation.
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
}

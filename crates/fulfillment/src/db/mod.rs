//! Storage for the fulfillment domain.
//!
//! The unit of work is explicit: [`FulfillmentStore::begin`] yields a
//! [`FulfillmentTx`] and every multi-step domain operation happens inside
//! one transaction, so the atomicity boundary is visible in the function
//! signature rather than implied by a shared session. Dropping a
//! transaction without [`FulfillmentTx::commit`] rolls it back.
//!
//! Two implementations ship: [`postgres::PgStore`] for production and
//! [`memory::MemoryStore`] for tests.

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use tamarind_core::{
    CartId, DiscountCodeId, OrderId, ProductId, Sku, UserId, VariantId,
};

use crate::models::cart::Cart;
use crate::models::catalog::{Product, Variant};
use crate::models::discount::DiscountCode;
use crate::models::order::{NewOrder, NewOrderLine, Order, OrderLine};
use crate::models::report::{MonthlyRevenue, StatusCount};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate order number).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// The storage seam for the fulfillment domain.
///
/// Methods on the store itself are read-side queries outside any
/// transaction; everything that mutates goes through [`Self::begin`].
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    /// Start a unit of work.
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx + '_>, RepositoryError>;

    /// Fetch an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Fetch the lines of an order, in insertion order.
    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError>;

    /// A user's orders, newest first.
    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// Look up a discount code by its code string, case-insensitively.
    async fn discount_by_code(&self, code: &str) -> Result<Option<DiscountCode>, RepositoryError>;

    /// How many times a user has redeemed a code.
    async fn user_redemptions(
        &self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<i32, RepositoryError>;

    /// Revenue over `[from, to)`: paid, non-cancelled orders only.
    async fn revenue_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError>;

    /// Order count over `[from, to)`, excluding cancelled orders.
    async fn order_count_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, RepositoryError>;

    /// Per-month revenue and order counts for one year.
    async fn revenue_by_month(&self, year: i32) -> Result<Vec<MonthlyRevenue>, RepositoryError>;

    /// Order counts grouped by fulfillment status.
    async fn order_counts_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError>;
}

/// One transaction against the fulfillment store.
///
/// Reads within the transaction see its own writes. Stock decrement,
/// discount redemption and order-row loading are the contention points;
/// implementations must make each of them atomic against concurrent
/// transactions (compare-and-set updates, row locks).
#[async_trait]
pub trait FulfillmentTx: Send {
    /// The user's active cart with items, if any.
    async fn cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>, RepositoryError>;

    /// Delete a cart and its items.
    async fn delete_cart(&mut self, cart_id: CartId) -> Result<(), RepositoryError>;

    /// Fetch a product by id, deleted or not.
    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Fetch a variant by id, deleted or not.
    async fn variant(&mut self, id: VariantId) -> Result<Option<Variant>, RepositoryError>;

    /// Current stock of a SKU. `NotFound` when the SKU does not exist.
    async fn stock_of(&mut self, sku: Sku) -> Result<i32, RepositoryError>;

    /// Atomically decrement a SKU's stock if at least `quantity` is
    /// available. Returns `false` without mutating when it is not.
    async fn decrement_stock(&mut self, sku: Sku, quantity: i32) -> Result<bool, RepositoryError>;

    /// Add `quantity` back to a SKU's stock, flooring a corrupted negative
    /// counter at zero first. Not idempotent; callers own that.
    async fn restore_stock(&mut self, sku: Sku, quantity: i32) -> Result<(), RepositoryError>;

    /// Recompute a varianted product's displayed stock as the sum of its
    /// active variants' stock. No-op for products without variants.
    async fn recompute_product_stock(&mut self, id: ProductId) -> Result<(), RepositoryError>;

    /// Fetch a discount code by id.
    async fn discount_by_id(
        &mut self,
        id: DiscountCodeId,
    ) -> Result<Option<DiscountCode>, RepositoryError>;

    /// How many times a user has redeemed a code, as seen by this
    /// transaction.
    async fn user_redemptions(
        &mut self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<i32, RepositoryError>;

    /// Atomically redeem a code for a user: re-checks the global usage cap
    /// and the per-user cap under a lock on the code row, then increments
    /// both counters. Returns `false` without mutating when either cap is
    /// exhausted or the code is gone.
    async fn redeem_discount(
        &mut self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError>;

    /// Insert the order header. `Conflict` on a duplicate order number.
    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError>;

    /// Insert one order line. `Conflict` when the (order, product, variant)
    /// key already exists.
    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> Result<OrderLine, RepositoryError>;

    /// Fetch an order and lock its row for the rest of the transaction.
    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// The lines of an order.
    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError>;

    /// Write back an order's mutable fields (status, payment, tracking,
    /// cancellation, shipped/delivered timestamps).
    async fn update_order(&mut self, order: &Order) -> Result<(), RepositoryError>;

    /// Commit the unit of work.
    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

//! In-memory fulfillment store.
//!
//! Transactions clone the state at `begin` while holding the store mutex
//! for their whole lifetime; `commit` writes the working copy back and
//! dropping without commit discards it. That serializes transactions
//! completely, which is exactly the consistency the Postgres store gets
//! from row locks and compare-and-set updates, so the domain services
//! behave identically over either backend. Used by unit and integration
//! tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use tamarind_core::{
    CartId, CartItemId, DiscountCodeId, Lifecycle, OrderId, OrderLineId, OrderStatus,
    PaymentStatus, ProductId, Sku, UserId, VariantId,
};

use super::{FulfillmentStore, FulfillmentTx, RepositoryError};
use crate::models::cart::{Cart, CartItem};
use crate::models::catalog::{Product, Variant};
use crate::models::discount::{DiscountCode, NewDiscountCode};
use crate::models::order::{NewOrder, NewOrderLine, Order, OrderLine};
use crate::models::report::{MonthlyRevenue, StatusCount};

#[derive(Debug, Default, Clone)]
struct MemState {
    products: BTreeMap<i32, Product>,
    variants: BTreeMap<i32, Variant>,
    carts: BTreeMap<i32, Cart>,
    orders: BTreeMap<i32, Order>,
    order_lines: BTreeMap<i32, OrderLine>,
    discounts: BTreeMap<i32, DiscountCode>,
    redemptions: BTreeMap<(i32, i32), i32>,
    next_id: i32,
}

impl MemState {
    fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn stock_mut(&mut self, sku: Sku) -> Option<&mut i32> {
        match sku {
            Sku::Product(id) => self.products.get_mut(&id.as_i32()).map(|p| &mut p.stock),
            Sku::Variant(id) => self.variants.get_mut(&id.as_i32()).map(|v| &mut v.stock),
        }
    }

    fn stock(&self, sku: Sku) -> Option<i32> {
        match sku {
            Sku::Product(id) => self.products.get(&id.as_i32()).map(|p| p.stock),
            Sku::Variant(id) => self.variants.get(&id.as_i32()).map(|v| v.stock),
        }
    }

    fn recompute_product_stock(&mut self, id: ProductId) {
        let total: i32 = self
            .variants
            .values()
            .filter(|v| v.product_id == id && v.lifecycle.is_active())
            .map(|v| v.stock)
            .sum();
        if let Some(product) = self.products.get_mut(&id.as_i32())
            && product.has_variants
        {
            product.stock = total;
        }
    }

    fn cart_for_user(&self, user_id: UserId) -> Option<&Cart> {
        self.carts.values().find(|c| c.user_id == user_id)
    }
}

/// In-memory store for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Fixture helpers (the catalog/cart surfaces other domains own)
    // =========================================================================

    /// Seed a product with its own stock pool.
    pub async fn add_product(&self, name: &str, price: Decimal, stock: i32) -> Product {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let product = Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            price,
            stock,
            has_variants: false,
            lifecycle: Lifecycle::Active,
            created_at: Utc::now(),
        };
        state.products.insert(id, product.clone());
        product
    }

    /// Seed a variant; marks the parent product varianted and recomputes its
    /// displayed stock.
    pub async fn add_variant(
        &self,
        product_id: ProductId,
        size: Option<&str>,
        color: Option<&str>,
        price: Option<Decimal>,
        stock: i32,
    ) -> Variant {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let variant = Variant {
            id: VariantId::new(id),
            product_id,
            size: size.map(str::to_owned),
            color: color.map(str::to_owned),
            price,
            stock,
            lifecycle: Lifecycle::Active,
        };
        state.variants.insert(id, variant.clone());
        if let Some(product) = state.products.get_mut(&product_id.as_i32()) {
            product.has_variants = true;
        }
        state.recompute_product_stock(product_id);
        variant
    }

    /// Seed a discount code.
    pub async fn add_discount(&self, input: NewDiscountCode) -> DiscountCode {
        let mut state = self.state.lock().await;
        let id = state.allocate_id();
        let code = DiscountCode {
            id: DiscountCodeId::new(id),
            code: input.code,
            discount_type: input.discount_type,
            value: input.value,
            min_order_amount: input.min_order_amount,
            usage_limit: input.usage_limit,
            per_user_limit: input.per_user_limit,
            used_count: 0,
            lifecycle: Lifecycle::Active,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
        };
        state.discounts.insert(id, code.clone());
        code
    }

    /// Add an item to the user's cart, creating the cart lazily. The
    /// captured unit price is the current catalog price.
    pub async fn add_cart_item(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: i32,
    ) -> CartItem {
        let mut state = self.state.lock().await;
        let existing = state.cart_for_user(user_id).map(|cart| cart.id);
        let cart_id = if let Some(id) = existing {
            id
        } else {
            let id = CartId::new(state.allocate_id());
            state.carts.insert(
                id.as_i32(),
                Cart {
                    id,
                    user_id,
                    created_at: Utc::now(),
                    items: Vec::new(),
                },
            );
            id
        };

        let product_price = state
            .products
            .get(&product_id.as_i32())
            .map_or(Decimal::ZERO, |p| p.price);
        let unit_price = variant_id
            .and_then(|id| state.variants.get(&id.as_i32()))
            .map_or(product_price, |v| v.effective_price(product_price));

        let item = CartItem {
            id: CartItemId::new(state.allocate_id()),
            cart_id,
            product_id,
            variant_id,
            quantity,
            unit_price,
            added_at: Utc::now(),
        };
        if let Some(cart) = state.carts.get_mut(&cart_id.as_i32()) {
            cart.items.push(item.clone());
        }
        item
    }

    /// Soft-delete a product.
    pub async fn delete_product(&self, id: ProductId) {
        let mut state = self.state.lock().await;
        if let Some(product) = state.products.get_mut(&id.as_i32()) {
            product.lifecycle = Lifecycle::Deleted;
        }
    }

    /// Soft-delete a variant and recompute the parent's displayed stock.
    pub async fn delete_variant(&self, id: VariantId) {
        let mut state = self.state.lock().await;
        let product_id = state.variants.get_mut(&id.as_i32()).map(|variant| {
            variant.lifecycle = Lifecycle::Deleted;
            variant.product_id
        });
        if let Some(product_id) = product_id {
            state.recompute_product_stock(product_id);
        }
    }

    /// Current stock of a SKU, for assertions.
    pub async fn stock(&self, sku: Sku) -> Option<i32> {
        self.state.lock().await.stock(sku)
    }

    /// Whether the user still has a cart.
    pub async fn has_cart(&self, user_id: UserId) -> bool {
        self.state.lock().await.cart_for_user(user_id).is_some()
    }

    /// A discount code's global used count, for assertions.
    pub async fn discount_used_count(&self, id: DiscountCodeId) -> Option<i32> {
        self.state.lock().await.discounts.get(&id.as_i32()).map(|c| c.used_count)
    }
}

#[async_trait]
impl FulfillmentStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx + '_>, RepositoryError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryTx { guard, work }))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.state.lock().await.orders.get(&id.as_i32()).cloned())
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        Ok(lines_for(&self.state.lock().await.order_lines, id))
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    async fn discount_by_code(&self, code: &str) -> Result<Option<DiscountCode>, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .discounts
            .values()
            .find(|c| c.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn user_redemptions(
        &self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<i32, RepositoryError> {
        let state = self.state.lock().await;
        Ok(*state
            .redemptions
            .get(&(code_id.as_i32(), user_id.as_i32()))
            .unwrap_or(&0))
    }

    async fn revenue_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| counts_for_revenue(o) && o.created_at >= from && o.created_at < to)
            .map(|o| o.total_amount)
            .sum())
    }

    async fn order_count_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let state = self.state.lock().await;
        Ok(state
            .orders
            .values()
            .filter(|o| {
                o.status != OrderStatus::Cancelled && o.created_at >= from && o.created_at < to
            })
            .count() as i64)
    }

    async fn revenue_by_month(&self, year: i32) -> Result<Vec<MonthlyRevenue>, RepositoryError> {
        let state = self.state.lock().await;
        let mut months: BTreeMap<u32, MonthlyRevenue> = BTreeMap::new();
        for order in state.orders.values() {
            if order.created_at.year() != year {
                continue;
            }
            let month = order.created_at.month();
            let entry = months.entry(month).or_insert_with(|| MonthlyRevenue {
                month,
                revenue: Decimal::ZERO,
                orders: 0,
            });
            if counts_for_revenue(order) {
                entry.revenue += order.total_amount;
            }
            if order.status != OrderStatus::Cancelled {
                entry.orders += 1;
            }
        }
        Ok(months.into_values().collect())
    }

    async fn order_counts_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        let state = self.state.lock().await;
        let mut counts: BTreeMap<String, StatusCount> = BTreeMap::new();
        for order in state.orders.values() {
            counts
                .entry(order.status.to_string())
                .or_insert(StatusCount {
                    status: order.status,
                    count: 0,
                })
                .count += 1;
        }
        Ok(counts.into_values().collect())
    }
}

fn counts_for_revenue(order: &Order) -> bool {
    order.payment_status == PaymentStatus::Paid && order.status != OrderStatus::Cancelled
}

fn lines_for(lines: &BTreeMap<i32, OrderLine>, id: OrderId) -> Vec<OrderLine> {
    lines
        .values()
        .filter(|l| l.order_id == id)
        .cloned()
        .collect()
}

// =============================================================================
// Transaction
// =============================================================================

struct MemoryTx {
    guard: OwnedMutexGuard<MemState>,
    work: MemState,
}

#[async_trait]
impl FulfillmentTx for MemoryTx {
    async fn cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        Ok(self.work.cart_for_user(user_id).cloned())
    }

    async fn delete_cart(&mut self, cart_id: CartId) -> Result<(), RepositoryError> {
        self.work.carts.remove(&cart_id.as_i32());
        Ok(())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.work.products.get(&id.as_i32()).cloned())
    }

    async fn variant(&mut self, id: VariantId) -> Result<Option<Variant>, RepositoryError> {
        Ok(self.work.variants.get(&id.as_i32()).cloned())
    }

    async fn stock_of(&mut self, sku: Sku) -> Result<i32, RepositoryError> {
        self.work.stock(sku).ok_or(RepositoryError::NotFound)
    }

    async fn decrement_stock(&mut self, sku: Sku, quantity: i32) -> Result<bool, RepositoryError> {
        let Some(stock) = self.work.stock_mut(sku) else {
            return Err(RepositoryError::NotFound);
        };
        if *stock < quantity {
            return Ok(false);
        }
        *stock -= quantity;
        Ok(true)
    }

    async fn restore_stock(&mut self, sku: Sku, quantity: i32) -> Result<(), RepositoryError> {
        let Some(stock) = self.work.stock_mut(sku) else {
            return Err(RepositoryError::NotFound);
        };
        *stock = (*stock).max(0) + quantity;
        Ok(())
    }

    async fn recompute_product_stock(&mut self, id: ProductId) -> Result<(), RepositoryError> {
        self.work.recompute_product_stock(id);
        Ok(())
    }

    async fn discount_by_id(
        &mut self,
        id: DiscountCodeId,
    ) -> Result<Option<DiscountCode>, RepositoryError> {
        Ok(self.work.discounts.get(&id.as_i32()).cloned())
    }

    async fn user_redemptions(
        &mut self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<i32, RepositoryError> {
        Ok(*self
            .work
            .redemptions
            .get(&(code_id.as_i32(), user_id.as_i32()))
            .unwrap_or(&0))
    }

    async fn redeem_discount(
        &mut self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        let Some(code) = self.work.discounts.get(&code_id.as_i32()) else {
            return Ok(false);
        };
        if !code.lifecycle.is_active() {
            return Ok(false);
        }
        if code.usage_limit.is_some_and(|limit| code.used_count >= limit) {
            return Ok(false);
        }
        let key = (code_id.as_i32(), user_id.as_i32());
        let uses = *self.work.redemptions.get(&key).unwrap_or(&0);
        if code.per_user_limit.is_some_and(|limit| uses >= limit) {
            return Ok(false);
        }

        if let Some(code) = self.work.discounts.get_mut(&code_id.as_i32()) {
            code.used_count += 1;
        }
        self.work.redemptions.insert(key, uses + 1);
        Ok(true)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        if self
            .work
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            return Err(RepositoryError::Conflict(format!(
                "order number already exists: {}",
                order.order_number
            )));
        }

        let id = OrderId::new(self.work.allocate_id());
        let stored = Order {
            id,
            order_number: order.order_number.clone(),
            user_id: order.user_id,
            created_at: Utc::now(),
            subtotal: order.subtotal,
            shipping_fee: order.shipping_fee,
            tax_amount: order.tax_amount,
            discount_amount: order.discount_amount,
            total_amount: order.total_amount,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_name: order.shipping_name.clone(),
            shipping_phone: order.shipping_phone.clone(),
            shipping_address: order.shipping_address.clone(),
            payment_method: order.payment_method.clone(),
            customer_notes: order.customer_notes.clone(),
            discount_code_id: order.discount_code_id,
            tracking_number: None,
            cancelled_reason: None,
            cancelled_at: None,
            shipped_at: None,
            delivered_at: None,
        };
        self.work.orders.insert(id.as_i32(), stored.clone());
        Ok(stored)
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> Result<OrderLine, RepositoryError> {
        let duplicate = self.work.order_lines.values().any(|l| {
            l.order_id == order_id
                && l.product_id == line.product_id
                && l.variant_id == line.variant_id
        });
        if duplicate {
            return Err(RepositoryError::Conflict(
                "duplicate order line for product/variant".to_owned(),
            ));
        }

        let id = OrderLineId::new(self.work.allocate_id());
        let stored = OrderLine {
            id,
            order_id,
            product_id: line.product_id,
            variant_id: line.variant_id,
            product_name: line.product_name.clone(),
            variant_size: line.variant_size.clone(),
            variant_color: line.variant_color.clone(),
            quantity: line.quantity,
            unit_price: line.unit_price,
            line_total: line.line_total,
        };
        self.work.order_lines.insert(id.as_i32(), stored.clone());
        Ok(stored)
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        // The store mutex is held for the transaction's lifetime, which is
        // a stronger lock than the row-level FOR UPDATE it mirrors.
        Ok(self.work.orders.get(&id.as_i32()).cloned())
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        Ok(lines_for(&self.work.order_lines, id))
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        let Some(stored) = self.work.orders.get_mut(&order.id.as_i32()) else {
            return Err(RepositoryError::NotFound);
        };
        stored.status = order.status;
        stored.payment_status = order.payment_status;
        stored.tracking_number = order.tracking_number.clone();
        stored.cancelled_reason = order.cancelled_reason.clone();
        stored.cancelled_at = order.cancelled_at;
        stored.shipped_at = order.shipped_at;
        stored.delivered_at = order.delivered_at;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}

//! `PostgreSQL` implementation of the fulfillment store.
//!
//! Queries are runtime-checked (`sqlx::query_as` with binds); the schema
//! lives in `migrations/`. The contention points are handled in SQL:
//! stock decrement is a compare-and-set `UPDATE ... WHERE stock >= $n`,
//! discount redemption re-checks both caps under `SELECT ... FOR UPDATE`
//! on the code row, and lifecycle transitions load the order row with
//! `FOR UPDATE` before writing the new status.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use tamarind_core::{
    CartId, CartItemId, DiscountCodeId, OrderId, OrderLineId, ProductId, Sku, UserId, VariantId,
};

use super::{FulfillmentStore, FulfillmentTx, RepositoryError};
use crate::models::cart::{Cart, CartItem};
use crate::models::catalog::{Product, Variant};
use crate::models::discount::DiscountCode;
use crate::models::order::{NewOrder, NewOrderLine, Order, OrderLine};
use crate::models::report::{MonthlyRevenue, StatusCount};

/// Parse a stored enum value, mapping failures to `DataCorruption`.
fn parse_stored<T>(raw: &str, what: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr,
{
    raw.parse()
        .map_err(|_| RepositoryError::DataCorruption(format!("invalid {what}: {raw}")))
}

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    price: Decimal,
    stock: i32,
    has_variants: bool,
    lifecycle: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            price: row.price,
            stock: row.stock,
            has_variants: row.has_variants,
            lifecycle: parse_stored(&row.lifecycle, "lifecycle")?,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VariantRow {
    id: i32,
    product_id: i32,
    size: Option<String>,
    color: Option<String>,
    price: Option<Decimal>,
    stock: i32,
    lifecycle: String,
}

impl TryFrom<VariantRow> for Variant {
    type Error = RepositoryError;

    fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: VariantId::new(row.id),
            product_id: ProductId::new(row.product_id),
            size: row.size,
            color: row.color,
            price: row.price,
            stock: row.stock,
            lifecycle: parse_stored(&row.lifecycle, "lifecycle")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i32,
    user_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: i32,
    cart_id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    quantity: i32,
    unit_price: Decimal,
    added_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: CartItemId::new(row.id),
            cart_id: CartId::new(row.cart_id),
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            quantity: row.quantity,
            unit_price: row.unit_price,
            added_at: row.added_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DiscountCodeRow {
    id: i32,
    code: String,
    discount_type: String,
    value: Decimal,
    min_order_amount: Option<Decimal>,
    usage_limit: Option<i32>,
    per_user_limit: Option<i32>,
    used_count: i32,
    lifecycle: String,
    starts_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
}

impl TryFrom<DiscountCodeRow> for DiscountCode {
    type Error = RepositoryError;

    fn try_from(row: DiscountCodeRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: DiscountCodeId::new(row.id),
            code: row.code,
            discount_type: parse_stored(&row.discount_type, "discount type")?,
            value: row.value,
            min_order_amount: row.min_order_amount,
            usage_limit: row.usage_limit,
            per_user_limit: row.per_user_limit,
            used_count: row.used_count,
            lifecycle: parse_stored(&row.lifecycle, "lifecycle")?,
            starts_at: row.starts_at,
            ends_at: row.ends_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    order_number: String,
    user_id: i32,
    created_at: DateTime<Utc>,
    subtotal: Decimal,
    shipping_fee: Decimal,
    tax_amount: Decimal,
    discount_amount: Decimal,
    total_amount: Decimal,
    status: String,
    payment_status: String,
    shipping_name: String,
    shipping_phone: String,
    shipping_address: String,
    payment_method: String,
    customer_notes: Option<String>,
    discount_code_id: Option<i32>,
    tracking_number: Option<String>,
    cancelled_reason: Option<String>,
    cancelled_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            order_number: row.order_number,
            user_id: UserId::new(row.user_id),
            created_at: row.created_at,
            subtotal: row.subtotal,
            shipping_fee: row.shipping_fee,
            tax_amount: row.tax_amount,
            discount_amount: row.discount_amount,
            total_amount: row.total_amount,
            status: parse_stored(&row.status, "order status")?,
            payment_status: parse_stored(&row.payment_status, "payment status")?,
            shipping_name: row.shipping_name,
            shipping_phone: row.shipping_phone,
            shipping_address: row.shipping_address,
            payment_method: row.payment_method,
            customer_notes: row.customer_notes,
            discount_code_id: row.discount_code_id.map(DiscountCodeId::new),
            tracking_number: row.tracking_number,
            cancelled_reason: row.cancelled_reason,
            cancelled_at: row.cancelled_at,
            shipped_at: row.shipped_at,
            delivered_at: row.delivered_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    variant_id: Option<i32>,
    product_name: String,
    variant_size: Option<String>,
    variant_color: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        Self {
            id: OrderLineId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            variant_id: row.variant_id.map(VariantId::new),
            product_name: row.product_name,
            variant_size: row.variant_size,
            variant_color: row.variant_color,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
        }
    }
}

const SELECT_ORDER: &str = "SELECT id, order_number, user_id, created_at, subtotal, \
     shipping_fee, tax_amount, discount_amount, total_amount, status, payment_status, \
     shipping_name, shipping_phone, shipping_address, payment_method, customer_notes, \
     discount_code_id, tracking_number, cancelled_reason, cancelled_at, shipped_at, \
     delivered_at FROM fulfillment.orders";

const SELECT_ORDER_LINES: &str = "SELECT id, order_id, product_id, variant_id, product_name, \
     variant_size, variant_color, quantity, unit_price, line_total \
     FROM fulfillment.order_line WHERE order_id = $1 ORDER BY id";

const SELECT_DISCOUNT: &str = "SELECT id, code, discount_type, value, min_order_amount, \
     usage_limit, per_user_limit, used_count, lifecycle, starts_at, ends_at \
     FROM fulfillment.discount_code";

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL`-backed fulfillment store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FulfillmentStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn FulfillmentTx + '_>, RepositoryError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(id.as_i32())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Order::try_from).transpose()
    }

    async fn order_lines(&self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(SELECT_ORDER_LINES)
            .bind(id.as_i32())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn orders_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "{SELECT_ORDER} WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn discount_by_code(&self, code: &str) -> Result<Option<DiscountCode>, RepositoryError> {
        let row = sqlx::query_as::<_, DiscountCodeRow>(&format!(
            "{SELECT_DISCOUNT} WHERE LOWER(code) = LOWER($1)"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;
        row.map(DiscountCode::try_from).transpose()
    }

    async fn user_redemptions(
        &self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<i32, RepositoryError> {
        let uses = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT uses FROM fulfillment.discount_redemption \
             WHERE discount_code_id = $1 AND user_id = $2",
        )
        .bind(code_id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(&self.pool)
        .await?;
        Ok(uses.flatten().unwrap_or(0))
    }

    async fn revenue_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, RepositoryError> {
        let revenue = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(total_amount), 0) FROM fulfillment.orders \
             WHERE payment_status = 'paid' AND status <> 'cancelled' \
               AND created_at >= $1 AND created_at < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(revenue)
    }

    async fn order_count_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM fulfillment.orders \
             WHERE status <> 'cancelled' AND created_at >= $1 AND created_at < $2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn revenue_by_month(&self, year: i32) -> Result<Vec<MonthlyRevenue>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct MonthRow {
            month: i32,
            revenue: Decimal,
            orders: i64,
        }

        let rows = sqlx::query_as::<_, MonthRow>(
            "SELECT EXTRACT(MONTH FROM created_at)::int AS month, \
                    COALESCE(SUM(total_amount) FILTER \
                        (WHERE payment_status = 'paid' AND status <> 'cancelled'), 0) AS revenue, \
                    COUNT(*) FILTER (WHERE status <> 'cancelled') AS orders \
             FROM fulfillment.orders \
             WHERE EXTRACT(YEAR FROM created_at)::int = $1 \
             GROUP BY month ORDER BY month",
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(MonthlyRevenue {
                    month: u32::try_from(row.month).map_err(|_| {
                        RepositoryError::DataCorruption(format!("invalid month: {}", row.month))
                    })?,
                    revenue: row.revenue,
                    orders: row.orders,
                })
            })
            .collect()
    }

    async fn order_counts_by_status(&self) -> Result<Vec<StatusCount>, RepositoryError> {
        #[derive(sqlx::FromRow)]
        struct StatusRow {
            status: String,
            count: i64,
        }

        let rows = sqlx::query_as::<_, StatusRow>(
            "SELECT status, COUNT(*) AS count FROM fulfillment.orders \
             GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(StatusCount {
                    status: parse_stored(&row.status, "order status")?,
                    count: row.count,
                })
            })
            .collect()
    }
}

// =============================================================================
// Transaction
// =============================================================================

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    fn stock_table(sku: Sku) -> (&'static str, i32) {
        match sku {
            Sku::Product(id) => ("fulfillment.product", id.as_i32()),
            Sku::Variant(id) => ("fulfillment.variant", id.as_i32()),
        }
    }
}

#[async_trait]
impl FulfillmentTx for PgTx {
    async fn cart_for_user(&mut self, user_id: UserId) -> Result<Option<Cart>, RepositoryError> {
        let Some(cart) = sqlx::query_as::<_, CartRow>(
            "SELECT id, user_id, created_at FROM fulfillment.cart WHERE user_id = $1",
        )
        .bind(user_id.as_i32())
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(None);
        };

        let items = sqlx::query_as::<_, CartItemRow>(
            "SELECT id, cart_id, product_id, variant_id, quantity, unit_price, added_at \
             FROM fulfillment.cart_item WHERE cart_id = $1 ORDER BY id",
        )
        .bind(cart.id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(Some(Cart {
            id: CartId::new(cart.id),
            user_id: UserId::new(cart.user_id),
            created_at: cart.created_at,
            items: items.into_iter().map(Into::into).collect(),
        }))
    }

    async fn delete_cart(&mut self, cart_id: CartId) -> Result<(), RepositoryError> {
        // cart_item rows cascade
        sqlx::query("DELETE FROM fulfillment.cart WHERE id = $1")
            .bind(cart_id.as_i32())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn product(&mut self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(
            "SELECT id, name, price, stock, has_variants, lifecycle, created_at \
             FROM fulfillment.product WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Product::try_from).transpose()
    }

    async fn variant(&mut self, id: VariantId) -> Result<Option<Variant>, RepositoryError> {
        let row = sqlx::query_as::<_, VariantRow>(
            "SELECT id, product_id, size, color, price, stock, lifecycle \
             FROM fulfillment.variant WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(&mut *self.tx)
        .await?;
        row.map(Variant::try_from).transpose()
    }

    async fn stock_of(&mut self, sku: Sku) -> Result<i32, RepositoryError> {
        let (table, id) = Self::stock_table(sku);
        sqlx::query_scalar::<_, i32>(&format!("SELECT stock FROM {table} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    async fn decrement_stock(&mut self, sku: Sku, quantity: i32) -> Result<bool, RepositoryError> {
        let (table, id) = Self::stock_table(sku);
        let result = sqlx::query(&format!(
            "UPDATE {table} SET stock = stock - $2 WHERE id = $1 AND stock >= $2"
        ))
        .bind(id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn restore_stock(&mut self, sku: Sku, quantity: i32) -> Result<(), RepositoryError> {
        let (table, id) = Self::stock_table(sku);
        sqlx::query(&format!(
            "UPDATE {table} SET stock = GREATEST(stock, 0) + $2 WHERE id = $1"
        ))
        .bind(id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn recompute_product_stock(&mut self, id: ProductId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE fulfillment.product p \
             SET stock = COALESCE((SELECT SUM(v.stock) FROM fulfillment.variant v \
                                   WHERE v.product_id = p.id AND v.lifecycle = 'active'), 0) \
             WHERE p.id = $1 AND p.has_variants",
        )
        .bind(id.as_i32())
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn discount_by_id(
        &mut self,
        id: DiscountCodeId,
    ) -> Result<Option<DiscountCode>, RepositoryError> {
        let row =
            sqlx::query_as::<_, DiscountCodeRow>(&format!("{SELECT_DISCOUNT} WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(DiscountCode::try_from).transpose()
    }

    async fn user_redemptions(
        &mut self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<i32, RepositoryError> {
        let uses = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT uses FROM fulfillment.discount_redemption \
             WHERE discount_code_id = $1 AND user_id = $2",
        )
        .bind(code_id.as_i32())
        .bind(user_id.as_i32())
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(uses.flatten().unwrap_or(0))
    }

    async fn redeem_discount(
        &mut self,
        code_id: DiscountCodeId,
        user_id: UserId,
    ) -> Result<bool, RepositoryError> {
        // The code-row lock serializes every redemption of this code, so the
        // cap checks below cannot race another transaction.
        let Some(row) = sqlx::query_as::<_, DiscountCodeRow>(&format!(
            "{SELECT_DISCOUNT} WHERE id = $1 AND lifecycle = 'active' FOR UPDATE"
        ))
        .bind(code_id.as_i32())
        .fetch_optional(&mut *self.tx)
        .await?
        else {
            return Ok(false);
        };

        if row.usage_limit.is_some_and(|limit| row.used_count >= limit) {
            return Ok(false);
        }

        if let Some(limit) = row.per_user_limit {
            let uses = self.user_redemptions(code_id, user_id).await?;
            if uses >= limit {
                return Ok(false);
            }
        }

        sqlx::query(
            "UPDATE fulfillment.discount_code SET used_count = used_count + 1 WHERE id = $1",
        )
        .bind(code_id.as_i32())
        .execute(&mut *self.tx)
        .await?;

        sqlx::query(
            "INSERT INTO fulfillment.discount_redemption (discount_code_id, user_id, uses) \
             VALUES ($1, $2, 1) \
             ON CONFLICT (discount_code_id, user_id) \
             DO UPDATE SET uses = fulfillment.discount_redemption.uses + 1",
        )
        .bind(code_id.as_i32())
        .bind(user_id.as_i32())
        .execute(&mut *self.tx)
        .await?;

        Ok(true)
    }

    async fn insert_order(&mut self, order: &NewOrder) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(
            "INSERT INTO fulfillment.orders (order_number, user_id, subtotal, shipping_fee, \
                 tax_amount, discount_amount, total_amount, shipping_name, shipping_phone, \
                 shipping_address, payment_method, customer_notes, discount_code_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING id, order_number, user_id, created_at, subtotal, shipping_fee, \
                 tax_amount, discount_amount, total_amount, status, payment_status, \
                 shipping_name, shipping_phone, shipping_address, payment_method, \
                 customer_notes, discount_code_id, tracking_number, cancelled_reason, \
                 cancelled_at, shipped_at, delivered_at",
        )
        .bind(&order.order_number)
        .bind(order.user_id.as_i32())
        .bind(order.subtotal)
        .bind(order.shipping_fee)
        .bind(order.tax_amount)
        .bind(order.discount_amount)
        .bind(order.total_amount)
        .bind(&order.shipping_name)
        .bind(&order.shipping_phone)
        .bind(&order.shipping_address)
        .bind(&order.payment_method)
        .bind(&order.customer_notes)
        .bind(order.discount_code_id.map(|id| id.as_i32()))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict(format!(
                    "order number already exists: {}",
                    order.order_number
                ));
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    async fn insert_order_line(
        &mut self,
        order_id: OrderId,
        line: &NewOrderLine,
    ) -> Result<OrderLine, RepositoryError> {
        let row = sqlx::query_as::<_, OrderLineRow>(
            "INSERT INTO fulfillment.order_line (order_id, product_id, variant_id, \
                 product_name, variant_size, variant_color, quantity, unit_price, line_total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING id, order_id, product_id, variant_id, product_name, variant_size, \
                 variant_color, quantity, unit_price, line_total",
        )
        .bind(order_id.as_i32())
        .bind(line.product_id.as_i32())
        .bind(line.variant_id.map(|id| id.as_i32()))
        .bind(&line.product_name)
        .bind(&line.variant_size)
        .bind(&line.variant_color)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(line.line_total)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict(
                    "duplicate order line for product/variant".to_owned(),
                );
            }
            RepositoryError::Database(e)
        })?;

        Ok(row.into())
    }

    async fn order_for_update(&mut self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row =
            sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1 FOR UPDATE"))
                .bind(id.as_i32())
                .fetch_optional(&mut *self.tx)
                .await?;
        row.map(Order::try_from).transpose()
    }

    async fn order_lines(&mut self, id: OrderId) -> Result<Vec<OrderLine>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderLineRow>(SELECT_ORDER_LINES)
            .bind(id.as_i32())
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_order(&mut self, order: &Order) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE fulfillment.orders SET status = $2, payment_status = $3, \
                 tracking_number = $4, cancelled_reason = $5, cancelled_at = $6, \
                 shipped_at = $7, delivered_at = $8 \
             WHERE id = $1",
        )
        .bind(order.id.as_i32())
        .bind(order.status.to_string())
        .bind(order.payment_status.to_string())
        .bind(&order.tracking_number)
        .bind(&order.cancelled_reason)
        .bind(order.cancelled_at)
        .bind(order.shipped_at)
        .bind(order.delivered_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

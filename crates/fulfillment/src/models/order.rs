//! The immutable order aggregate.
//!
//! Once created, subtotal and line prices never change; only status,
//! payment, tracking and cancellation fields mutate, and only through the
//! lifecycle service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tamarind_core::{
    DiscountCodeId, OrderId, OrderLineId, OrderStatus, PaymentStatus, ProductId, UserId, VariantId,
};

/// A completed checkout.
///
/// `total_amount = subtotal + shipping_fee + tax_amount - discount_amount`
/// unless the caller supplied a final total at creation. `tax_amount` is
/// persisted at creation and never re-derived on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Unique, human-readable: `ORD` + `yyyyMMdd` + 6 random digits.
    pub order_number: String,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,

    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,

    pub status: OrderStatus,
    pub payment_status: PaymentStatus,

    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub customer_notes: Option<String>,

    pub discount_code_id: Option<DiscountCodeId>,
    pub tracking_number: Option<String>,
    pub cancelled_reason: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether the order was placed cash-on-delivery.
    #[must_use]
    pub fn is_cash_on_delivery(&self) -> bool {
        self.payment_method.eq_ignore_ascii_case("COD")
    }
}

/// A price-and-attribute snapshot of one purchased SKU.
///
/// Keyed by (order, product, variant): at most one line per variant of a
/// product per order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    /// Product name at order time; later catalog renames never affect it.
    pub product_name: String,
    pub variant_size: Option<String>,
    pub variant_color: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Checkout input for [`create_order`](crate::services::orders::OrderService::create_order).
#[derive(Debug, Clone, Default)]
pub struct CreateOrderRequest {
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub customer_notes: Option<String>,
    pub discount_code_id: Option<DiscountCodeId>,
    pub shipping_fee: Decimal,
    pub tax_amount: Decimal,
    /// Trusted when present and positive; otherwise the total is computed.
    pub final_total: Option<Decimal>,
    /// Explicit lines; when absent, lines are derived from the cart.
    pub lines: Option<Vec<RequestedLine>>,
}

/// One requested order line, before pricing and snapshotting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestedLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
}

/// Insert input for the order header.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub subtotal: Decimal,
    pub shipping_fee: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub payment_method: String,
    pub customer_notes: Option<String>,
    pub discount_code_id: Option<DiscountCodeId>,
}

/// Insert input for one order line.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub product_name: String,
    pub variant_size: Option<String>,
    pub variant_color: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// The transitions the order state machine can attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderTransition {
    Confirm,
    Ship,
    Deliver,
    Cancel,
    Pay,
    Refund,
}

impl std::fmt::Display for OrderTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Confirm => write!(f, "confirm"),
            Self::Ship => write!(f, "ship"),
            Self::Deliver => write!(f, "deliver"),
            Self::Cancel => write!(f, "cancel"),
            Self::Pay => write!(f, "pay"),
            Self::Refund => write!(f, "refund"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cod_detection_is_case_insensitive() {
        let mut order = sample_order();
        order.payment_method = "cod".to_owned();
        assert!(order.is_cash_on_delivery());
        order.payment_method = "COD".to_owned();
        assert!(order.is_cash_on_delivery());
        order.payment_method = "bank_transfer".to_owned();
        assert!(!order.is_cash_on_delivery());
    }

    fn sample_order() -> Order {
        Order {
            id: OrderId::new(1),
            order_number: "ORD20250614438201".to_owned(),
            user_id: UserId::new(1),
            created_at: Utc::now(),
            subtotal: Decimal::from(200_000),
            shipping_fee: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total_amount: Decimal::from(200_000),
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            shipping_name: "A".to_owned(),
            shipping_phone: "1".to_owned(),
            shipping_address: "B".to_owned(),
            payment_method: "COD".to_owned(),
            customer_notes: None,
            discount_code_id: None,
            tracking_number: None,
            cancelled_reason: None,
            cancelled_at: None,
            shipped_at: None,
            delivered_at: None,
        }
    }
}

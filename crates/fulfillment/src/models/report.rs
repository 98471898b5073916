//! Read-side reporting aggregates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tamarind_core::OrderStatus;

/// Revenue and order count for one calendar month.
///
/// Revenue sums only paid, non-cancelled orders; the order count excludes
/// cancelled orders regardless of payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyRevenue {
    /// 1-based month number.
    pub month: u32,
    pub revenue: Decimal,
    pub orders: i64,
}

/// Number of orders currently in one fulfillment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

//! Discount codes.
//!
//! Owned by the catalog/admin domain; the order domain reads them during
//! validation and increments their usage counters during assembly.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tamarind_core::{DiscountCodeId, DiscountType, Lifecycle};

/// A redeemable discount code.
///
/// The code string matches case-insensitively. `used_count` is the global
/// redemption counter; per-user usage lives in a dedicated counter keyed by
/// (code, user).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscountCode {
    pub id: DiscountCodeId,
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub used_count: i32,
    pub lifecycle: Lifecycle,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

/// Input for seeding a new discount code.
#[derive(Debug, Clone)]
pub struct NewDiscountCode {
    pub code: String,
    pub discount_type: DiscountType,
    pub value: Decimal,
    pub min_order_amount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub per_user_limit: Option<i32>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

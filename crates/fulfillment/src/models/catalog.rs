//! Catalog records as the fulfillment domain sees them.
//!
//! Catalog CRUD is owned elsewhere; fulfillment only reads these to price
//! and validate order lines, and mutates their stock counters.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tamarind_core::{Lifecycle, ProductId, VariantId};

/// A sellable product.
///
/// For a product with variants, `stock` is a displayed total kept equal to
/// the sum of its active variants' stock; the variants' own pools are what
/// order lines draw from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
    pub stock: i32,
    pub has_variants: bool,
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Whether new order lines may reference this product.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        self.lifecycle.is_active()
    }
}

/// A size/color variant of a product, with its own stock pool and an
/// optional price override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Option<Decimal>,
    pub stock: i32,
    pub lifecycle: Lifecycle,
}

impl Variant {
    /// Whether new order lines may reference this variant.
    #[must_use]
    pub const fn is_orderable(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// The unit price an order line snapshots: the variant's own price when
    /// set and positive, otherwise the product price.
    #[must_use]
    pub fn effective_price(&self, product_price: Decimal) -> Decimal {
        match self.price {
            Some(price) if price > Decimal::ZERO => price,
            _ => product_price,
        }
    }
}

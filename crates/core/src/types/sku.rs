//! Stock-keeping unit identification.

use serde::{Deserialize, Serialize};

use super::id::{ProductId, VariantId};

/// A stock-keeping unit: either a product's own stock pool, or a specific
/// variant's pool. The two pools are independent; a product with variants
/// tracks its displayed stock as the sum of its active variants' stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sku {
    Product(ProductId),
    Variant(VariantId),
}

impl Sku {
    /// The SKU for an order line: the variant pool when the line has a
    /// variant, otherwise the product pool.
    #[must_use]
    pub fn for_line(product_id: ProductId, variant_id: Option<VariantId>) -> Self {
        variant_id.map_or(Self::Product(product_id), Self::Variant)
    }
}

impl std::fmt::Display for Sku {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Product(id) => write!(f, "product/{id}"),
            Self::Variant(id) => write!(f, "variant/{id}"),
        }
    }
}

//! Per-SKU inventory bookkeeping.
//!
//! A SKU is either a product's own stock pool or a variant's; the pools
//! are independent. All mutation happens inside the caller's transaction,
//! so a failed order assembly never leaves a partial decrement behind.

use tracing::debug;

use tamarind_core::Sku;

use crate::db::FulfillmentTx;
use crate::error::DomainError;

/// Check/decrement/restore operations over a transaction.
pub struct InventoryLedger;

impl InventoryLedger {
    /// Current available quantity for a SKU.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` when the SKU does not exist or the
    /// store fails.
    pub async fn available(
        tx: &mut (dyn FulfillmentTx + '_),
        sku: Sku,
    ) -> Result<i32, DomainError> {
        Ok(tx.stock_of(sku).await?)
    }

    /// Reduce a SKU's stock by `requested`.
    ///
    /// The check and the decrement are atomic against concurrent
    /// transactions; the stored quantity can never go below zero.
    ///
    /// # Errors
    ///
    /// - `DomainError::OutOfStock` when nothing is available.
    /// - `DomainError::InsufficientStock` when `requested` exceeds the
    ///   available quantity.
    /// - `DomainError::Validation` when `requested` is not positive.
    pub async fn decrement(
        tx: &mut (dyn FulfillmentTx + '_),
        sku: Sku,
        requested: i32,
    ) -> Result<(), DomainError> {
        if requested <= 0 {
            return Err(DomainError::Validation(format!(
                "decrement quantity must be positive, got {requested}"
            )));
        }

        let available = tx.stock_of(sku).await?;
        if available <= 0 {
            return Err(DomainError::OutOfStock { sku });
        }
        if requested > available {
            return Err(DomainError::InsufficientStock {
                sku,
                requested,
                available,
            });
        }

        if !tx.decrement_stock(sku, requested).await? {
            // Lost a race with a concurrent decrement between the read above
            // and the compare-and-set.
            let available = tx.stock_of(sku).await?;
            debug!(%sku, requested, available, "stock decrement lost a race");
            if available <= 0 {
                return Err(DomainError::OutOfStock { sku });
            }
            return Err(DomainError::InsufficientStock {
                sku,
                requested,
                available,
            });
        }

        Ok(())
    }

    /// Add `quantity` back to a SKU's stock. Used by order cancellation.
    /// Not idempotent: restoring twice for the same cancellation is a
    /// caller bug.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` when the SKU does not exist or the
    /// store fails.
    pub async fn restore(
        tx: &mut (dyn FulfillmentTx + '_),
        sku: Sku,
        quantity: i32,
    ) -> Result<(), DomainError> {
        tx.restore_stock(sku, quantity).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::db::{FulfillmentStore, MemoryStore};

    use super::*;

    #[tokio::test]
    async fn decrement_reduces_stock() {
        let store = MemoryStore::new();
        let product = store.add_product("Shirt", Decimal::from(100), 5).await;
        let sku = Sku::Product(product.id);

        let mut tx = store.begin().await.unwrap();
        InventoryLedger::decrement(tx.as_mut(), sku, 2).await.unwrap();
        assert_eq!(InventoryLedger::available(tx.as_mut(), sku).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn zero_stock_is_out_of_stock() {
        let store = MemoryStore::new();
        let product = store.add_product("Shirt", Decimal::from(100), 0).await;
        let sku = Sku::Product(product.id);

        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::decrement(tx.as_mut(), sku, 1).await.unwrap_err();
        assert!(matches!(err, DomainError::OutOfStock { .. }));
    }

    #[tokio::test]
    async fn over_request_is_insufficient_with_quantities() {
        let store = MemoryStore::new();
        let product = store.add_product("Shirt", Decimal::from(100), 1).await;
        let sku = Sku::Product(product.id);

        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::decrement(tx.as_mut(), sku, 2).await.unwrap_err();
        match err {
            DomainError::InsufficientStock {
                requested,
                available,
                ..
            } => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn non_positive_request_is_rejected() {
        let store = MemoryStore::new();
        let product = store.add_product("Shirt", Decimal::from(100), 5).await;

        let mut tx = store.begin().await.unwrap();
        let err = InventoryLedger::decrement(tx.as_mut(), Sku::Product(product.id), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn restore_floors_at_zero_then_adds() {
        let store = MemoryStore::new();
        let product = store.add_product("Shirt", Decimal::from(100), 0).await;
        let sku = Sku::Product(product.id);

        let mut tx = store.begin().await.unwrap();
        InventoryLedger::restore(tx.as_mut(), sku, 4).await.unwrap();
        assert_eq!(InventoryLedger::available(tx.as_mut(), sku).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn variant_pool_is_independent_of_product_pool() {
        let store = MemoryStore::new();
        let product = store.add_product("Shirt", Decimal::from(100), 0).await;
        let variant = store.add_variant(product.id, Some("M"), None, None, 3).await;

        let mut tx = store.begin().await.unwrap();
        InventoryLedger::decrement(tx.as_mut(), Sku::Variant(variant.id), 1)
            .await
            .unwrap();
        assert_eq!(
            InventoryLedger::available(tx.as_mut(), Sku::Variant(variant.id))
                .await
                .unwrap(),
            2
        );

        tx.recompute_product_stock(product.id).await.unwrap();
        assert_eq!(
            InventoryLedger::available(tx.as_mut(), Sku::Product(product.id))
                .await
                .unwrap(),
            2
        );
    }
}

//! The order state machine.
//!
//! Fulfillment moves `Pending -> Processing -> Shipping -> Delivered`, with
//! `Cancelled` reachable from `Pending` and `Processing` only. Payment moves
//! `Pending -> Paid -> Refunded`. Every transition loads the order under a
//! row lock, checks its precondition against the locked state, and commits
//! before any notification goes out, so two racing transitions serialize and
//! the loser gets a precise `InvalidTransition`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use tamarind_core::{OrderId, OrderStatus, PaymentStatus, Sku};

use crate::db::{FulfillmentStore, FulfillmentTx};
use crate::error::DomainError;
use crate::models::order::{Order, OrderTransition};
use crate::services::inventory::InventoryLedger;
use crate::services::notifications::{NotificationDispatcher, OrderEvent, OrderEventKind};

/// Drives status and payment transitions.
pub struct OrderLifecycle<S> {
    store: Arc<S>,
    dispatcher: NotificationDispatcher,
}

impl<S: FulfillmentStore> OrderLifecycle<S> {
    #[must_use]
    pub fn new(store: Arc<S>, dispatcher: NotificationDispatcher) -> Self {
        Self { store, dispatcher }
    }

    /// `Pending -> Processing`.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidTransition`, or `Repository`.
    #[instrument(skip(self))]
    pub async fn confirm(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(tx.as_mut(), order_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(DomainError::InvalidTransition {
                current: order.status,
                requested: OrderTransition::Confirm,
            });
        }
        order.status = OrderStatus::Processing;
        tx.update_order(&order).await?;
        tx.commit().await?;

        info!(%order_id, order_number = %order.order_number, "order confirmed");
        self.dispatcher
            .dispatch(OrderEvent::for_order(&order, OrderEventKind::Confirmed, None));
        Ok(order)
    }

    /// `Processing -> Shipping`, stamping `shipped_at` and, when given, the
    /// tracking number.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidTransition`, or `Repository`.
    #[instrument(skip(self, tracking_number))]
    pub async fn start_shipping(
        &self,
        order_id: OrderId,
        tracking_number: Option<String>,
    ) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(tx.as_mut(), order_id).await?;

        if order.status != OrderStatus::Processing {
            return Err(DomainError::InvalidTransition {
                current: order.status,
                requested: OrderTransition::Ship,
            });
        }
        order.status = OrderStatus::Shipping;
        order.shipped_at = Some(Utc::now());
        if tracking_number.is_some() {
            order.tracking_number = tracking_number;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        info!(
            %order_id,
            order_number = %order.order_number,
            tracking = order.tracking_number.as_deref().unwrap_or("-"),
            "order shipped"
        );
        self.dispatcher.dispatch(OrderEvent::for_order(
            &order,
            OrderEventKind::Shipped,
            order.tracking_number.clone(),
        ));
        Ok(order)
    }

    /// `Shipping -> Delivered`, stamping `delivered_at`. A cash-on-delivery
    /// order with payment still pending is marked paid here: delivery is
    /// when the money changes hands.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidTransition`, or `Repository`.
    #[instrument(skip(self))]
    pub async fn mark_delivered(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(tx.as_mut(), order_id).await?;

        if order.status != OrderStatus::Shipping {
            return Err(DomainError::InvalidTransition {
                current: order.status,
                requested: OrderTransition::Deliver,
            });
        }
        order.status = OrderStatus::Delivered;
        order.delivered_at = Some(Utc::now());
        if order.is_cash_on_delivery() && order.payment_status == PaymentStatus::Pending {
            order.payment_status = PaymentStatus::Paid;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        info!(
            %order_id,
            order_number = %order.order_number,
            payment = %order.payment_status,
            "order delivered"
        );
        self.dispatcher
            .dispatch(OrderEvent::for_order(&order, OrderEventKind::Delivered, None));
        Ok(order)
    }

    /// Cancel a `Pending` or `Processing` order, restoring every line's
    /// stock in the same transaction. Shipped, delivered and already
    /// cancelled orders cannot be cancelled.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidTransition`, or `Repository`.
    #[instrument(skip(self, reason))]
    pub async fn cancel(
        &self,
        order_id: OrderId,
        reason: Option<String>,
    ) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(tx.as_mut(), order_id).await?;

        if !order.status.is_cancellable() {
            return Err(DomainError::InvalidTransition {
                current: order.status,
                requested: OrderTransition::Cancel,
            });
        }

        let lines = tx.order_lines(order_id).await?;
        let mut varianted_products = Vec::new();
        for line in &lines {
            let sku = Sku::for_line(line.product_id, line.variant_id);
            InventoryLedger::restore(tx.as_mut(), sku, line.quantity).await?;
            if matches!(sku, Sku::Variant(_)) && !varianted_products.contains(&line.product_id) {
                varianted_products.push(line.product_id);
            }
        }
        for product_id in varianted_products {
            tx.recompute_product_stock(product_id).await?;
        }

        order.status = OrderStatus::Cancelled;
        order.cancelled_at = Some(Utc::now());
        order.cancelled_reason = reason;
        tx.update_order(&order).await?;
        tx.commit().await?;

        info!(
            %order_id,
            order_number = %order.order_number,
            lines_restored = lines.len(),
            "order cancelled"
        );
        self.dispatcher.dispatch(OrderEvent::for_order(
            &order,
            OrderEventKind::Cancelled,
            order.cancelled_reason.clone(),
        ));
        Ok(order)
    }

    /// Record a successful payment. Paying a `Pending` order also confirms
    /// it into `Processing`. No customer notification; payment receipts are
    /// the payment provider's job.
    ///
    /// # Errors
    ///
    /// - `AlreadyPaid` when payment is already `Paid`.
    /// - `InvalidTransition` when the order is cancelled.
    /// - `OrderNotFound`, `Repository`.
    #[instrument(skip(self))]
    pub async fn mark_paid(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(tx.as_mut(), order_id).await?;

        if order.payment_status == PaymentStatus::Paid {
            return Err(DomainError::AlreadyPaid { order_id });
        }
        if order.status == OrderStatus::Cancelled {
            return Err(DomainError::InvalidTransition {
                current: order.status,
                requested: OrderTransition::Pay,
            });
        }
        order.payment_status = PaymentStatus::Paid;
        if order.status == OrderStatus::Pending {
            order.status = OrderStatus::Processing;
        }
        tx.update_order(&order).await?;
        tx.commit().await?;

        info!(%order_id, order_number = %order.order_number, "order paid");
        Ok(order)
    }

    /// Record a refund of a paid order. Refunding does not change the
    /// fulfillment status and does not restore stock; cancel separately if
    /// the goods are coming back.
    ///
    /// # Errors
    ///
    /// - `NotPaid` when payment is not `Paid`.
    /// - `OrderNotFound`, `Repository`.
    #[instrument(skip(self))]
    pub async fn mark_refunded(&self, order_id: OrderId) -> Result<Order, DomainError> {
        let mut tx = self.store.begin().await?;
        let mut order = load_locked(tx.as_mut(), order_id).await?;

        if order.payment_status != PaymentStatus::Paid {
            return Err(DomainError::NotPaid { order_id });
        }
        order.payment_status = PaymentStatus::Refunded;
        tx.update_order(&order).await?;
        tx.commit().await?;

        info!(%order_id, order_number = %order.order_number, "order refunded");
        Ok(order)
    }
}

async fn load_locked(
    tx: &mut (dyn FulfillmentTx + '_),
    order_id: OrderId,
) -> Result<Order, DomainError> {
    tx.order_for_update(order_id)
        .await?
        .ok_or(DomainError::OrderNotFound { order_id })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use tamarind_core::UserId;

    use crate::db::MemoryStore;
    use crate::models::order::NewOrder;

    use super::*;

    async fn seed_order(store: &MemoryStore, payment_method: &str) -> Order {
        use std::sync::atomic::{AtomicU32, Ordering};
        static NEXT: AtomicU32 = AtomicU32::new(1);

        let mut tx = store.begin().await.unwrap();
        let order = tx
            .insert_order(&NewOrder {
                order_number: format!("ORD20250614{:06}", NEXT.fetch_add(1, Ordering::Relaxed)),
                user_id: UserId::new(1),
                subtotal: Decimal::from(100_000),
                shipping_fee: Decimal::ZERO,
                tax_amount: Decimal::ZERO,
                discount_amount: Decimal::ZERO,
                total_amount: Decimal::from(100_000),
                shipping_name: "Dana".to_owned(),
                shipping_phone: "555".to_owned(),
                shipping_address: "1 Main St".to_owned(),
                payment_method: payment_method.to_owned(),
                customer_notes: None,
                discount_code_id: None,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        order
    }

    fn lifecycle(store: &Arc<MemoryStore>) -> OrderLifecycle<MemoryStore> {
        OrderLifecycle::new(Arc::clone(store), NotificationDispatcher::disabled())
    }

    #[tokio::test]
    async fn full_happy_path_runs_to_delivered() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "bank_transfer").await;
        let lifecycle = lifecycle(&store);

        let order_after = lifecycle.confirm(order.id).await.unwrap();
        assert_eq!(order_after.status, OrderStatus::Processing);

        let order_after = lifecycle
            .start_shipping(order.id, Some("TRACK-1".to_owned()))
            .await
            .unwrap();
        assert_eq!(order_after.status, OrderStatus::Shipping);
        assert_eq!(order_after.tracking_number.as_deref(), Some("TRACK-1"));
        assert!(order_after.shipped_at.is_some());

        let order_after = lifecycle.mark_delivered(order.id).await.unwrap();
        assert_eq!(order_after.status, OrderStatus::Delivered);
        assert!(order_after.delivered_at.is_some());
        // Not COD, so delivery does not touch payment.
        assert_eq!(order_after.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn confirm_twice_fails_with_current_state() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "COD").await;
        let lifecycle = lifecycle(&store);

        lifecycle.confirm(order.id).await.unwrap();
        let err = lifecycle.confirm(order.id).await.unwrap_err();
        assert_eq!(err.to_string(), "order is processing, cannot confirm");
    }

    #[tokio::test]
    async fn shipping_requires_processing() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "COD").await;
        let err = lifecycle(&store)
            .start_shipping(order.id, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                current: OrderStatus::Pending,
                requested: OrderTransition::Ship,
            }
        ));
    }

    #[tokio::test]
    async fn cod_delivery_marks_payment_paid() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "cod").await;
        let lifecycle = lifecycle(&store);

        lifecycle.confirm(order.id).await.unwrap();
        lifecycle.start_shipping(order.id, None).await.unwrap();
        let delivered = lifecycle.mark_delivered(order.id).await.unwrap();
        assert_eq!(delivered.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn cancel_is_rejected_after_shipping_and_after_cancel() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "COD").await;
        let lifecycle = lifecycle(&store);

        lifecycle
            .cancel(order.id, Some("changed my mind".to_owned()))
            .await
            .unwrap();
        let err = lifecycle.cancel(order.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                current: OrderStatus::Cancelled,
                requested: OrderTransition::Cancel,
            }
        ));

        let shipped = seed_order(&store, "COD").await;
        lifecycle.confirm(shipped.id).await.unwrap();
        lifecycle.start_shipping(shipped.id, None).await.unwrap();
        let err = lifecycle.cancel(shipped.id, None).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                current: OrderStatus::Shipping,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn paying_pending_order_confirms_it() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "bank_transfer").await;
        let lifecycle = lifecycle(&store);

        let paid = lifecycle.mark_paid(order.id).await.unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert_eq!(paid.status, OrderStatus::Processing);

        let err = lifecycle.mark_paid(order.id).await.unwrap_err();
        assert!(matches!(err, DomainError::AlreadyPaid { .. }));
    }

    #[tokio::test]
    async fn cancelled_order_cannot_be_paid() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "bank_transfer").await;
        let lifecycle = lifecycle(&store);

        lifecycle.cancel(order.id, None).await.unwrap();
        let err = lifecycle.mark_paid(order.id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::InvalidTransition {
                current: OrderStatus::Cancelled,
                requested: OrderTransition::Pay,
            }
        ));
    }

    #[tokio::test]
    async fn refund_requires_paid() {
        let store = Arc::new(MemoryStore::new());
        let order = seed_order(&store, "bank_transfer").await;
        let lifecycle = lifecycle(&store);

        let err = lifecycle.mark_refunded(order.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotPaid { .. }));

        lifecycle.mark_paid(order.id).await.unwrap();
        let refunded = lifecycle.mark_refunded(order.id).await.unwrap();
        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let err = lifecycle(&store)
            .confirm(OrderId::new(999))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::OrderNotFound { .. }));
    }
}

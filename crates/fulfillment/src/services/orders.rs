//! Order assembly: cart (or explicit lines) to immutable order.
//!
//! The whole checkout runs in one transaction; any failure rolls back every
//! stock decrement, the discount redemption, and the order rows together.
//! The cart survives a failed checkout untouched.

use std::sync::Arc;

use rand::Rng;
use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use tamarind_core::{DiscountCodeId, ProductId, Sku, UserId};

use crate::db::{FulfillmentStore, FulfillmentTx, RepositoryError};
use crate::error::DomainError;
use crate::models::order::{CreateOrderRequest, NewOrder, NewOrderLine, Order, RequestedLine};
use crate::services::discounts::{check_code, compute_discount};
use crate::services::inventory::InventoryLedger;
use crate::services::notifications::{NotificationDispatcher, OrderEvent, OrderEventKind};

/// Builds orders out of carts and requests.
pub struct OrderService<S> {
    store: Arc<S>,
    dispatcher: NotificationDispatcher,
    order_number_max_attempts: u32,
}

impl<S: FulfillmentStore> OrderService<S> {
    #[must_use]
    pub fn new(store: Arc<S>, dispatcher: NotificationDispatcher) -> Self {
        Self {
            store,
            dispatcher,
            order_number_max_attempts: 5,
        }
    }

    /// Override the retry budget for order-number collisions.
    #[must_use]
    pub const fn with_order_number_max_attempts(mut self, attempts: u32) -> Self {
        self.order_number_max_attempts = attempts;
        self
    }

    /// Assemble an order for `user_id`.
    ///
    /// Lines come from `request.lines` when present and non-empty, otherwise
    /// from the user's cart; the cart is deleted only when it was the source
    /// and the order committed. Prices are re-read from the catalog at this
    /// moment, never trusted from the cart.
    ///
    /// # Errors
    ///
    /// - `DomainError::EmptyCart` when there is nothing to order.
    /// - `DomainError::ProductUnavailable` / `VariantInvalid` for dead or
    ///   mismatched catalog references.
    /// - `DomainError::OutOfStock` / `InsufficientStock` when a SKU cannot
    ///   cover its line.
    /// - `DomainError::Validation` for non-positive quantities or blank
    ///   shipping/payment fields.
    /// - `DomainError::Repository` when the store fails.
    #[instrument(skip(self, request), fields(user_id = %user_id))]
    pub async fn create_order(
        &self,
        user_id: UserId,
        request: CreateOrderRequest,
    ) -> Result<Order, DomainError> {
        validate_shipping(&request)?;

        let mut tx = self.store.begin().await?;

        let (requested, from_cart) = match &request.lines {
            Some(lines) if !lines.is_empty() => (lines.clone(), None),
            _ => {
                let cart = tx
                    .cart_for_user(user_id)
                    .await?
                    .ok_or(DomainError::EmptyCart)?;
                if cart.is_empty() {
                    return Err(DomainError::EmptyCart);
                }
                let lines = cart
                    .items
                    .iter()
                    .map(|item| RequestedLine {
                        product_id: item.product_id,
                        variant_id: item.variant_id,
                        quantity: item.quantity,
                    })
                    .collect();
                (lines, Some(cart.id))
            }
        };

        let priced = price_lines(tx.as_mut(), merge_lines(requested)).await?;
        let subtotal: Decimal = priced.iter().map(|line| line.new_line.line_total).sum();

        let (discount_amount, discount_code_id) =
            apply_discount(tx.as_mut(), user_id, &request, subtotal).await?;

        let total_amount = match request.final_total {
            Some(total) if total > Decimal::ZERO => total,
            _ => subtotal + request.shipping_fee + request.tax_amount - discount_amount,
        };

        let mut new_order = NewOrder {
            order_number: generate_order_number(),
            user_id,
            subtotal,
            shipping_fee: request.shipping_fee,
            tax_amount: request.tax_amount,
            discount_amount,
            total_amount,
            shipping_name: request.shipping_name,
            shipping_phone: request.shipping_phone,
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            customer_notes: request.customer_notes,
            discount_code_id,
        };

        let mut attempt = 1;
        let order = loop {
            match tx.insert_order(&new_order).await {
                Ok(order) => break order,
                Err(RepositoryError::Conflict(_)) if attempt < self.order_number_max_attempts => {
                    attempt += 1;
                    debug!(
                        order_number = %new_order.order_number,
                        attempt,
                        "order number collided, regenerating"
                    );
                    new_order.order_number = generate_order_number();
                }
                Err(e) => return Err(e.into()),
            }
        };

        let mut varianted_products: Vec<ProductId> = Vec::new();
        for line in &priced {
            tx.insert_order_line(order.id, &line.new_line).await?;
            InventoryLedger::decrement(tx.as_mut(), line.sku, line.new_line.quantity).await?;
            if matches!(line.sku, Sku::Variant(_))
                && !varianted_products.contains(&line.new_line.product_id)
            {
                varianted_products.push(line.new_line.product_id);
            }
        }
        for product_id in varianted_products {
            tx.recompute_product_stock(product_id).await?;
        }

        if let Some(cart_id) = from_cart {
            tx.delete_cart(cart_id).await?;
        }

        tx.commit().await?;

        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            %subtotal,
            total = %order.total_amount,
            lines = priced.len(),
            "order created"
        );
        self.dispatcher
            .dispatch(OrderEvent::for_order(&order, OrderEventKind::Created, None));

        Ok(order)
    }
}

/// Validate, price and snapshot each merged line against the live catalog,
/// including an availability pre-check.
async fn price_lines(
    tx: &mut (dyn FulfillmentTx + '_),
    requested: Vec<RequestedLine>,
) -> Result<Vec<PricedLine>, DomainError> {
    let mut priced = Vec::with_capacity(requested.len());
    for line in requested {
        if line.quantity <= 0 {
            return Err(DomainError::Validation(format!(
                "line quantity must be positive, got {}",
                line.quantity
            )));
        }

        let product = tx
            .product(line.product_id)
            .await?
            .filter(|p| p.is_orderable())
            .ok_or(DomainError::ProductUnavailable {
                product_id: line.product_id,
            })?;

        let variant = match line.variant_id {
            Some(variant_id) => {
                let variant = tx
                    .variant(variant_id)
                    .await?
                    .filter(|v| v.is_orderable() && v.product_id == line.product_id)
                    .ok_or(DomainError::VariantInvalid { variant_id })?;
                Some(variant)
            }
            None => None,
        };

        let sku = Sku::for_line(line.product_id, line.variant_id);
        let available = InventoryLedger::available(tx, sku).await?;
        if available <= 0 {
            return Err(DomainError::OutOfStock { sku });
        }
        if line.quantity > available {
            return Err(DomainError::InsufficientStock {
                sku,
                requested: line.quantity,
                available,
            });
        }

        let unit_price = variant
            .as_ref()
            .map_or(product.price, |v| v.effective_price(product.price));
        let line_total = unit_price * Decimal::from(line.quantity);

        priced.push(PricedLine {
            sku,
            new_line: NewOrderLine {
                product_id: line.product_id,
                variant_id: line.variant_id,
                product_name: product.name.clone(),
                variant_size: variant.as_ref().and_then(|v| v.size.clone()),
                variant_color: variant.as_ref().and_then(|v| v.color.clone()),
                quantity: line.quantity,
                unit_price,
                line_total,
            },
        });
    }
    Ok(priced)
}

/// Re-validate and redeem the requested discount inside the order's
/// transaction. An invalid or exhausted code is not fatal; the order
/// proceeds without a discount.
async fn apply_discount(
    tx: &mut (dyn FulfillmentTx + '_),
    user_id: UserId,
    request: &CreateOrderRequest,
    subtotal: Decimal,
) -> Result<(Decimal, Option<DiscountCodeId>), DomainError> {
    let Some(code_id) = request.discount_code_id else {
        return Ok((Decimal::ZERO, None));
    };
    let Some(code) = tx.discount_by_id(code_id).await? else {
        warn!(%code_id, "requested discount code does not exist, ignoring");
        return Ok((Decimal::ZERO, None));
    };

    let user_redemptions = tx.user_redemptions(code_id, user_id).await?;
    if let Err(reason) = check_code(&code, subtotal, chrono::Utc::now(), user_redemptions) {
        debug!(code = %code.code, ?reason, "discount rejected at checkout, ignoring");
        return Ok((Decimal::ZERO, None));
    }
    if !tx.redeem_discount(code_id, user_id).await? {
        debug!(code = %code.code, "discount cap exhausted at redemption, ignoring");
        return Ok((Decimal::ZERO, None));
    }

    Ok((compute_discount(&code, subtotal), Some(code_id)))
}

struct PricedLine {
    sku: Sku,
    new_line: NewOrderLine,
}

fn validate_shipping(request: &CreateOrderRequest) -> Result<(), DomainError> {
    for (field, value) in [
        ("shipping_name", &request.shipping_name),
        ("shipping_phone", &request.shipping_phone),
        ("shipping_address", &request.shipping_address),
        ("payment_method", &request.payment_method),
    ] {
        if value.trim().is_empty() {
            return Err(DomainError::Validation(format!("{field} is required")));
        }
    }
    Ok(())
}

/// Collapse duplicate (product, variant) keys into one line, summing
/// quantities and keeping first-seen order.
fn merge_lines(requested: Vec<RequestedLine>) -> Vec<RequestedLine> {
    let mut merged: Vec<RequestedLine> = Vec::with_capacity(requested.len());
    for line in requested {
        match merged
            .iter_mut()
            .find(|m| m.product_id == line.product_id && m.variant_id == line.variant_id)
        {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line),
        }
    }
    merged
}

/// `ORD` + `yyyyMMdd` + 6 random digits. Uniqueness is enforced by the
/// store; collisions retry with a fresh number.
fn generate_order_number() -> String {
    format!(
        "ORD{}{:06}",
        chrono::Utc::now().format("%Y%m%d"),
        rand::rng().random_range(0..1_000_000)
    )
}

#[cfg(test)]
mod tests {
    use tamarind_core::{ProductId, VariantId};

    use crate::db::MemoryStore;

    use super::*;

    #[test]
    fn merge_sums_quantities_per_key_preserving_order() {
        let p1 = ProductId::new(1);
        let p2 = ProductId::new(2);
        let v = VariantId::new(7);
        let merged = merge_lines(vec![
            RequestedLine {
                product_id: p1,
                variant_id: None,
                quantity: 1,
            },
            RequestedLine {
                product_id: p2,
                variant_id: Some(v),
                quantity: 2,
            },
            RequestedLine {
                product_id: p1,
                variant_id: None,
                quantity: 3,
            },
            RequestedLine {
                product_id: p1,
                variant_id: Some(v),
                quantity: 1,
            },
        ]);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].quantity, 4);
        assert_eq!(merged[0].product_id, p1);
        assert_eq!(merged[1].quantity, 2);
        assert_eq!(merged[2].variant_id, Some(v));
    }

    #[test]
    fn order_number_shape() {
        let number = generate_order_number();
        assert_eq!(number.len(), 3 + 8 + 6);
        assert!(number.starts_with("ORD"));
        assert!(number[3..].chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn checkout_from_cart_prices_and_empties_it() {
        let store = Arc::new(MemoryStore::new());
        let product = store
            .add_product("Shirt", Decimal::from(100_000), 5)
            .await;
        let user = UserId::new(1);
        store.add_cart_item(user, product.id, None, 2).await;

        let service = OrderService::new(Arc::clone(&store), NotificationDispatcher::disabled());
        let order = service
            .create_order(
                user,
                CreateOrderRequest {
                    shipping_name: "Dana".to_owned(),
                    shipping_phone: "555".to_owned(),
                    shipping_address: "1 Main St".to_owned(),
                    payment_method: "COD".to_owned(),
                    ..CreateOrderRequest::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(order.subtotal, Decimal::from(200_000));
        assert_eq!(order.total_amount, Decimal::from(200_000));
        assert_eq!(store.stock(Sku::Product(product.id)).await, Some(3));
        assert!(!store.has_cart(user).await);
    }

    #[tokio::test]
    async fn empty_request_with_no_cart_is_empty_cart() {
        let store = Arc::new(MemoryStore::new());
        let service = OrderService::new(Arc::clone(&store), NotificationDispatcher::disabled());
        let err = service
            .create_order(
                UserId::new(1),
                CreateOrderRequest {
                    shipping_name: "Dana".to_owned(),
                    shipping_phone: "555".to_owned(),
                    shipping_address: "1 Main St".to_owned(),
                    payment_method: "COD".to_owned(),
                    ..CreateOrderRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::EmptyCart));
    }

    #[tokio::test]
    async fn blank_shipping_field_is_rejected_before_any_work() {
        let store = Arc::new(MemoryStore::new());
        let service = OrderService::new(Arc::clone(&store), NotificationDispatcher::disabled());
        let err = service
            .create_order(
                UserId::new(1),
                CreateOrderRequest {
                    shipping_name: "  ".to_owned(),
                    shipping_phone: "555".to_owned(),
                    shipping_address: "1 Main St".to_owned(),
                    payment_method: "COD".to_owned(),
                    ..CreateOrderRequest::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}

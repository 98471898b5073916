//! Revenue and count aggregates over a mixed pile of orders.

use chrono::{Datelike, Duration, Utc};
use rust_decimal::Decimal;

use tamarind_core::{OrderStatus, UserId};
use tamarind_fulfillment::models::order::{CreateOrderRequest, Order};
use tamarind_integration_tests::TestContext;

async fn checkout(ctx: &TestContext, user: UserId, amount: i64) -> Order {
    let product = ctx
        .store
        .add_product("Coat", Decimal::from(amount), 10)
        .await;
    ctx.store.add_cart_item(user, product.id, None, 1).await;
    ctx.orders
        .create_order(
            user,
            CreateOrderRequest {
                shipping_name: "Dana Reyes".to_owned(),
                shipping_phone: "555-0101".to_owned(),
                shipping_address: "1 Main St".to_owned(),
                payment_method: "bank_transfer".to_owned(),
                ..CreateOrderRequest::default()
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn revenue_counts_only_paid_live_orders() {
    let ctx = TestContext::new();
    let user = UserId::new(1);

    let paid = checkout(&ctx, user, 100_000).await;
    ctx.lifecycle.mark_paid(paid.id).await.unwrap();

    let _unpaid = checkout(&ctx, user, 50_000).await;

    let cancelled = checkout(&ctx, user, 70_000).await;
    ctx.lifecycle.cancel(cancelled.id, None).await.unwrap();

    let from = Utc::now() - Duration::hours(1);
    let to = Utc::now() + Duration::hours(1);

    assert_eq!(
        ctx.reports.revenue_between(from, to).await.unwrap(),
        Decimal::from(100_000)
    );
    // Counts exclude the cancelled order but include the unpaid one.
    assert_eq!(ctx.reports.order_count_between(from, to).await.unwrap(), 2);
}

#[tokio::test]
async fn window_bounds_are_half_open() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    let order = checkout(&ctx, user, 100_000).await;
    ctx.lifecycle.mark_paid(order.id).await.unwrap();

    let before = (
        order.created_at - Duration::hours(2),
        order.created_at - Duration::hours(1),
    );
    assert_eq!(
        ctx.reports
            .revenue_between(before.0, before.1)
            .await
            .unwrap(),
        Decimal::ZERO
    );
    assert_eq!(
        ctx.reports
            .order_count_between(before.0, before.1)
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn monthly_rollup_buckets_the_current_month() {
    let ctx = TestContext::new();
    let user = UserId::new(1);

    let a = checkout(&ctx, user, 100_000).await;
    ctx.lifecycle.mark_paid(a.id).await.unwrap();
    let _b = checkout(&ctx, user, 40_000).await;

    let now = Utc::now();
    let months = ctx.reports.revenue_by_month(now.year()).await.unwrap();
    let current = months
        .iter()
        .find(|m| m.month == now.month())
        .expect("current month present");
    assert_eq!(current.revenue, Decimal::from(100_000));
    assert_eq!(current.orders, 2);

    assert!(
        ctx.reports
            .revenue_by_month(now.year() - 1)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn status_counts_cover_every_status_present() {
    let ctx = TestContext::new();
    let user = UserId::new(1);

    let _pending = checkout(&ctx, user, 10_000).await;
    let processing = checkout(&ctx, user, 10_000).await;
    ctx.lifecycle.confirm(processing.id).await.unwrap();
    let cancelled = checkout(&ctx, user, 10_000).await;
    ctx.lifecycle.cancel(cancelled.id, None).await.unwrap();

    let counts = ctx.reports.order_counts_by_status().await.unwrap();
    let count_of = |status: OrderStatus| {
        counts
            .iter()
            .find(|c| c.status == status)
            .map_or(0, |c| c.count)
    };
    assert_eq!(count_of(OrderStatus::Pending), 1);
    assert_eq!(count_of(OrderStatus::Processing), 1);
    assert_eq!(count_of(OrderStatus::Cancelled), 1);
    assert_eq!(count_of(OrderStatus::Shipping), 0);
}

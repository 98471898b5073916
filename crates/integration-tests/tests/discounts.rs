//! Discount redemption caps enforced across multiple checkouts.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use tamarind_core::{DiscountType, UserId};
use tamarind_fulfillment::models::discount::{DiscountCode, NewDiscountCode};
use tamarind_fulfillment::models::order::CreateOrderRequest;
use tamarind_integration_tests::TestContext;

async fn seed_code(
    ctx: &TestContext,
    usage_limit: Option<i32>,
    per_user_limit: Option<i32>,
) -> DiscountCode {
    let now = Utc::now();
    ctx.store
        .add_discount(NewDiscountCode {
            code: "WELCOME".to_owned(),
            discount_type: DiscountType::FixedAmount,
            value: Decimal::from(10_000),
            min_order_amount: None,
            usage_limit,
            per_user_limit,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
        })
        .await
}

async fn checkout_with_code(ctx: &TestContext, user: UserId, code: &DiscountCode) -> Decimal {
    let product = ctx
        .store
        .add_product("Coat", Decimal::from(100_000), 100)
        .await;
    ctx.store.add_cart_item(user, product.id, None, 1).await;
    ctx.orders
        .create_order(
            user,
            CreateOrderRequest {
                shipping_name: "Dana Reyes".to_owned(),
                shipping_phone: "555-0101".to_owned(),
                shipping_address: "1 Main St".to_owned(),
                payment_method: "COD".to_owned(),
                discount_code_id: Some(code.id),
                ..CreateOrderRequest::default()
            },
        )
        .await
        .unwrap()
        .discount_amount
}

#[tokio::test]
async fn per_user_cap_blocks_the_second_redemption() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    let code = seed_code(&ctx, None, Some(1)).await;

    assert_eq!(
        checkout_with_code(&ctx, user, &code).await,
        Decimal::from(10_000)
    );
    // Same user again: the order goes through, the discount does not.
    assert_eq!(checkout_with_code(&ctx, user, &code).await, Decimal::ZERO);
    assert_eq!(ctx.store.discount_used_count(code.id).await, Some(1));

    // A different user still qualifies.
    assert_eq!(
        checkout_with_code(&ctx, UserId::new(2), &code).await,
        Decimal::from(10_000)
    );
}

#[tokio::test]
async fn global_cap_blocks_everyone_once_exhausted() {
    let ctx = TestContext::new();
    let code = seed_code(&ctx, Some(1), None).await;

    assert_eq!(
        checkout_with_code(&ctx, UserId::new(1), &code).await,
        Decimal::from(10_000)
    );
    assert_eq!(
        checkout_with_code(&ctx, UserId::new(2), &code).await,
        Decimal::ZERO
    );
    assert_eq!(ctx.store.discount_used_count(code.id).await, Some(1));
}

#[tokio::test]
async fn validate_reflects_caps_without_consuming_them() {
    let ctx = TestContext::new();
    let user = UserId::new(1);
    let code = seed_code(&ctx, Some(5), Some(1)).await;

    for _ in 0..3 {
        let found = ctx
            .discounts
            .validate("WELCOME", Decimal::from(50_000), Some(user))
            .await
            .unwrap();
        assert!(found.is_some());
    }
    assert_eq!(ctx.store.discount_used_count(code.id).await, Some(0));

    checkout_with_code(&ctx, user, &code).await;
    let found = ctx
        .discounts
        .validate("WELCOME", Decimal::from(50_000), Some(user))
        .await
        .unwrap();
    assert!(found.is_none());
}

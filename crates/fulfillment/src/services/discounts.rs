//! Discount-code validation and computation.
//!
//! Validation is a dry run usable for live checkout preview; redemption
//! (counter increments) happens only inside order assembly, atomically in
//! the order's transaction.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use tamarind_core::{DiscountType, UserId};

use crate::db::FulfillmentStore;
use crate::error::DomainError;
use crate::models::discount::DiscountCode;

/// Why a code did not validate. Internal detail for logging and tests;
/// callers see `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountRejection {
    /// Soft-deleted.
    Inactive,
    NotYetActive,
    Expired,
    UsageLimitReached,
    PerUserLimitReached,
    BelowMinimum { minimum: Decimal },
}

/// Check a code against its activation window, caps, and minimum order
/// amount. `user_redemptions` is how many times the ordering user has
/// already redeemed it (pass 0 when there is no user context).
pub fn check_code(
    code: &DiscountCode,
    subtotal: Decimal,
    now: DateTime<Utc>,
    user_redemptions: i32,
) -> Result<(), DiscountRejection> {
    if !code.lifecycle.is_active() {
        return Err(DiscountRejection::Inactive);
    }
    if now < code.starts_at {
        return Err(DiscountRejection::NotYetActive);
    }
    if now > code.ends_at {
        return Err(DiscountRejection::Expired);
    }
    if code.usage_limit.is_some_and(|limit| code.used_count >= limit) {
        return Err(DiscountRejection::UsageLimitReached);
    }
    if code
        .per_user_limit
        .is_some_and(|limit| user_redemptions >= limit)
    {
        return Err(DiscountRejection::PerUserLimitReached);
    }
    if let Some(minimum) = code.min_order_amount
        && subtotal < minimum
    {
        return Err(DiscountRejection::BelowMinimum { minimum });
    }
    Ok(())
}

/// The discount a valid code yields for a subtotal. Never negative; a
/// fixed amount never exceeds the subtotal.
#[must_use]
pub fn compute_discount(code: &DiscountCode, subtotal: Decimal) -> Decimal {
    let amount = match code.discount_type {
        DiscountType::Percentage => subtotal * code.value / Decimal::from(100),
        DiscountType::FixedAmount => code.value.min(subtotal),
    };
    amount.max(Decimal::ZERO)
}

/// Validation front-end over a store.
pub struct DiscountEngine<S> {
    store: Arc<S>,
}

impl<S: FulfillmentStore> DiscountEngine<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Look up `code` case-insensitively and check it against `subtotal`
    /// and, when given, the user's redemption history. Returns the code on
    /// success and `None` on any rejection; never an error other than
    /// storage failure.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` when the store fails.
    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
        user_id: Option<UserId>,
    ) -> Result<Option<DiscountCode>, DomainError> {
        let Some(found) = self.store.discount_by_code(code).await? else {
            debug!(code, "discount code not found");
            return Ok(None);
        };

        let user_redemptions = match (user_id, found.per_user_limit) {
            (Some(user), Some(_)) => self.store.user_redemptions(found.id, user).await?,
            _ => 0,
        };

        match check_code(&found, subtotal, Utc::now(), user_redemptions) {
            Ok(()) => Ok(Some(found)),
            Err(reason) => {
                debug!(code, ?reason, %subtotal, "discount code rejected");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use tamarind_core::{DiscountCodeId, Lifecycle};

    use crate::db::MemoryStore;
    use crate::models::discount::NewDiscountCode;

    use super::*;

    fn save10() -> DiscountCode {
        let now = Utc::now();
        DiscountCode {
            id: DiscountCodeId::new(1),
            code: "SAVE10".to_owned(),
            discount_type: DiscountType::Percentage,
            value: Decimal::from(10),
            min_order_amount: Some(Decimal::from(100_000)),
            usage_limit: None,
            per_user_limit: None,
            used_count: 0,
            lifecycle: Lifecycle::Active,
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(1),
        }
    }

    #[test]
    fn save10_on_200k_gives_20k() {
        let code = save10();
        assert!(check_code(&code, Decimal::from(200_000), Utc::now(), 0).is_ok());
        assert_eq!(
            compute_discount(&code, Decimal::from(200_000)),
            Decimal::from(20_000)
        );
    }

    #[test]
    fn save10_below_minimum_is_rejected() {
        let code = save10();
        assert_eq!(
            check_code(&code, Decimal::from(50_000), Utc::now(), 0),
            Err(DiscountRejection::BelowMinimum {
                minimum: Decimal::from(100_000)
            })
        );
    }

    #[test]
    fn fixed_amount_never_exceeds_subtotal() {
        let mut code = save10();
        code.discount_type = DiscountType::FixedAmount;
        code.value = Decimal::from(80_000);
        assert_eq!(
            compute_discount(&code, Decimal::from(50_000)),
            Decimal::from(50_000)
        );
        assert_eq!(
            compute_discount(&code, Decimal::from(200_000)),
            Decimal::from(80_000)
        );
    }

    #[test]
    fn negative_value_yields_zero_discount() {
        let mut code = save10();
        code.discount_type = DiscountType::FixedAmount;
        code.value = Decimal::from(-5);
        assert_eq!(compute_discount(&code, Decimal::from(100)), Decimal::ZERO);
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let code = save10();
        assert!(check_code(&code, Decimal::from(200_000), code.starts_at, 0).is_ok());
        assert!(check_code(&code, Decimal::from(200_000), code.ends_at, 0).is_ok());
        assert_eq!(
            check_code(
                &code,
                Decimal::from(200_000),
                code.starts_at - Duration::seconds(1),
                0
            ),
            Err(DiscountRejection::NotYetActive)
        );
        assert_eq!(
            check_code(
                &code,
                Decimal::from(200_000),
                code.ends_at + Duration::seconds(1),
                0
            ),
            Err(DiscountRejection::Expired)
        );
    }

    #[test]
    fn exhausted_global_cap_is_rejected() {
        let mut code = save10();
        code.usage_limit = Some(3);
        code.used_count = 3;
        assert_eq!(
            check_code(&code, Decimal::from(200_000), Utc::now(), 0),
            Err(DiscountRejection::UsageLimitReached)
        );
    }

    #[test]
    fn exhausted_per_user_cap_is_rejected() {
        let mut code = save10();
        code.per_user_limit = Some(1);
        assert_eq!(
            check_code(&code, Decimal::from(200_000), Utc::now(), 1),
            Err(DiscountRejection::PerUserLimitReached)
        );
        assert!(check_code(&code, Decimal::from(200_000), Utc::now(), 0).is_ok());
    }

    #[test]
    fn deleted_code_is_rejected() {
        let mut code = save10();
        code.lifecycle = Lifecycle::Deleted;
        assert_eq!(
            check_code(&code, Decimal::from(200_000), Utc::now(), 0),
            Err(DiscountRejection::Inactive)
        );
    }

    #[tokio::test]
    async fn validate_matches_case_insensitively() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        store
            .add_discount(NewDiscountCode {
                code: "SAVE10".to_owned(),
                discount_type: DiscountType::Percentage,
                value: Decimal::from(10),
                min_order_amount: None,
                usage_limit: None,
                per_user_limit: None,
                starts_at: now - Duration::days(1),
                ends_at: now + Duration::days(1),
            })
            .await;

        let engine = DiscountEngine::new(store);
        let found = engine
            .validate("save10", Decimal::from(200_000), None)
            .await
            .unwrap();
        assert_eq!(found.map(|c| c.code), Some("SAVE10".to_owned()));
    }

    #[tokio::test]
    async fn validate_returns_none_for_unknown_code() {
        let engine = DiscountEngine::new(Arc::new(MemoryStore::new()));
        let found = engine
            .validate("NOPE", Decimal::from(200_000), None)
            .await
            .unwrap();
        assert!(found.is_none());
    }
}

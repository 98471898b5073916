//! Read-only reporting over committed orders.
//!
//! Revenue counts an order when its payment is `Paid` and it is not
//! cancelled; order counts exclude cancelled orders. The heavy lifting is
//! SQL aggregation in the store; this layer only names the queries.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::db::FulfillmentStore;
use crate::error::DomainError;
use crate::models::report::{MonthlyRevenue, StatusCount};

/// Aggregate queries for dashboards.
pub struct ReportService<S> {
    store: Arc<S>,
}

impl<S: FulfillmentStore> ReportService<S> {
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Total paid, non-cancelled revenue over `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` when the store fails.
    pub async fn revenue_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, DomainError> {
        Ok(self.store.revenue_between(from, to).await?)
    }

    /// Number of non-cancelled orders placed over `[from, to)`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` when the store fails.
    pub async fn order_count_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, DomainError> {
        Ok(self.store.order_count_between(from, to).await?)
    }

    /// Revenue and order count per calendar month of `year`. Months with no
    /// qualifying orders are absent.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` when the store fails.
    pub async fn revenue_by_month(&self, year: i32) -> Result<Vec<MonthlyRevenue>, DomainError> {
        Ok(self.store.revenue_by_month(year).await?)
    }

    /// How many orders sit in each fulfillment status, cancelled included.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Repository` when the store fails.
    pub async fn order_counts_by_status(&self) -> Result<Vec<StatusCount>, DomainError> {
        Ok(self.store.order_counts_by_status().await?)
    }
}

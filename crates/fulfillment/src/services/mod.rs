//! Domain services for order fulfillment.

pub mod discounts;
pub mod inventory;
pub mod lifecycle;
pub mod notifications;
pub mod orders;
pub mod reports;

pub use discounts::DiscountEngine;
pub use inventory::InventoryLedger;
pub use lifecycle::OrderLifecycle;
pub use notifications::{
    NotificationDispatcher, NotificationSink, NotifierWorker, OrderEvent, OrderEventKind,
    TracingSink,
};
pub use orders::OrderService;
pub use reports::ReportService;

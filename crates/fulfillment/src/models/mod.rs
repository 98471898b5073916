//! Domain models for order fulfillment.

pub mod cart;
pub mod catalog;
pub mod discount;
pub mod order;
pub mod report;

pub use cart::{Cart, CartItem};
pub use catalog::{Product, Variant};
pub use discount::{DiscountCode, NewDiscountCode};
pub use order::{
    CreateOrderRequest, NewOrder, NewOrderLine, Order, OrderLine, OrderTransition, RequestedLine,
};
pub use report::{MonthlyRevenue, StatusCount};

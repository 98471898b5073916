//! Tamarind order fulfillment library.
//!
//! This crate owns the transformation of a mutable shopping cart into an
//! immutable order, the inventory bookkeeping that must stay consistent
//! across that transformation and later cancellations, discount-code
//! validation and redemption, and the order status state machine with its
//! side effects.
//!
//! Catalog CRUD, authentication, HTML rendering and notification transport
//! live elsewhere; this crate consumes them through the [`db`] store seam
//! and the [`services::notifications`] dispatch channel.
//!
//! # Modules
//!
//! - [`config`] - Environment-based configuration
//! - [`error`] - Domain error types
//! - [`models`] - Carts, orders, catalog snapshots, discount codes
//! - [`db`] - The `FulfillmentStore` transaction seam (Postgres + in-memory)
//! - [`services`] - Order assembly, lifecycle, inventory, discounts, reports

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use error::DomainError;

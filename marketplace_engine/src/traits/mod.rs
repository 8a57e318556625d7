//! # Fulfillment backend contracts
//!
//! This module defines the behaviour that a storage backend must expose in order to be used by the marketplace
//! engine. The engine API ([`crate::mkt_api`]) is written purely in terms of these traits; SQLite is the production backend
//! and an in-memory backend is provided for tests.
//!
//! ## Traits
//! * [`FulfillmentDatabase`] is the highest-level contract. Every method on it is a single atomic unit of work that
//!   touches more than one table (stock, orders, payments, the inventory log).
//! * [`InventoryManagement`] manages products and the append-only inventory log.
//! * [`CartManagement`] manages customer carts.
//! * [`DirectoryManagement`] manages the customer and seller directory.
//! * [`OrderManagement`] provides read-only queries over orders and payments.
//! * [`LoyaltyManagement`] manages the loyalty points ledger.
mod cart_management;
mod data_objects;
mod directory_management;
mod fulfillment_database;
mod inventory_management;
mod loyalty_management;
mod order_management;

pub use cart_management::CartManagement;
pub use data_objects::{CancelledOrder, CheckoutResult, DeclinedPayment, LoyaltyCredit, SettledPayment};
pub use directory_management::DirectoryManagement;
pub use fulfillment_database::{FulfillmentDatabase, FulfillmentError};
pub use inventory_management::InventoryManagement;
pub use loyalty_management::LoyaltyManagement;
pub use order_management::OrderManagement;

//! # Marketplace engine public API
//!
//! The `mkt_api` module exposes the programmatic API for the fulfillment pipeline.
//! The API is modular, so that clients of the API can pick and choose the functionality they want.
//!
//! * [`order_flow_api`] is the primary API. It handles checkout, payment settlement and retries, loyalty accrual,
//!   order status changes and the expiry of unpaid orders.
//! * [`inventory_api`] lets sellers list products, correct stock and audit the inventory log.
//! * [`cart_api`] manages customers' persisted carts.
//! * [`loyalty_api`] provides balances, history and redemptions, and defines the [`loyalty_api::AccrualPolicy`].
//! * [`receipt_api`] builds read-only receipts.
//! * [`directory_api`] mirrors customer and seller identities.
//!
//! The other submodules in this module are support and utility functions and types.
//!
//! # API usage
//!
//! The pattern for using all the APIs is the same. An API instance is created by supplying a database backend that
//! implements the specific backend traits required by the API.
//!
//! ```rust,ignore
//! use marketplace_engine::{events::EventProducers, settlement::SimulatedGateway, OrderFlowApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/marketplace.db", 25).await?;
//! let api = OrderFlowApi::new(db, SimulatedGateway::default(), EventProducers::default());
//! let result = api.checkout(&Actor::customer("alice"), CheckoutRequest::from_cart()).await?;
//! ```

pub mod aggregator;
pub mod availability;
pub mod cart_api;
pub mod directory_api;
pub mod inventory_api;
pub mod loyalty_api;
pub mod order_flow_api;
pub mod order_objects;
pub mod receipt_api;

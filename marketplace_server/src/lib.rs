//! # Marketplace server
//! This crate hosts the HTTP surface of the marketplace fulfillment engine. It is responsible for:
//! Resolving the caller from the identity headers forwarded by the upstream gateway.
//! Checking the caller's role against each route's access list.
//! Handing checkout, payment, inventory, loyalty and receipt requests to the engine.
//! Expiring stale unpaid orders in the background.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/products`, `/products/{id}`, `/products/{id}/stock`, `/products/{id}/inventory`: Listings and stock.
//! * `/cart`, `/cart/items`, `/cart/items/{product_id}`: The caller's cart.
//! * `/orders`, `/orders/{id}`, `/orders/{id}/receipt`: Checkout, status changes and receipts.
//! * `/payments`, `/payments/{id}/confirm`: Settlement.
//! * `/customers/{id}`, `/customers/{id}/loyalty`, `/customers/{id}/loyalty/redeem`, `/sellers/{id}`: Directory and
//!   loyalty.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;

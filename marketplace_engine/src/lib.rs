//! Marketplace Engine
//!
//! The marketplace engine turns carts and point-of-sale baskets into committed orders, moves shared stock safely under
//! concurrency, settles payments through a pluggable gateway and credits loyalty points, all while keeping an
//! append-only inventory ledger that can be replayed to reproduce every product's stock.
//!
//! The library is divided into these main sections:
//! 1. Backend capability traits ([`mod@traits`]) and the data types they trade in ([`mod@db_types`]). SQLite is the
//!    supported production backend. You should never need to access the database directly. Instead, use the public
//!    API provided by the engine.
//! 2. The engine public API ([`mod@mkt_api`]). This provides checkout, payments, inventory, carts, loyalty and
//!    receipts. Each API object is generic over the backend traits it needs.
//! 3. Settlement gateways ([`mod@settlement`]). The engine never talks to a payment processor directly; it asks a
//!    [`settlement::SettlementGateway`] and records the outcome.
//!
//! The engine also provides a set of events that can be subscribed to ([`mod@events`]). For example, when a new order
//! is created, an `OrderCreated` event is emitted. Hooks are fire-and-forget and never hold up the pipeline.
#[cfg(feature = "sqlite")]
mod sqlite;

pub mod db_types;
pub mod events;
pub mod mkt_api;
pub mod settlement;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use mkt_api::{
    cart_api::CartApi,
    directory_api::DirectoryApi,
    inventory_api::InventoryApi,
    loyalty_api::LoyaltyApi,
    order_flow_api::OrderFlowApi,
    order_objects,
    receipt_api::ReceiptApi,
};
#[cfg(feature = "sqlite")]
pub use sqlite::{db::db_url, SqliteDatabase};
pub use traits::{
    CartManagement,
    DirectoryManagement,
    FulfillmentDatabase,
    FulfillmentError,
    InventoryManagement,
    LoyaltyManagement,
    OrderManagement,
};

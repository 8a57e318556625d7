//! Fulfillment events.
//!
//! The engine publishes an event whenever an order is created, a payment settles or is declined, an order changes
//! status, or a product runs low on stock. Subscribers register async hooks with [`EventHooks`], and the engine
//! publishes through the [`EventProducers`] handed to each API object.
mod channel;
mod event_types;
mod hooks;

pub use channel::{publish_to_all, EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers, HookFuture};

//! Fulfillment event subscribers for the server.
//!
//! Downstream notification channels (email, seller dashboards) are out of scope for the server itself, so the hooks
//! registered here write each event to the log under the `mkt::events` target, where a log shipper can pick them up.
use log::*;
use marketplace_engine::events::{
    EventHooks,
    HookFuture,
    LowStockEvent,
    OrderCreatedEvent,
    OrderStatusChangedEvent,
    PaymentCompletedEvent,
    PaymentDeclinedEvent,
};

const EVENTS_TARGET: &str = "mkt::events";

pub fn notification_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_created(|ev: OrderCreatedEvent| -> HookFuture {
            Box::pin(async move {
                let order = ev.order;
                info!(
                    target: EVENTS_TARGET,
                    "📬️ Order {} placed with {} for {} ({} lines)",
                    order.id,
                    order.seller_id,
                    order.total,
                    order.lines.len()
                );
            })
        })
        .on_payment_completed(|ev: PaymentCompletedEvent| -> HookFuture {
            Box::pin(async move {
                info!(
                    target: EVENTS_TARGET,
                    "📬️ Payment {} of {} settled for order {}", ev.payment.id, ev.payment.amount, ev.order.id
                );
            })
        })
        .on_payment_declined(|ev: PaymentDeclinedEvent| -> HookFuture {
            Box::pin(async move {
                let reason = ev.payment.failure_reason.unwrap_or_default();
                info!(
                    target: EVENTS_TARGET,
                    "📬️ Payment {} for order {} was declined ({reason}). {} lines released",
                    ev.payment.id,
                    ev.order.id,
                    ev.released.len()
                );
            })
        })
        .on_status_changed(|ev: OrderStatusChangedEvent| -> HookFuture {
            Box::pin(async move {
                info!(
                    target: EVENTS_TARGET,
                    "📬️ Order {} moved from {} to {}", ev.order.id, ev.old_status, ev.order.status
                );
            })
        })
        .on_low_stock(|ev: LowStockEvent| -> HookFuture {
            Box::pin(async move {
                warn!(
                    target: EVENTS_TARGET,
                    "📬️ Product {} is running low. {} left (threshold {})", ev.product_id, ev.stock, ev.threshold
                );
            })
        });
    hooks
}

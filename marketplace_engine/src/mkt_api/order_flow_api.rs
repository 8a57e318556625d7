use std::{fmt::Debug, sync::Arc};

use chrono::Duration;
use log::*;

use crate::{
    db_types::{
        Actor,
        NewPayment,
        Order,
        OrderId,
        OrderStatus,
        PaymentId,
        PaymentMetadata,
        PaymentMethod,
        PaymentStatus,
        Role,
        StockChange,
    },
    events::{
        publish_to_all,
        EventProducers,
        LowStockEvent,
        OrderCreatedEvent,
        OrderStatusChangedEvent,
        PaymentCompletedEvent,
        PaymentDeclinedEvent,
    },
    mkt_api::{
        aggregator::{CheckoutContext, OrderAggregator},
        availability::{normalize_items, AvailabilityValidator},
        loyalty_api::{accrue, default_policy, AccrualPolicy},
        order_objects::{CheckoutItem, CheckoutRequest, PaymentOutcome, PaymentRequest, StatusUpdate},
    },
    settlement::{SettlementGateway, SettlementOutcome, SettlementRequest},
    traits::{FulfillmentDatabase, FulfillmentError, LoyaltyCredit},
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;
const CANCEL_REASON: &str = "order cancelled";
const EXPIRY_REASON: &str = "order expired unpaid";

/// `OrderFlowApi` is the primary API for the fulfillment pipeline: checkout, payment settlement, loyalty accrual and
/// order status changes.
///
/// Stock is reserved when an order is committed, and stays reserved while the order is pending. It is returned to
/// inventory if a payment is declined or the order is cancelled, and re-reserved if payment is retried.
pub struct OrderFlowApi<B, G> {
    db: B,
    gateway: G,
    producers: EventProducers,
    policy: Arc<dyn AccrualPolicy>,
    low_stock_threshold: i64,
}

impl<B, G> Debug for OrderFlowApi<B, G> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, G> OrderFlowApi<B, G> {
    pub fn new(db: B, gateway: G, producers: EventProducers) -> Self {
        Self { db, gateway, producers, policy: default_policy(), low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD }
    }

    pub fn with_accrual_policy(mut self, policy: Arc<dyn AccrualPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }
}

impl<B, G> OrderFlowApi<B, G>
where
    B: FulfillmentDatabase,
    G: SettlementGateway,
{
    /// Turns a cart, or a point-of-sale basket, into a committed `pending` order.
    ///
    /// * Customers check out their own cart. The cart is cleared once the order has been committed.
    /// * Sellers (and admins) submit point-of-sale baskets by supplying `items`. The cart is not touched.
    ///
    /// Availability is checked up front, but the binding check is the conditional stock decrement inside
    /// [`FulfillmentDatabase::commit_checkout`]. Either every line's stock moves and the order exists, or nothing
    /// changes.
    ///
    /// If `idempotency_key` repeats a previous checkout by the same actor, the original order is returned and nothing
    /// else happens.
    pub async fn checkout(
        &self,
        actor: &Actor,
        request: CheckoutRequest,
    ) -> Result<crate::traits::CheckoutResult, FulfillmentError> {
        if let Some(key) = request.idempotency_key.as_deref() {
            if let Some(existing) = self.db.fetch_order_by_idempotency_key(&actor.id, key).await? {
                info!("🔄️📦️ Checkout {key} by {actor} was already committed as order {}", existing.id);
                return Ok(crate::traits::CheckoutResult::replayed(existing));
            }
        }
        let (is_pos, customer_id, raw_items) = match request.items {
            Some(items) => {
                if actor.role == Role::Customer {
                    return Err(FulfillmentError::Unauthorized(
                        "Only sellers can submit point-of-sale orders".to_string(),
                    ));
                }
                (true, request.customer_id, items)
            },
            None => {
                if actor.role != Role::Customer {
                    return Err(FulfillmentError::ValidationError(
                        "Point-of-sale checkouts must list their items".to_string(),
                    ));
                }
                let cart = self.db.fetch_cart(&actor.id).await?;
                let items = cart.iter().map(|c| CheckoutItem::new(c.product_id, c.quantity)).collect::<Vec<_>>();
                (false, Some(actor.id.clone()), items)
            },
        };
        if let Some(customer_id) = customer_id.as_deref() {
            if self.db.fetch_customer(customer_id).await?.is_none() {
                return Err(FulfillmentError::CustomerNotFound(customer_id.to_string()));
            }
        }
        let items = normalize_items(&raw_items)?;
        let products = AvailabilityValidator::new(&self.db).check(&items).await?;
        let context = CheckoutContext {
            placed_by: actor.id.clone(),
            customer_id,
            is_pos,
            shipping_address: request.shipping_address,
            idempotency_key: request.idempotency_key,
        };
        let order = OrderAggregator::build(context, &products, &items)?;
        if is_pos && !actor.acts_for_seller(&order.seller_id) {
            return Err(FulfillmentError::Unauthorized(format!(
                "{actor} cannot sell products listed by {}",
                order.seller_id
            )));
        }
        let result = self.db.commit_checkout(order).await?;
        if !result.created {
            return Ok(result);
        }
        info!(
            "🔄️📦️ Order {} committed for {} with {} lines, total {}",
            result.order.id,
            actor,
            result.order.lines.len(),
            result.order.total
        );
        if !is_pos {
            if let Err(e) = self.db.clear_cart(&actor.id).await {
                warn!("🔄️📦️ Order {} was committed, but the cart for {} could not be cleared. {e}", result.order.id, actor.id);
            }
        }
        publish_to_all(&self.producers.order_created_producer, OrderCreatedEvent::new(result.order.clone())).await;
        self.notify_low_stock(&result.stock_changes).await;
        Ok(result)
    }

    /// Attempts to settle an order.
    ///
    /// This is also the retry path: if an earlier attempt was declined, the order's stock was released, and it is
    /// re-reserved here before settlement is attempted again. If the stock is no longer available, the retry fails
    /// with `InsufficientStock` and nothing changes.
    ///
    /// A declined settlement is returned as [`PaymentOutcome::Declined`], not as an error.
    pub async fn submit_payment(
        &self,
        actor: &Actor,
        request: PaymentRequest,
    ) -> Result<PaymentOutcome, FulfillmentError> {
        let order_id = request.order_id;
        let order = self.fetch_order(order_id).await?;
        authorize_payment(actor, &order)?;
        if order.payment_status == PaymentStatus::Completed {
            return Err(FulfillmentError::PaymentAlreadyCompleted(order_id));
        }
        if order.status != OrderStatus::Pending {
            return Err(FulfillmentError::OrderNotPayable { order_id, status: order.status });
        }
        if request.amount != order.total {
            return Err(FulfillmentError::AmountMismatch { expected: order.total, amount: request.amount });
        }
        let metadata = match (request.method, request.cash_tendered) {
            (PaymentMethod::Cash, Some(tendered)) => PaymentMetadata::cash(tendered, order.total),
            (PaymentMethod::Cash, None) => PaymentMetadata::cash(order.total, order.total),
            (_, Some(_)) => {
                return Err(FulfillmentError::ValidationError(
                    "Cash tendered can only be given for cash payments".to_string(),
                ))
            },
            (_, None) => PaymentMetadata::default(),
        };
        let order = if order.stock_held {
            order
        } else {
            let (order, changes) = self.db.reacquire_stock(order_id).await?;
            info!("🔄️💰️ Stock re-reserved for order {order_id} ahead of a payment retry");
            self.notify_low_stock(&changes).await;
            order
        };
        let payment =
            self.db.insert_payment(NewPayment::new(order.id, request.amount, request.method).with_metadata(metadata)).await?;
        let settlement = SettlementRequest {
            order_id,
            payment_id: payment.id,
            amount: payment.amount,
            method: payment.method,
        };
        trace!("🔄️💰️ Settling payment {} for order {order_id}", payment.id);
        match self.gateway.settle(&settlement).await {
            SettlementOutcome::Completed { transaction_id } => self.record_settlement(payment.id, &transaction_id).await,
            SettlementOutcome::Declined { reason } => self.record_decline(payment.id, &reason).await,
        }
    }

    async fn record_settlement(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
    ) -> Result<PaymentOutcome, FulfillmentError> {
        let settled = match self.db.complete_payment(payment_id, transaction_id).await {
            Ok(s) => s,
            Err(
                e @ (FulfillmentError::PaymentAlreadyCompleted(_)
                | FulfillmentError::OrderNotPayable { .. }
                | FulfillmentError::InsufficientStock { .. }
                | FulfillmentError::ProductUnavailable(_)),
            ) => {
                // The money moved but the order can no longer take it. Keep the transaction id so it can be refunded.
                warn!("🔄️💰️ Payment {payment_id} ({transaction_id}) was approved, but cannot be applied. {e}");
                let voided = self.db.void_settled_payment(payment_id, transaction_id, &format!("refund due: {e}")).await?;
                let event = PaymentDeclinedEvent::new(voided.payment, voided.order, voided.released);
                publish_to_all(&self.producers.payment_declined_producer, event).await;
                return Err(e);
            },
            Err(e) => return Err(e),
        };
        info!("🔄️💰️ Payment {payment_id} completed. Order {} is now {}", settled.order.id, settled.order.status);
        let loyalty = match accrue(&self.db, self.policy.as_ref(), &settled.payment, &settled.order).await {
            Ok(credit) => credit.map(|c| c.transaction().clone()),
            Err(e) => {
                error!(
                    "🔄️💰️ Payment {payment_id} settled, but loyalty accrual failed. Use confirm_settlement to retry. {e}"
                );
                None
            },
        };
        let event = PaymentCompletedEvent::new(settled.payment.clone(), settled.order.clone());
        publish_to_all(&self.producers.payment_completed_producer, event).await;
        let event = OrderStatusChangedEvent::new(OrderStatus::Pending, settled.order.clone());
        publish_to_all(&self.producers.status_changed_producer, event).await;
        Ok(PaymentOutcome::Completed { payment: settled.payment, order: settled.order, loyalty })
    }

    async fn record_decline(&self, payment_id: PaymentId, reason: &str) -> Result<PaymentOutcome, FulfillmentError> {
        let declined = self.db.decline_payment(payment_id, reason).await?;
        info!(
            "🔄️💰️ Payment {payment_id} for order {} was declined ({reason}). {} lines released back to stock",
            declined.order.id,
            declined.released.len()
        );
        let event =
            PaymentDeclinedEvent::new(declined.payment.clone(), declined.order.clone(), declined.released.clone());
        publish_to_all(&self.producers.payment_declined_producer, event).await;
        Ok(PaymentOutcome::Declined { payment: declined.payment, order: declined.order, released: declined.released })
    }

    /// Handles a (possibly repeated) confirmation that a payment settled. Loyalty points are credited at most once per
    /// payment, no matter how often this is called.
    pub async fn confirm_settlement(&self, payment_id: PaymentId) -> Result<Option<LoyaltyCredit>, FulfillmentError> {
        let payment = self.db.fetch_payment(payment_id).await?.ok_or(FulfillmentError::PaymentNotFound(payment_id))?;
        if payment.status != PaymentStatus::Completed {
            return Err(FulfillmentError::ValidationError(format!(
                "Payment {payment_id} is {}, so it cannot be confirmed",
                payment.status
            )));
        }
        let order = self.fetch_order(payment.order_id).await?;
        accrue(&self.db, self.policy.as_ref(), &payment, &order).await
    }

    /// Changes an order's status.
    ///
    /// | From \ To  | Processing      | Shipped        | Delivered      | Cancelled                 |
    /// |------------|-----------------|----------------|----------------|---------------------------|
    /// | Pending    | settlement only |                |                | seller, customer, admin   |
    /// | Processing |                 | seller, admin  |                |                           |
    /// | Shipped    |                 |                | seller, admin  |                           |
    ///
    /// Cancelling releases any stock the order holds.
    pub async fn update_status(
        &self,
        actor: &Actor,
        order_id: OrderId,
        update: StatusUpdate,
    ) -> Result<Order, FulfillmentError> {
        let order = self.fetch_order(order_id).await?;
        let (from, to) = (order.status, update.status);
        authorize_status_change(actor, &order, to)?;
        if !from.can_transition_to(to) || to == OrderStatus::Processing {
            return Err(FulfillmentError::InvalidStatusTransition { from, to });
        }
        let updated = if to == OrderStatus::Cancelled {
            let reason = update.reason.as_deref().unwrap_or(CANCEL_REASON);
            let cancelled = self.db.cancel_order(order_id, reason).await?;
            info!("🔄️📦️ Order {order_id} cancelled by {actor}. {} lines released", cancelled.released.len());
            cancelled.order
        } else {
            let updated = self.db.transition_order(order_id, from, to).await?;
            info!("🔄️📦️ Order {order_id} moved from {from} to {to} by {actor}");
            updated
        };
        publish_to_all(&self.producers.status_changed_producer, OrderStatusChangedEvent::new(from, updated.clone()))
            .await;
        Ok(updated)
    }

    /// Cancels every pending order that has been idle for longer than `timeout`, releasing its stock. Orders that
    /// change state while this runs are skipped.
    pub async fn expire_stale_orders(&self, timeout: Duration) -> Result<Vec<Order>, FulfillmentError> {
        let stale = self.db.fetch_stale_orders(timeout).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for order in stale {
            match self.db.cancel_order(order.id, EXPIRY_REASON).await {
                Ok(cancelled) => {
                    info!("🕰️ Order {} expired unpaid. {} lines released", order.id, cancelled.released.len());
                    let event = OrderStatusChangedEvent::new(OrderStatus::Pending, cancelled.order.clone());
                    publish_to_all(&self.producers.status_changed_producer, event).await;
                    expired.push(cancelled.order);
                },
                Err(FulfillmentError::InvalidStatusTransition { from, .. }) => {
                    debug!("🕰️ Order {} became {from} before it could be expired", order.id);
                },
                Err(e) => return Err(e),
            }
        }
        Ok(expired)
    }

    pub async fn fetch_order(&self, order_id: OrderId) -> Result<Order, FulfillmentError> {
        self.db.fetch_order(order_id).await?.ok_or(FulfillmentError::OrderNotFound(order_id))
    }

    /// Fetches an order on behalf of an actor, who must be its customer, its seller, or an admin.
    pub async fn order_for_actor(&self, actor: &Actor, order_id: OrderId) -> Result<Order, FulfillmentError> {
        let order = self.fetch_order(order_id).await?;
        if !can_view(actor, &order) {
            return Err(FulfillmentError::Unauthorized(format!("{actor} cannot view order {order_id}")));
        }
        Ok(order)
    }

    async fn notify_low_stock(&self, changes: &[StockChange]) {
        for change in changes.iter().filter(|c| c.new_quantity <= self.low_stock_threshold) {
            debug!("🔄️📉️ {} is low on stock ({} left)", change.product_id, change.new_quantity);
            let event = LowStockEvent {
                product_id: change.product_id,
                stock: change.new_quantity,
                threshold: self.low_stock_threshold,
            };
            publish_to_all(&self.producers.low_stock_producer, event).await;
        }
    }
}

pub(crate) fn can_view(actor: &Actor, order: &Order) -> bool {
    actor.acts_for_seller(&order.seller_id) ||
        order.customer_id.as_deref().map(|c| actor.acts_for_customer(c)).unwrap_or(false)
}

fn authorize_payment(actor: &Actor, order: &Order) -> Result<(), FulfillmentError> {
    if can_view(actor, order) {
        Ok(())
    } else {
        Err(FulfillmentError::Unauthorized(format!("{actor} cannot pay for order {}", order.id)))
    }
}

fn authorize_status_change(actor: &Actor, order: &Order, to: OrderStatus) -> Result<(), FulfillmentError> {
    let allowed = match actor.role {
        Role::Admin => true,
        Role::Seller => actor.id == order.seller_id,
        Role::Customer => to == OrderStatus::Cancelled && order.customer_id.as_deref() == Some(actor.id.as_str()),
    };
    if allowed {
        Ok(())
    } else {
        Err(FulfillmentError::Unauthorized(format!("{actor} cannot move order {} to {to}", order.id)))
    }
}

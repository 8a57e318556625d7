use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderStatus, Payment, ProductId, StockChange};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    pub order: Order,
}

impl OrderCreatedEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCompletedEvent {
    pub payment: Payment,
    pub order: Order,
}

impl PaymentCompletedEvent {
    pub fn new(payment: Payment, order: Order) -> Self {
        Self { payment, order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDeclinedEvent {
    pub payment: Payment,
    pub order: Order,
    pub released: Vec<StockChange>,
}

impl PaymentDeclinedEvent {
    pub fn new(payment: Payment, order: Order, released: Vec<StockChange>) -> Self {
        Self { payment, order, released }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatus,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatus, order: Order) -> Self {
        Self { old_status, order }
    }
}

/// Emitted when a stock movement leaves a product at or below the configured threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockEvent {
    pub product_id: ProductId,
    pub stock: i64,
    pub threshold: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCreated(OrderCreatedEvent),
    PaymentCompleted(PaymentCompletedEvent),
    PaymentDeclined(PaymentDeclinedEvent),
    OrderStatusChanged(OrderStatusChangedEvent),
    LowStock(LowStockEvent),
}

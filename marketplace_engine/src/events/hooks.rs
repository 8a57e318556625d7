use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    LowStockEvent,
    OrderCreatedEvent,
    OrderStatusChangedEvent,
    PaymentCompletedEvent,
    PaymentDeclinedEvent,
};

pub type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_created_producer: Vec<EventProducer<OrderCreatedEvent>>,
    pub payment_completed_producer: Vec<EventProducer<PaymentCompletedEvent>>,
    pub payment_declined_producer: Vec<EventProducer<PaymentDeclinedEvent>>,
    pub status_changed_producer: Vec<EventProducer<OrderStatusChangedEvent>>,
    pub low_stock_producer: Vec<EventProducer<LowStockEvent>>,
}

pub struct EventHandlers {
    pub on_order_created: Option<EventHandler<OrderCreatedEvent>>,
    pub on_payment_completed: Option<EventHandler<PaymentCompletedEvent>>,
    pub on_payment_declined: Option<EventHandler<PaymentDeclinedEvent>>,
    pub on_status_changed: Option<EventHandler<OrderStatusChangedEvent>>,
    pub on_low_stock: Option<EventHandler<LowStockEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_created: hooks.on_order_created.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_completed: hooks.on_payment_completed.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_declined: hooks.on_payment_declined.map(|f| EventHandler::new(buffer_size, f)),
            on_status_changed: hooks.on_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_low_stock: hooks.on_low_stock.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_created {
            result.order_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_completed {
            result.payment_completed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_declined {
            result.payment_declined_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_status_changed {
            result.status_changed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_low_stock {
            result.low_stock_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_completed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payment_declined {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_low_stock {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_created: Option<Handler<OrderCreatedEvent>>,
    pub on_payment_completed: Option<Handler<PaymentCompletedEvent>>,
    pub on_payment_declined: Option<Handler<PaymentDeclinedEvent>>,
    pub on_status_changed: Option<Handler<OrderStatusChangedEvent>>,
    pub on_low_stock: Option<Handler<LowStockEvent>>,
}

impl EventHooks {
    pub fn on_order_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_created = Some(Arc::new(f));
        self
    }

    pub fn on_payment_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentCompletedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_completed = Some(Arc::new(f));
        self
    }

    pub fn on_payment_declined<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentDeclinedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payment_declined = Some(Arc::new(f));
        self
    }

    pub fn on_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_low_stock<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(LowStockEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_low_stock = Some(Arc::new(f));
        self
    }
}

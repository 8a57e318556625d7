use crate::{
    db_types::{Order, OrderId, Payment, PaymentId},
    traits::FulfillmentError,
};

/// Read-only queries over orders and payments.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, FulfillmentError>;

    /// Fetches the order previously placed by `placed_by` with the given idempotency key.
    async fn fetch_order_by_idempotency_key(
        &self,
        placed_by: &str,
        key: &str,
    ) -> Result<Option<Order>, FulfillmentError>;

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, FulfillmentError>;

    async fn fetch_orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>, FulfillmentError>;

    async fn fetch_payment(&self, id: PaymentId) -> Result<Option<Payment>, FulfillmentError>;

    /// All payment attempts for the order, oldest first.
    async fn fetch_payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, FulfillmentError>;
}

use chrono::Duration;
use thiserror::Error;

use crate::{
    db_types::{Money, NewOrder, NewPayment, Order, OrderId, OrderStatus, Payment, PaymentId, PaymentStatus, ProductId, StockChange},
    traits::{
        data_objects::{CancelledOrder, CheckoutResult, DeclinedPayment, SettledPayment},
        CartManagement,
        DirectoryManagement,
        InventoryManagement,
        LoyaltyManagement,
        OrderManagement,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the marketplace engine.
///
/// Every method here is a single atomic unit of work. Either all of its writes are persisted, or none are. In
/// particular, stock is only ever removed from inventory in the same unit of work that records the order holding it,
/// and is only ever returned in the same unit of work that records why.
#[allow(async_fn_in_trait)]
pub trait FulfillmentDatabase:
    Clone + InventoryManagement + CartManagement + DirectoryManagement + OrderManagement + LoyaltyManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Commits a checkout in a single unit of work:
    /// * Every line's stock is decremented with a conditional write that fails if the stock is insufficient or the
    ///   product is inactive. The product name and price are snapshotted from the row that was decremented.
    /// * The order header is inserted with status `pending` and `stock_held = true`.
    /// * One `sale` inventory log entry is written per line, referencing the new order.
    ///
    /// If any line fails, nothing is written. If the order carries an idempotency key that has already been used by
    /// the same actor, the existing order is returned and `created` is false.
    async fn commit_checkout(&self, order: NewOrder) -> Result<CheckoutResult, FulfillmentError>;

    /// Re-reserves stock for a pending order whose stock was released after a declined payment. Fails with
    /// `InsufficientStock` if any line can no longer be satisfied, in which case nothing changes.
    async fn reacquire_stock(&self, order_id: OrderId) -> Result<(Order, Vec<StockChange>), FulfillmentError>;

    /// Records a new `pending` payment attempt against an order. An order has at most one pending payment at a time;
    /// a second attempt fails with `PaymentInProgress` until the first one is settled.
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, FulfillmentError>;

    /// Marks a pending payment as completed with the given transaction id, and in the same unit of work moves the
    /// order from `pending` to `processing` with payment status `completed`.
    ///
    /// A paid order always holds its stock. If the order's hold was released while the payment was being settled (for
    /// example by a declined attempt), the stock is re-reserved here first. If that fails with `InsufficientStock` or
    /// `ProductUnavailable`, or the order is no longer `pending`, nothing is written.
    async fn complete_payment(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
    ) -> Result<SettledPayment, FulfillmentError>;

    /// Marks a pending payment as failed. If the order still holds stock, the stock is returned with a compensating
    /// `adjustment` entry referencing the order, and the order's `stock_held` flag is cleared.
    async fn decline_payment(&self, payment_id: PaymentId, reason: &str) -> Result<DeclinedPayment, FulfillmentError>;

    /// Records a settlement that the gateway approved, but that the order can no longer accept. The payment is marked
    /// failed with the gateway's transaction id kept, so that the funds can be refunded. Otherwise this behaves like
    /// [`decline_payment`](Self::decline_payment).
    async fn void_settled_payment(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
        reason: &str,
    ) -> Result<DeclinedPayment, FulfillmentError>;

    /// Moves an order from `from` to `to`. Fails with `InvalidStatusTransition` if the order is no longer in `from`.
    /// The caller is responsible for checking that the transition itself is legal.
    async fn transition_order(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, FulfillmentError>;

    /// Cancels a pending order, releasing any stock it holds with `adjustment` entries that carry `reason`.
    async fn cancel_order(&self, order_id: OrderId, reason: &str) -> Result<CancelledOrder, FulfillmentError>;

    /// Returns pending orders that have not been updated for longer than `older_than`.
    async fn fetch_stale_orders(&self, older_than: Duration) -> Result<Vec<Order>, FulfillmentError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FulfillmentError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("The request could not be completed because it was in conflict with a concurrent update. {0}")]
    ConcurrencyConflict(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Product {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("Product {0} is not available for sale")]
    ProductUnavailable(ProductId),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Customer {0} does not exist")]
    CustomerNotFound(String),
    #[error("Seller {0} does not exist")]
    SellerNotFound(String),
    #[error("Insufficient stock for product {product_id}. Requested {requested}, but only {available} available")]
    InsufficientStock { product_id: ProductId, requested: i64, available: i64 },
    #[error("Cannot check out an empty cart")]
    EmptyCart,
    #[error("All items in an order must come from a single seller. Found {0:?}")]
    MultipleSellers(Vec<String>),
    #[error("Not authorized. {0}")]
    Unauthorized(String),
    #[error("Order status cannot change from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order {order_id} cannot accept payments while it is {status}")]
    OrderNotPayable { order_id: OrderId, status: OrderStatus },
    #[error("Payment {payment_id} has already been settled as {status}")]
    PaymentAlreadySettled { payment_id: PaymentId, status: PaymentStatus },
    #[error("Order {0} already has a payment awaiting settlement")]
    PaymentInProgress(OrderId),
    #[error("Order {0} has already been paid for")]
    PaymentAlreadyCompleted(OrderId),
    #[error("Payment amount {amount} does not match the order total of {expected}")]
    AmountMismatch { expected: Money, amount: Money },
    #[error("Customer {customer_id} has {available} loyalty points, but {requested} were requested")]
    InsufficientPoints { customer_id: String, requested: i64, available: i64 },
    #[error("Cannot insert {0}, since it already exists")]
    AlreadyExists(String),
}

/// SQLite reports lock contention with these (extended) result codes.
const BUSY_CODES: [&str; 5] = ["5", "6", "261", "262", "517"];

impl From<sqlx::Error> for FulfillmentError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.code().map(|c| BUSY_CODES.contains(&c.as_ref())).unwrap_or(false) => {
                FulfillmentError::ConcurrencyConflict(e.to_string())
            },
            sqlx::Error::PoolTimedOut => FulfillmentError::ConcurrencyConflict(e.to_string()),
            _ => FulfillmentError::DatabaseError(e.to_string()),
        }
    }
}

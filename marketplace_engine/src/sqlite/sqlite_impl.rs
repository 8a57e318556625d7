//! `SqliteDatabase` is a concrete implementation of a marketplace engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::db::{carts, db_url, directory, inventory, loyalty, new_pool, orders, payments, products};
use crate::{
    db_types::{
        CartItem,
        Customer,
        InventoryLogEntry,
        LoyaltyTransaction,
        Money,
        NewCustomer,
        NewLoyaltyTransaction,
        NewOrder,
        NewPayment,
        NewProduct,
        NewSeller,
        Order,
        OrderId,
        OrderLine,
        OrderStatus,
        Payment,
        PaymentId,
        PaymentStatus,
        Product,
        ProductId,
        Seller,
        StockChange,
        StockDelta,
    },
    traits::{
        CancelledOrder,
        CartManagement,
        CheckoutResult,
        DeclinedPayment,
        DirectoryManagement,
        FulfillmentDatabase,
        FulfillmentError,
        InventoryManagement,
        LoyaltyCredit,
        LoyaltyManagement,
        OrderManagement,
        SettledPayment,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl FulfillmentDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn commit_checkout(&self, order: NewOrder) -> Result<CheckoutResult, FulfillmentError> {
        if order.items.is_empty() {
            return Err(FulfillmentError::EmptyCart);
        }
        if let Some(key) = order.idempotency_key.as_deref() {
            let mut conn = self.pool.acquire().await?;
            if let Some(existing) = orders::fetch_order_by_idempotency_key(&order.placed_by, key, &mut conn).await? {
                debug!("🗃️ Checkout with key {key} by {} was already committed as {}", order.placed_by, existing.id);
                return Ok(CheckoutResult::replayed(existing));
            }
        }
        let mut tx = self.pool.begin().await?;
        let mut lines = Vec::with_capacity(order.items.len());
        let mut movements = Vec::with_capacity(order.items.len());
        for (product_id, quantity) in &order.items {
            let delta = StockDelta::sale(*product_id, *quantity);
            let (product, change) = products::update_stock(&delta, &mut tx).await?;
            if product.seller_id != order.seller_id {
                return Err(FulfillmentError::MultipleSellers(vec![order.seller_id.clone(), product.seller_id]));
            }
            lines.push(OrderLine::snapshot(&product, *quantity)?);
            movements.push((delta, change));
        }
        let new_order = match orders::insert_order(&order, &lines, &mut tx).await {
            Ok(o) => o,
            Err(FulfillmentError::AlreadyExists(_)) => {
                tx.rollback().await?;
                return self.replay_concurrent_checkout(&order).await;
            },
            Err(e) => return Err(e),
        };
        let reason = format!("order {}", new_order.id);
        for (delta, change) in &movements {
            let delta = delta.clone().with_order(new_order.id).with_reason(reason.as_str());
            inventory::append_log_entry(&delta, change, &mut tx).await?;
        }
        tx.commit().await?;
        debug!("🗃️ Checkout committed as order {} with {} lines", new_order.id, new_order.lines.len());
        let changes = movements.into_iter().map(|(_, c)| c).collect();
        Ok(CheckoutResult::created(new_order, changes))
    }

    async fn reacquire_stock(&self, order_id: OrderId) -> Result<(Order, Vec<StockChange>), FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::reserve_hold(order_id, &mut tx).await? {
            Some(o) => o,
            None => {
                let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
                if order.status != OrderStatus::Pending {
                    return Err(FulfillmentError::OrderNotPayable { order_id, status: order.status });
                }
                trace!("🗃️ Order {order_id} already holds its stock");
                return Ok((order, vec![]));
            },
        };
        let reason = format!("order {order_id} payment retry");
        let changes = inventory::reserve_order_stock(&order, &reason, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Stock re-reserved for order {order_id}");
        Ok((order, changes))
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::insert_payment(&payment, &mut conn).await?;
        debug!("🗃️ Payment {} of {} recorded for order {}", payment.id, payment.amount, payment.order_id);
        Ok(payment)
    }

    async fn complete_payment(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
    ) -> Result<SettledPayment, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let payment = match payments::mark_completed(payment_id, transaction_id, &mut tx).await? {
            Some(p) => p,
            None => return Err(already_settled(payment_id, &mut tx).await),
        };
        let order_id = payment.order_id;
        let order = match orders::mark_paid(order_id, &mut tx).await? {
            Some(o) => o,
            None => {
                let order = orders::fetch_order(order_id, &mut tx).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
                if order.payment_status == PaymentStatus::Completed {
                    return Err(FulfillmentError::PaymentAlreadyCompleted(order_id));
                }
                if order.status != OrderStatus::Pending {
                    return Err(FulfillmentError::OrderNotPayable { order_id, status: order.status });
                }
                // The hold lapsed while this payment was being settled.
                let held = orders::reserve_hold(order_id, &mut tx).await?.ok_or(FulfillmentError::ConcurrencyConflict(
                    format!("Order {order_id} changed while payment {payment_id} was being recorded"),
                ))?;
                let reason = format!("order {order_id} paid by payment {payment_id}");
                inventory::reserve_order_stock(&held, &reason, &mut tx).await?;
                debug!("🗃️ Stock re-reserved for order {order_id} as payment {payment_id} settled");
                orders::mark_paid(order_id, &mut tx).await?.ok_or(FulfillmentError::ConcurrencyConflict(format!(
                    "Order {order_id} could not be marked as paid"
                )))?
            },
        };
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} settled. Order {} is now {}", order.id, order.status);
        Ok(SettledPayment { payment, order })
    }

    async fn decline_payment(&self, payment_id: PaymentId, reason: &str) -> Result<DeclinedPayment, FulfillmentError> {
        self.fail_payment(payment_id, reason, None).await
    }

    async fn void_settled_payment(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
        reason: &str,
    ) -> Result<DeclinedPayment, FulfillmentError> {
        self.fail_payment(payment_id, reason, Some(transaction_id)).await
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        match orders::update_status(order_id, from, to, &mut conn).await? {
            Some(order) => {
                debug!("🗃️ Order {order_id} moved from {from} to {to}");
                Ok(order)
            },
            None => {
                let order =
                    orders::fetch_order(order_id, &mut conn).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
                Err(FulfillmentError::InvalidStatusTransition { from: order.status, to })
            },
        }
    }

    async fn cancel_order(&self, order_id: OrderId, reason: &str) -> Result<CancelledOrder, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let cancelled = orders::update_status(order_id, OrderStatus::Pending, OrderStatus::Cancelled, &mut tx).await?;
        let order = match cancelled {
            Some(o) => o,
            None => {
                let order =
                    orders::fetch_order(order_id, &mut tx).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
                return Err(FulfillmentError::InvalidStatusTransition { from: order.status, to: OrderStatus::Cancelled });
            },
        };
        let (order, released) = match orders::release_hold(order_id, &mut tx).await? {
            Some(released_order) => {
                let released = inventory::release_order_stock(&order, reason, &mut tx).await?;
                (released_order, released)
            },
            None => (order, vec![]),
        };
        tx.commit().await?;
        debug!("🗃️ Order {order_id} cancelled. {} lines released", released.len());
        Ok(CancelledOrder { order, released })
    }

    async fn fetch_stale_orders(&self, older_than: Duration) -> Result<Vec<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let stale = orders::fetch_stale_orders(Utc::now() - older_than, &mut conn).await?;
        Ok(stale)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn create_product(&self, product: NewProduct) -> Result<Product, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let mut new_product = products::insert_product(&product, &mut tx).await?;
        if product.initial_stock > 0 {
            let delta = StockDelta::restock(new_product.id, product.initial_stock).with_reason("initial stock");
            let (updated, _) = inventory::apply_delta(&delta, &mut tx).await?;
            new_product = updated;
        }
        tx.commit().await?;
        debug!("🗃️ Product {} ({}) created for seller {}", new_product.id, new_product.name, new_product.seller_id);
        Ok(new_product)
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(ids, &mut conn).await?;
        Ok(products)
    }

    async fn fetch_products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products_for_seller(seller_id, &mut conn).await?;
        Ok(products)
    }

    async fn set_price(&self, id: ProductId, price: Money) -> Result<Product, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        products::set_price(id, price, &mut conn).await
    }

    async fn set_active(&self, id: ProductId, active: bool) -> Result<Product, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        products::set_active(id, active, &mut conn).await
    }

    async fn apply_delta(&self, delta: StockDelta) -> Result<StockChange, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let (_, change) = inventory::apply_delta(&delta, &mut tx).await?;
        tx.commit().await?;
        Ok(change)
    }

    async fn fetch_inventory_log(&self, id: ProductId) -> Result<Vec<InventoryLogEntry>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let entries = inventory::fetch_log_for_product(id, &mut conn).await?;
        Ok(entries)
    }
}

impl CartManagement for SqliteDatabase {
    async fn add_to_cart(
        &self,
        customer_id: &str,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        carts::add_item(customer_id, product_id, quantity, &mut conn).await
    }

    async fn fetch_cart(&self, customer_id: &str) -> Result<Vec<CartItem>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let items = carts::fetch_cart(customer_id, &mut conn).await?;
        Ok(items)
    }

    async fn remove_from_cart(&self, customer_id: &str, product_id: ProductId) -> Result<(), FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        carts::remove_item(customer_id, product_id, &mut conn).await?;
        Ok(())
    }

    async fn clear_cart(&self, customer_id: &str) -> Result<(), FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let n = carts::clear_cart(customer_id, &mut conn).await?;
        trace!("🗃️ Removed {n} items from the cart for {customer_id}");
        Ok(())
    }
}

impl DirectoryManagement for SqliteDatabase {
    async fn upsert_customer(&self, customer: NewCustomer) -> Result<Customer, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        directory::upsert_customer(customer, &mut conn).await
    }

    async fn fetch_customer(&self, id: &str) -> Result<Option<Customer>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let customer = directory::fetch_customer(id, &mut conn).await?;
        Ok(customer)
    }

    async fn upsert_seller(&self, seller: NewSeller) -> Result<Seller, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        directory::upsert_seller(seller, &mut conn).await
    }

    async fn fetch_seller(&self, id: &str) -> Result<Option<Seller>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let seller = directory::fetch_seller(id, &mut conn).await?;
        Ok(seller)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_idempotency_key(
        &self,
        placed_by: &str,
        key: &str,
    ) -> Result<Option<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_idempotency_key(placed_by, key, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_customer(customer_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_orders_for_seller(seller_id, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_payment(&self, id: PaymentId) -> Result<Option<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }
}

impl LoyaltyManagement for SqliteDatabase {
    async fn credit_points(&self, credit: NewLoyaltyTransaction) -> Result<LoyaltyCredit, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let payment_id = credit.payment_id.ok_or_else(|| {
            FulfillmentError::ValidationError("Loyalty credits must reference a payment".to_string())
        })?;
        if let Some(existing) = loyalty::fetch_for_payment(payment_id, &mut conn).await? {
            debug!("🗃️ Loyalty points for payment {payment_id} were already credited");
            return Ok(LoyaltyCredit::AlreadyCredited(existing));
        }
        match loyalty::insert_credit(&credit, &mut conn).await? {
            Some(tx) => {
                debug!("🗃️ {} loyalty points credited to {} for payment {payment_id}", tx.points, tx.customer_id);
                Ok(LoyaltyCredit::Credited(tx))
            },
            None => {
                // Lost a race with a concurrent credit for the same payment.
                let existing = loyalty::fetch_for_payment(payment_id, &mut conn).await?.ok_or_else(|| {
                    FulfillmentError::ConcurrencyConflict(format!("Loyalty credit for {payment_id} was rejected"))
                })?;
                Ok(LoyaltyCredit::AlreadyCredited(existing))
            },
        }
    }

    async fn redeem_points(&self, redemption: NewLoyaltyTransaction) -> Result<LoyaltyTransaction, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        loyalty::insert_redemption(&redemption, &mut conn).await
    }

    async fn fetch_loyalty_balance(&self, customer_id: &str) -> Result<i64, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let balance = loyalty::balance(customer_id, &mut conn).await?;
        Ok(balance)
    }

    async fn fetch_loyalty_history(&self, customer_id: &str) -> Result<Vec<LoyaltyTransaction>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let history = loyalty::history(customer_id, &mut conn).await?;
        Ok(history)
    }

    async fn fetch_loyalty_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<LoyaltyTransaction>, FulfillmentError> {
        let mut conn = self.pool.acquire().await?;
        let tx = loyalty::fetch_for_payment(payment_id, &mut conn).await?;
        Ok(tx)
    }
}

/// Explains why a payment could not be settled after a conditional update matched nothing.
async fn already_settled(payment_id: PaymentId, conn: &mut sqlx::SqliteConnection) -> FulfillmentError {
    match payments::fetch_payment(payment_id, conn).await {
        Ok(Some(p)) => FulfillmentError::PaymentAlreadySettled { payment_id, status: p.status },
        Ok(None) => FulfillmentError::PaymentNotFound(payment_id),
        Err(e) => e.into(),
    }
}

impl SqliteDatabase {
    /// Marks a pending payment as failed, returning any stock its order holds in the same transaction.
    async fn fail_payment(
        &self,
        payment_id: PaymentId,
        reason: &str,
        transaction_id: Option<&str>,
    ) -> Result<DeclinedPayment, FulfillmentError> {
        let mut tx = self.pool.begin().await?;
        let payment = match payments::mark_failed(payment_id, reason, transaction_id, &mut tx).await? {
            Some(p) => p,
            None => return Err(already_settled(payment_id, &mut tx).await),
        };
        let order_id = payment.order_id;
        let released = match orders::release_hold(order_id, &mut tx).await? {
            Some(order) => {
                let why = format!("payment {payment_id} declined");
                inventory::release_order_stock(&order, &why, &mut tx).await?
            },
            None => vec![],
        };
        let order = match orders::mark_payment_failed(order_id, &mut tx).await? {
            Some(o) => o,
            None => orders::fetch_order(order_id, &mut tx).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?,
        };
        tx.commit().await?;
        debug!("🗃️ Payment {payment_id} failed. {} lines released for order {order_id}", released.len());
        Ok(DeclinedPayment { payment, order, released })
    }

    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn replay_concurrent_checkout(&self, order: &NewOrder) -> Result<CheckoutResult, FulfillmentError> {
        let key = order.idempotency_key.as_deref().unwrap_or_default();
        let mut conn = self.pool.acquire().await?;
        let existing = orders::fetch_order_by_idempotency_key(&order.placed_by, key, &mut conn)
            .await?
            .ok_or_else(|| FulfillmentError::ConcurrencyConflict(format!("Checkout with key {key} is in flight")))?;
        debug!("🗃️ Concurrent checkout with key {key} resolved to order {}", existing.id);
        Ok(CheckoutResult::replayed(existing))
    }
}

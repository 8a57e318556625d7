//! An in-memory backend.
//!
//! `MemoryDatabase` implements every backend trait with the same semantics as the SQLite backend, including the
//! all-or-nothing behaviour of the multi-table units of work. Each unit of work runs against a copy of the state, and
//! the copy only replaces the live state if the whole unit succeeds.
use std::{
    collections::BTreeMap,
    fmt::Debug,
    sync::{Arc, Mutex},
};

use chrono::{Duration, Utc};
use log::*;

use crate::{
    db_types::{
        order_total,
        CartItem,
        ChangeType,
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

const FK_VIOLATION: &str = "FOREIGN KEY constraint failed";

#[derive(Debug, Clone, Default)]
struct State {
    customers: BTreeMap<String, Customer>,
    sellers: BTreeMap<String, Seller>,
    products: BTreeMap<ProductId, Product>,
    inventory_log: Vec<InventoryLogEntry>,
    carts: Vec<CartItem>,
    orders: BTreeMap<OrderId, Order>,
    payments: BTreeMap<PaymentId, Payment>,
    loyalty: Vec<LoyaltyTransaction>,
}

impl State {
    fn product(&self, id: ProductId) -> Result<&Product, FulfillmentError> {
        self.products.get(&id).ok_or(FulfillmentError::ProductNotFound(id))
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, FulfillmentError> {
        self.orders.get_mut(&id).ok_or(FulfillmentError::OrderNotFound(id))
    }

    fn payment_mut(&mut self, id: PaymentId) -> Result<&mut Payment, FulfillmentError> {
        self.payments.get_mut(&id).ok_or(FulfillmentError::PaymentNotFound(id))
    }

    /// The conditional stock update: succeeds only if the result is non-negative, and only sells active products.
    fn update_stock(&mut self, delta: &StockDelta) -> Result<(Product, StockChange), FulfillmentError> {
        let product = self.products.get_mut(&delta.product_id).ok_or(FulfillmentError::ProductNotFound(delta.product_id))?;
        if !product.active && delta.change_type == ChangeType::Sale {
            return Err(FulfillmentError::ProductUnavailable(product.id));
        }
        if product.stock + delta.delta < 0 {
            return Err(FulfillmentError::InsufficientStock {
                product_id: product.id,
                requested: -delta.delta,
                available: product.stock,
            });
        }
        let change = StockChange {
            product_id: product.id,
            previous_quantity: product.stock,
            new_quantity: product.stock + delta.delta,
        };
        product.stock = change.new_quantity;
        product.updated_at = Utc::now();
        Ok((product.clone(), change))
    }

    fn append_log_entry(&mut self, delta: &StockDelta, change: &StockChange) {
        let entry = InventoryLogEntry {
            id: self.inventory_log.len() as i64 + 1,
            product_id: delta.product_id,
            delta: delta.delta,
            previous_quantity: change.previous_quantity,
            new_quantity: change.new_quantity,
            change_type: delta.change_type,
            reason: delta.reason.clone(),
            order_id: delta.order_id,
            created_at: Utc::now(),
        };
        self.inventory_log.push(entry);
    }

    fn apply_delta(&mut self, delta: &StockDelta) -> Result<(Product, StockChange), FulfillmentError> {
        let (product, change) = self.update_stock(delta)?;
        self.append_log_entry(delta, &change);
        Ok((product, change))
    }

    fn release_order_stock(&mut self, order: &Order, reason: &str) -> Result<Vec<StockChange>, FulfillmentError> {
        order
            .lines
            .iter()
            .map(|line| {
                let delta = StockDelta::release(line.product_id, line.quantity, order.id, reason);
                self.apply_delta(&delta).map(|(_, change)| change)
            })
            .collect()
    }

    fn find_by_key(&self, placed_by: &str, key: &str) -> Option<Order> {
        self.orders
            .values()
            .find(|o| o.placed_by == placed_by && o.idempotency_key.as_deref() == Some(key))
            .cloned()
    }

    fn already_settled(&self, payment_id: PaymentId) -> FulfillmentError {
        match self.payments.get(&payment_id) {
            Some(p) => FulfillmentError::PaymentAlreadySettled { payment_id, status: p.status },
            None => FulfillmentError::PaymentNotFound(payment_id),
        }
    }

    /// Clears the stock hold on an unpaid order and returns its stock.
    fn release_hold(&mut self, order_id: OrderId, reason: &str) -> Result<Vec<StockChange>, FulfillmentError> {
        let order = self.order_mut(order_id)?;
        let unpaid = matches!(order.status, OrderStatus::Pending | OrderStatus::Cancelled);
        if !order.stock_held || !unpaid {
            return Ok(vec![]);
        }
        order.stock_held = false;
        order.updated_at = Utc::now();
        let order = order.clone();
        self.release_order_stock(&order, reason)
    }

    /// Sets the stock hold on a pending order that lost it, taking its stock out of inventory again.
    fn reserve_hold(&mut self, order_id: OrderId, reason: &str) -> Result<Vec<StockChange>, FulfillmentError> {
        let order = self.order_mut(order_id)?;
        if order.stock_held || order.status != OrderStatus::Pending {
            return Ok(vec![]);
        }
        order.stock_held = true;
        order.updated_at = Utc::now();
        let order = order.clone();
        order
            .lines
            .iter()
            .map(|line| {
                let delta = StockDelta::sale(line.product_id, line.quantity).with_order(order_id).with_reason(reason);
                self.apply_delta(&delta).map(|(_, change)| change)
            })
            .collect()
    }

    fn fail_payment(
        &mut self,
        payment_id: PaymentId,
        reason: &str,
        transaction_id: Option<&str>,
    ) -> Result<DeclinedPayment, FulfillmentError> {
        let pending = self.payments.get(&payment_id).map(|p| p.status == PaymentStatus::Pending);
        if pending != Some(true) {
            return Err(self.already_settled(payment_id));
        }
        let payment = self.payment_mut(payment_id)?;
        payment.status = PaymentStatus::Failed;
        payment.failure_reason = Some(reason.to_string());
        payment.transaction_id = transaction_id.map(String::from);
        payment.updated_at = Utc::now();
        let payment = payment.clone();
        let released = self.release_hold(payment.order_id, &format!("payment {payment_id} declined"))?;
        let order = self.order_mut(payment.order_id)?;
        if order.payment_status != PaymentStatus::Completed {
            order.payment_status = PaymentStatus::Failed;
            order.updated_at = Utc::now();
        }
        Ok(DeclinedPayment { payment, order: order.clone(), released })
    }

    fn balance(&self, customer_id: &str) -> i64 {
        self.loyalty.iter().filter(|t| t.customer_id == customer_id).map(|t| t.points).sum()
    }
}

/// A thread-safe, in-memory backend. Clones share the same state.
#[derive(Clone, Default)]
pub struct MemoryDatabase {
    state: Arc<Mutex<State>>,
}

impl Debug for MemoryDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MemoryDatabase")
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` as a single unit of work. Either all of its changes become visible, or none do.
    fn transact<T, F>(&self, f: F) -> Result<T, FulfillmentError>
    where F: FnOnce(&mut State) -> Result<T, FulfillmentError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| FulfillmentError::DatabaseError(format!("Memory database lock is poisoned. {e}")))?;
        let mut draft = state.clone();
        let result = f(&mut draft)?;
        *state = draft;
        Ok(result)
    }

    fn read<T, F>(&self, f: F) -> Result<T, FulfillmentError>
    where F: FnOnce(&State) -> T {
        let state = self
            .state
            .lock()
            .map_err(|e| FulfillmentError::DatabaseError(format!("Memory database lock is poisoned. {e}")))?;
        Ok(f(&state))
    }

    /// Pretends the order was last touched `age` ago.
    pub fn backdate_order(&self, order_id: OrderId, age: Duration) -> Result<(), FulfillmentError> {
        self.transact(|state| {
            let order = state.order_mut(order_id)?;
            order.updated_at = Utc::now() - age;
            Ok(())
        })
    }
}

impl FulfillmentDatabase for MemoryDatabase {
    fn url(&self) -> &str {
        "memory://"
    }

    async fn commit_checkout(&self, order: NewOrder) -> Result<CheckoutResult, FulfillmentError> {
        if order.items.is_empty() {
            return Err(FulfillmentError::EmptyCart);
        }
        self.transact(|state| {
            if let Some(key) = order.idempotency_key.as_deref() {
                if let Some(existing) = state.find_by_key(&order.placed_by, key) {
                    return Ok(CheckoutResult::replayed(existing));
                }
            }
            let id = OrderId(state.orders.len() as i64 + 1);
            let reason = format!("order {id}");
            let mut lines = Vec::with_capacity(order.items.len());
            let mut changes = Vec::with_capacity(order.items.len());
            for (product_id, quantity) in &order.items {
                let delta = StockDelta::sale(*product_id, *quantity).with_order(id).with_reason(reason.as_str());
                let (product, change) = state.apply_delta(&delta)?;
                if product.seller_id != order.seller_id {
                    return Err(FulfillmentError::MultipleSellers(vec![order.seller_id.clone(), product.seller_id]));
                }
                lines.push(OrderLine::snapshot(&product, *quantity)?);
                changes.push(change);
            }
            if let Some(customer_id) = order.customer_id.as_deref() {
                if !state.customers.contains_key(customer_id) {
                    return Err(FulfillmentError::DatabaseError(FK_VIOLATION.to_string()));
                }
            }
            let now = Utc::now();
            let new_order = Order {
                id,
                customer_id: order.customer_id.clone(),
                seller_id: order.seller_id.clone(),
                placed_by: order.placed_by.clone(),
                total: order_total(&lines)?,
                lines,
                status: OrderStatus::Pending,
                payment_status: PaymentStatus::Pending,
                is_pos: order.is_pos,
                shipping_address: order.shipping_address.clone(),
                stock_held: true,
                idempotency_key: order.idempotency_key.clone(),
                created_at: now,
                updated_at: now,
            };
            state.orders.insert(id, new_order.clone());
            trace!("🗃️ [memory] Order {id} committed");
            Ok(CheckoutResult::created(new_order, changes))
        })
    }

    async fn reacquire_stock(&self, order_id: OrderId) -> Result<(Order, Vec<StockChange>), FulfillmentError> {
        self.transact(|state| {
            let status = state.order_mut(order_id)?.status;
            if status != OrderStatus::Pending {
                return Err(FulfillmentError::OrderNotPayable { order_id, status });
            }
            let changes = state.reserve_hold(order_id, &format!("order {order_id} payment retry"))?;
            let order = state.order_mut(order_id)?.clone();
            Ok((order, changes))
        })
    }

    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, FulfillmentError> {
        self.transact(|state| {
            if !state.orders.contains_key(&payment.order_id) {
                return Err(FulfillmentError::DatabaseError(FK_VIOLATION.to_string()));
            }
            let in_progress =
                state.payments.values().any(|p| p.order_id == payment.order_id && p.status == PaymentStatus::Pending);
            if in_progress {
                return Err(FulfillmentError::PaymentInProgress(payment.order_id));
            }
            let now = Utc::now();
            let id = PaymentId(state.payments.len() as i64 + 1);
            let payment = Payment {
                id,
                order_id: payment.order_id,
                amount: payment.amount,
                method: payment.method,
                status: PaymentStatus::Pending,
                transaction_id: None,
                failure_reason: None,
                metadata: payment.metadata,
                created_at: now,
                updated_at: now,
            };
            state.payments.insert(id, payment.clone());
            Ok(payment)
        })
    }

    async fn complete_payment(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
    ) -> Result<SettledPayment, FulfillmentError> {
        self.transact(|state| {
            let pending = state.payments.get(&payment_id).map(|p| p.status == PaymentStatus::Pending);
            if pending != Some(true) {
                return Err(state.already_settled(payment_id));
            }
            let order_id = state.payments[&payment_id].order_id;
            let other_completed = state
                .payments
                .values()
                .any(|p| p.order_id == order_id && p.id != payment_id && p.status == PaymentStatus::Completed);
            if other_completed {
                return Err(FulfillmentError::PaymentAlreadyCompleted(order_id));
            }
            let now = Utc::now();
            let payment = state.payment_mut(payment_id)?;
            payment.status = PaymentStatus::Completed;
            payment.transaction_id = Some(transaction_id.to_string());
            payment.updated_at = now;
            let payment = payment.clone();
            let order = state.order_mut(order_id)?;
            if order.status != OrderStatus::Pending {
                return Err(match order.payment_status {
                    PaymentStatus::Completed => FulfillmentError::PaymentAlreadyCompleted(order_id),
                    _ => FulfillmentError::OrderNotPayable { order_id, status: order.status },
                });
            }
            if !order.stock_held {
                state.reserve_hold(order_id, &format!("order {order_id} paid by payment {payment_id}"))?;
            }
            let order = state.order_mut(order_id)?;
            order.status = OrderStatus::Processing;
            order.payment_status = PaymentStatus::Completed;
            order.updated_at = now;
            Ok(SettledPayment { payment, order: order.clone() })
        })
    }

    async fn decline_payment(&self, payment_id: PaymentId, reason: &str) -> Result<DeclinedPayment, FulfillmentError> {
        self.transact(|state| state.fail_payment(payment_id, reason, None))
    }

    async fn void_settled_payment(
        &self,
        payment_id: PaymentId,
        transaction_id: &str,
        reason: &str,
    ) -> Result<DeclinedPayment, FulfillmentError> {
        self.transact(|state| state.fail_payment(payment_id, reason, Some(transaction_id)))
    }

    async fn transition_order(
        &self,
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, FulfillmentError> {
        self.transact(|state| {
            let order = state.order_mut(order_id)?;
            if order.status != from {
                return Err(FulfillmentError::InvalidStatusTransition { from: order.status, to });
            }
            order.status = to;
            order.updated_at = Utc::now();
            Ok(order.clone())
        })
    }

    async fn cancel_order(&self, order_id: OrderId, reason: &str) -> Result<CancelledOrder, FulfillmentError> {
        self.transact(|state| {
            let order = state.order_mut(order_id)?;
            if order.status != OrderStatus::Pending {
                return Err(FulfillmentError::InvalidStatusTransition { from: order.status, to: OrderStatus::Cancelled });
            }
            order.status = OrderStatus::Cancelled;
            order.updated_at = Utc::now();
            let released = state.release_hold(order_id, reason)?;
            let order = state.order_mut(order_id)?.clone();
            Ok(CancelledOrder { order, released })
        })
    }

    async fn fetch_stale_orders(&self, older_than: Duration) -> Result<Vec<Order>, FulfillmentError> {
        let cutoff = Utc::now() - older_than;
        self.read(|state| {
            state
                .orders
                .values()
                .filter(|o| o.status == OrderStatus::Pending && o.updated_at < cutoff)
                .cloned()
                .collect()
        })
    }
}

impl InventoryManagement for MemoryDatabase {
    async fn create_product(&self, product: NewProduct) -> Result<Product, FulfillmentError> {
        self.transact(|state| {
            if !state.sellers.contains_key(&product.seller_id) {
                return Err(FulfillmentError::DatabaseError(FK_VIOLATION.to_string()));
            }
            let now = Utc::now();
            let id = ProductId(state.products.len() as i64 + 1);
            let new_product = Product {
                id,
                seller_id: product.seller_id.clone(),
                name: product.name.clone(),
                price: product.price,
                stock: 0,
                active: true,
                created_at: now,
                updated_at: now,
            };
            state.products.insert(id, new_product.clone());
            if product.initial_stock > 0 {
                let delta = StockDelta::restock(id, product.initial_stock).with_reason("initial stock");
                let (updated, _) = state.apply_delta(&delta)?;
                return Ok(updated);
            }
            Ok(new_product)
        })
    }

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, FulfillmentError> {
        self.read(|state| state.products.get(&id).cloned())
    }

    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, FulfillmentError> {
        self.read(|state| ids.iter().filter_map(|id| state.products.get(id).cloned()).collect())
    }

    async fn fetch_products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>, FulfillmentError> {
        self.read(|state| state.products.values().filter(|p| p.seller_id == seller_id).cloned().collect())
    }

    async fn set_price(&self, id: ProductId, price: Money) -> Result<Product, FulfillmentError> {
        self.transact(|state| {
            let product = state.products.get_mut(&id).ok_or(FulfillmentError::ProductNotFound(id))?;
            product.price = price;
            product.updated_at = Utc::now();
            Ok(product.clone())
        })
    }

    async fn set_active(&self, id: ProductId, active: bool) -> Result<Product, FulfillmentError> {
        self.transact(|state| {
            let product = state.products.get_mut(&id).ok_or(FulfillmentError::ProductNotFound(id))?;
            product.active = active;
            product.updated_at = Utc::now();
            Ok(product.clone())
        })
    }

    async fn apply_delta(&self, delta: StockDelta) -> Result<StockChange, FulfillmentError> {
        self.transact(|state| state.apply_delta(&delta).map(|(_, change)| change))
    }

    async fn fetch_inventory_log(&self, id: ProductId) -> Result<Vec<InventoryLogEntry>, FulfillmentError> {
        self.read(|state| state.inventory_log.iter().filter(|e| e.product_id == id).cloned().collect())
    }
}

impl CartManagement for MemoryDatabase {
    async fn add_to_cart(
        &self,
        customer_id: &str,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, FulfillmentError> {
        self.transact(|state| {
            if !state.customers.contains_key(customer_id) || state.product(product_id).is_err() {
                return Err(FulfillmentError::DatabaseError(FK_VIOLATION.to_string()));
            }
            let existing = state.carts.iter_mut().find(|c| c.customer_id == customer_id && c.product_id == product_id);
            match existing {
                Some(item) => {
                    item.quantity += quantity;
                    Ok(item.clone())
                },
                None => {
                    let item = CartItem {
                        customer_id: customer_id.to_string(),
                        product_id,
                        quantity,
                        added_at: Utc::now(),
                    };
                    state.carts.push(item.clone());
                    Ok(item)
                },
            }
        })
    }

    async fn fetch_cart(&self, customer_id: &str) -> Result<Vec<CartItem>, FulfillmentError> {
        self.read(|state| state.carts.iter().filter(|c| c.customer_id == customer_id).cloned().collect())
    }

    async fn remove_from_cart(&self, customer_id: &str, product_id: ProductId) -> Result<(), FulfillmentError> {
        self.transact(|state| {
            state.carts.retain(|c| !(c.customer_id == customer_id && c.product_id == product_id));
            Ok(())
        })
    }

    async fn clear_cart(&self, customer_id: &str) -> Result<(), FulfillmentError> {
        self.transact(|state| {
            state.carts.retain(|c| c.customer_id != customer_id);
            Ok(())
        })
    }
}

impl DirectoryManagement for MemoryDatabase {
    async fn upsert_customer(&self, customer: NewCustomer) -> Result<Customer, FulfillmentError> {
        self.transact(|state| {
            let entry = state.customers.entry(customer.id.clone()).or_insert_with(|| Customer {
                id: customer.id.clone(),
                name: String::new(),
                email: None,
                created_at: Utc::now(),
            });
            entry.name = customer.name;
            entry.email = customer.email;
            Ok(entry.clone())
        })
    }

    async fn fetch_customer(&self, id: &str) -> Result<Option<Customer>, FulfillmentError> {
        self.read(|state| state.customers.get(id).cloned())
    }

    async fn upsert_seller(&self, seller: NewSeller) -> Result<Seller, FulfillmentError> {
        self.transact(|state| {
            let entry = state.sellers.entry(seller.id.clone()).or_insert_with(|| Seller {
                id: seller.id.clone(),
                name: String::new(),
                store_name: String::new(),
                email: None,
                created_at: Utc::now(),
            });
            entry.name = seller.name;
            entry.store_name = seller.store_name;
            entry.email = seller.email;
            Ok(entry.clone())
        })
    }

    async fn fetch_seller(&self, id: &str) -> Result<Option<Seller>, FulfillmentError> {
        self.read(|state| state.sellers.get(id).cloned())
    }
}

impl OrderManagement for MemoryDatabase {
    async fn fetch_order(&self, id: OrderId) -> Result<Option<Order>, FulfillmentError> {
        self.read(|state| state.orders.get(&id).cloned())
    }

    async fn fetch_order_by_idempotency_key(
        &self,
        placed_by: &str,
        key: &str,
    ) -> Result<Option<Order>, FulfillmentError> {
        self.read(|state| state.find_by_key(placed_by, key))
    }

    async fn fetch_orders_for_customer(&self, customer_id: &str) -> Result<Vec<Order>, FulfillmentError> {
        self.read(|state| {
            state.orders.values().filter(|o| o.customer_id.as_deref() == Some(customer_id)).cloned().collect()
        })
    }

    async fn fetch_orders_for_seller(&self, seller_id: &str) -> Result<Vec<Order>, FulfillmentError> {
        self.read(|state| state.orders.values().filter(|o| o.seller_id == seller_id).cloned().collect())
    }

    async fn fetch_payment(&self, id: PaymentId) -> Result<Option<Payment>, FulfillmentError> {
        self.read(|state| state.payments.get(&id).cloned())
    }

    async fn fetch_payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>, FulfillmentError> {
        self.read(|state| state.payments.values().filter(|p| p.order_id == order_id).cloned().collect())
    }
}

impl LoyaltyManagement for MemoryDatabase {
    async fn credit_points(&self, credit: NewLoyaltyTransaction) -> Result<LoyaltyCredit, FulfillmentError> {
        let payment_id = credit.payment_id.ok_or_else(|| {
            FulfillmentError::ValidationError("Loyalty credits must reference a payment".to_string())
        })?;
        self.transact(|state| {
            if let Some(existing) = state.loyalty.iter().find(|t| t.payment_id == Some(payment_id)) {
                return Ok(LoyaltyCredit::AlreadyCredited(existing.clone()));
            }
            let tx = LoyaltyTransaction {
                id: state.loyalty.len() as i64 + 1,
                customer_id: credit.customer_id,
                points: credit.points,
                transaction_type: credit.transaction_type,
                payment_id: Some(payment_id),
                description: credit.description,
                created_at: Utc::now(),
            };
            state.loyalty.push(tx.clone());
            Ok(LoyaltyCredit::Credited(tx))
        })
    }

    async fn redeem_points(&self, redemption: NewLoyaltyTransaction) -> Result<LoyaltyTransaction, FulfillmentError> {
        self.transact(|state| {
            let requested = -redemption.points;
            let available = state.balance(&redemption.customer_id);
            if available < requested {
                return Err(FulfillmentError::InsufficientPoints {
                    customer_id: redemption.customer_id,
                    requested,
                    available,
                });
            }
            let tx = LoyaltyTransaction {
                id: state.loyalty.len() as i64 + 1,
                customer_id: redemption.customer_id,
                points: redemption.points,
                transaction_type: redemption.transaction_type,
                payment_id: None,
                description: redemption.description,
                created_at: Utc::now(),
            };
            state.loyalty.push(tx.clone());
            Ok(tx)
        })
    }

    async fn fetch_loyalty_balance(&self, customer_id: &str) -> Result<i64, FulfillmentError> {
        self.read(|state| state.balance(customer_id))
    }

    async fn fetch_loyalty_history(&self, customer_id: &str) -> Result<Vec<LoyaltyTransaction>, FulfillmentError> {
        self.read(|state| state.loyalty.iter().filter(|t| t.customer_id == customer_id).cloned().collect())
    }

    async fn fetch_loyalty_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<LoyaltyTransaction>, FulfillmentError> {
        self.read(|state| state.loyalty.iter().find(|t| t.payment_id == Some(payment_id)).cloned())
    }
}

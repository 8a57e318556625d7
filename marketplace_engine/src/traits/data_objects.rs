use serde::{Deserialize, Serialize};

use crate::db_types::{LoyaltyTransaction, Order, Payment, StockChange};

/// The result of committing a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutResult {
    pub order: Order,
    pub stock_changes: Vec<StockChange>,
    /// False if an order with the same idempotency key already existed and was returned instead.
    pub created: bool,
}

impl CheckoutResult {
    pub fn created(order: Order, stock_changes: Vec<StockChange>) -> Self {
        Self { order, stock_changes, created: true }
    }

    pub fn replayed(order: Order) -> Self {
        Self { order, stock_changes: vec![], created: false }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettledPayment {
    pub payment: Payment,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclinedPayment {
    pub payment: Payment,
    pub order: Order,
    /// Stock returned to inventory by the compensating adjustment.
    pub released: Vec<StockChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelledOrder {
    pub order: Order,
    pub released: Vec<StockChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "transaction", rename_all = "snake_case")]
pub enum LoyaltyCredit {
    Credited(LoyaltyTransaction),
    /// Points for this payment were credited previously. The original transaction is returned.
    AlreadyCredited(LoyaltyTransaction),
}

impl LoyaltyCredit {
    pub fn transaction(&self) -> &LoyaltyTransaction {
        match self {
            LoyaltyCredit::Credited(t) | LoyaltyCredit::AlreadyCredited(t) => t,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, LoyaltyCredit::Credited(_))
    }
}

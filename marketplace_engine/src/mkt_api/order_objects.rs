use serde::{Deserialize, Serialize};

use crate::db_types::{
    ChangeType,
    Customer,
    InventoryLogEntry,
    LoyaltyTransaction,
    Money,
    Order,
    OrderId,
    OrderStatus,
    Payment,
    PaymentMethod,
    ProductId,
    Seller,
    StockChange,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutItem {
    #[serde(alias = "productId")]
    pub product_id: ProductId,
    pub quantity: i64,
}

impl CheckoutItem {
    pub fn new(product_id: ProductId, quantity: i64) -> Self {
        Self { product_id, quantity }
    }
}

/// A checkout intent. Customers check out their cart and leave `items` empty. Point-of-sale terminals supply the
/// items directly, and may name the customer the sale is for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Option<Vec<CheckoutItem>>,
    #[serde(default, alias = "shippingAddress")]
    pub shipping_address: Option<String>,
    #[serde(default, alias = "idempotencyKey")]
    pub idempotency_key: Option<String>,
    #[serde(default, alias = "customerId")]
    pub customer_id: Option<String>,
}

impl CheckoutRequest {
    pub fn from_cart() -> Self {
        Self::default()
    }

    pub fn point_of_sale(items: Vec<CheckoutItem>) -> Self {
        Self { items: Some(items), ..Default::default() }
    }

    pub fn with_shipping_address<S: Into<String>>(mut self, address: S) -> Self {
        self.shipping_address = Some(address.into());
        self
    }

    pub fn with_idempotency_key<S: Into<String>>(mut self, key: S) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn for_customer<S: Into<String>>(mut self, customer_id: S) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    #[serde(alias = "orderId")]
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    /// Cash handed over at the till. Only valid for cash payments.
    #[serde(default, alias = "cashTendered")]
    pub cash_tendered: Option<Money>,
}

impl PaymentRequest {
    pub fn new(order_id: OrderId, amount: Money, method: PaymentMethod) -> Self {
        Self { order_id, amount, method, cash_tendered: None }
    }

    pub fn with_cash_tendered(mut self, tendered: Money) -> Self {
        self.cash_tendered = Some(tendered);
        self
    }
}

/// The recorded result of a payment attempt. A decline is an outcome, not an error: the payment is stored as
/// `failed` and the order's stock has been released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PaymentOutcome {
    Completed { payment: Payment, order: Order, loyalty: Option<LoyaltyTransaction> },
    Declined { payment: Payment, order: Order, released: Vec<StockChange> },
}

impl PaymentOutcome {
    pub fn payment(&self) -> &Payment {
        match self {
            PaymentOutcome::Completed { payment, .. } | PaymentOutcome::Declined { payment, .. } => payment,
        }
    }

    pub fn order(&self) -> &Order {
        match self {
            PaymentOutcome::Completed { order, .. } | PaymentOutcome::Declined { order, .. } => order,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentOutcome::Completed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    #[serde(default)]
    pub reason: Option<String>,
}

impl StatusUpdate {
    pub fn new(status: OrderStatus) -> Self {
        Self { status, reason: None }
    }
}

/// A manual stock correction. When `change_type` is omitted, positive changes are logged as `restock` and negative
/// ones as `adjustment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    #[serde(alias = "quantityChange")]
    pub quantity_change: i64,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, alias = "changeType")]
    pub change_type: Option<ChangeType>,
}

impl StockAdjustment {
    pub fn new(quantity_change: i64, reason: &str) -> Self {
        Self { quantity_change, reason: Some(reason.to_string()), change_type: None }
    }
}

/// The audit chain for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryAudit {
    pub product_id: ProductId,
    pub current_stock: i64,
    pub entries: Vec<InventoryLogEntry>,
    /// True if replaying the entries reproduces `current_stock` with no gaps.
    pub consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub order: Order,
    pub seller: Option<Seller>,
    pub customer: Option<Customer>,
    /// Every payment attempt, oldest first.
    pub payments: Vec<Payment>,
    pub settled_payment: Option<Payment>,
    pub change_due: Option<Money>,
    pub loyalty_points: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltySummary {
    pub customer_id: String,
    pub balance: i64,
    pub transactions: Vec<LoyaltyTransaction>,
}

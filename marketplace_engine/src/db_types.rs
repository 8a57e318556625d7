//! Data types that are persisted by the fulfillment backends.
//!
//! These types are public, and are shared between the engine API and the storage backends. Monetary amounts are
//! always expressed in [`Money`], which is a fixed-point integer amount with three decimal places.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use mkt_common::Money;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::traits::FulfillmentError;

#[derive(Debug, Clone, Error)]
#[error("Invalid value for {kind}: {value}")]
pub struct ConversionError {
    pub kind: &'static str,
    pub value: String,
}

impl ConversionError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self { kind, value: value.to_string() }
    }
}

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn value(&self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl FromStr for $name {
            type Err = ConversionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim_start_matches('#')
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| ConversionError::new(stringify!($name), s))
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

id_type!(ProductId, "P#");
id_type!(OrderId, "#");
id_type!(PaymentId, "PAY#");

//--------------------------------------       Role / Actor       ------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Seller,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Seller => write!(f, "seller"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            _ => Err(ConversionError::new("Role", s)),
        }
    }
}

/// The authenticated party on whose behalf an operation is performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn new<S: Into<String>>(id: S, role: Role) -> Self {
        Self { id: id.into(), role }
    }

    pub fn customer<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Customer)
    }

    pub fn seller<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Seller)
    }

    pub fn admin<S: Into<String>>(id: S) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// True if this actor is the given seller, or an admin.
    pub fn acts_for_seller(&self, seller_id: &str) -> bool {
        self.is_admin() || (self.role == Role::Seller && self.id == seller_id)
    }

    /// True if this actor is the given customer, or an admin.
    pub fn acts_for_customer(&self, customer_id: &str) -> bool {
        self.is_admin() || (self.role == Role::Customer && self.id == customer_id)
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.role, self.id)
    }
}

//--------------------------------------     Customer / Seller    ------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Seller {
    pub id: String,
    pub name: String,
    pub store_name: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
}

impl NewCustomer {
    pub fn new<S: Into<String>>(id: S, name: S) -> Self {
        Self { id: id.into(), name: name.into(), email: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSeller {
    pub id: String,
    pub name: String,
    pub store_name: String,
    pub email: Option<String>,
}

impl NewSeller {
    pub fn new<S: Into<String>>(id: S, name: S, store_name: S) -> Self {
        Self { id: id.into(), name: name.into(), store_name: store_name.into(), email: None }
    }
}

//--------------------------------------        Product         --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub seller_id: String,
    pub name: String,
    pub price: Money,
    /// Units on hand. Never negative.
    pub stock: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub seller_id: String,
    pub name: String,
    pub price: Money,
    #[serde(default)]
    pub initial_stock: i64,
}

impl NewProduct {
    pub fn new<S: Into<String>>(seller_id: S, name: S, price: Money, initial_stock: i64) -> Self {
        Self { seller_id: seller_id.into(), name: name.into(), price, initial_stock }
    }
}

//--------------------------------------        CartItem        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CartItem {
    pub customer_id: String,
    pub product_id: ProductId,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

//--------------------------------------        ChangeType      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Sale,
    Restock,
    Adjustment,
    Return,
}

impl Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeType::Sale => write!(f, "sale"),
            ChangeType::Restock => write!(f, "restock"),
            ChangeType::Adjustment => write!(f, "adjustment"),
            ChangeType::Return => write!(f, "return"),
        }
    }
}

impl FromStr for ChangeType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(Self::Sale),
            "restock" => Ok(Self::Restock),
            "adjustment" => Ok(Self::Adjustment),
            "return" => Ok(Self::Return),
            _ => Err(ConversionError::new("ChangeType", s)),
        }
    }
}

//--------------------------------------   InventoryLogEntry    --------------------------------------------------------
/// An immutable record of a single stock movement. `new_quantity == previous_quantity + delta` always holds.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct InventoryLogEntry {
    pub id: i64,
    pub product_id: ProductId,
    pub delta: i64,
    pub previous_quantity: i64,
    pub new_quantity: i64,
    pub change_type: ChangeType,
    pub reason: Option<String>,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

/// A requested stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockDelta {
    pub product_id: ProductId,
    pub delta: i64,
    pub change_type: ChangeType,
    pub reason: Option<String>,
    pub order_id: Option<OrderId>,
}

impl StockDelta {
    pub fn new(product_id: ProductId, delta: i64, change_type: ChangeType) -> Self {
        Self { product_id, delta, change_type, reason: None, order_id: None }
    }

    pub fn sale(product_id: ProductId, quantity: i64) -> Self {
        Self::new(product_id, -quantity, ChangeType::Sale)
    }

    pub fn restock(product_id: ProductId, quantity: i64) -> Self {
        Self::new(product_id, quantity, ChangeType::Restock)
    }

    /// A stock release that compensates an earlier sale for the given order.
    pub fn release(product_id: ProductId, quantity: i64, order_id: OrderId, reason: &str) -> Self {
        Self::new(product_id, quantity, ChangeType::Adjustment).with_order(order_id).with_reason(reason)
    }

    pub fn with_reason<S: Into<String>>(mut self, reason: S) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

/// The stock level before and after a movement was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: ProductId,
    pub previous_quantity: i64,
    pub new_quantity: i64,
}

impl StockChange {
    pub fn delta(&self) -> i64 {
        self.new_quantity - self.previous_quantity
    }
}

//--------------------------------------      OrderStatus       --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Stock is held, and the order is awaiting payment.
    Pending,
    /// Payment has settled and the seller is preparing the order.
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// The order lifecycle. Anything not listed here is an illegal transition.
    ///
    /// | From \ To  | Processing | Shipped | Delivered | Cancelled |
    /// |------------|------------|---------|-----------|-----------|
    /// | Pending    | yes        |         |           | yes       |
    /// | Processing |            | yes     |           |           |
    /// | Shipped    |            |         | yes       |           |
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!((self, next), (Pending, Processing) | (Pending, Cancelled) | (Processing, Shipped) | (Shipped, Delivered))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Processing => write!(f, "processing"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ConversionError::new("OrderStatus", s)),
        }
    }
}

//--------------------------------------     PaymentStatus      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    /// A payment attempt is only ever settled once.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Completed) | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
        }
    }
}

//--------------------------------------        OrderLine       --------------------------------------------------------
/// A line item. The product name and unit price are captured when the order is committed and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub line_total: Money,
}

impl OrderLine {
    pub fn snapshot(product: &Product, quantity: i64) -> Result<Self, FulfillmentError> {
        let line_total = product.price.checked_mul(quantity).ok_or_else(|| {
            FulfillmentError::ValidationError(format!(
                "{quantity} x {} of {} does not fit in a money amount",
                product.price, product.id
            ))
        })?;
        Ok(Self {
            product_id: product.id,
            product_name: product.name.clone(),
            unit_price: product.price,
            quantity,
            line_total,
        })
    }
}

pub fn order_total(lines: &[OrderLine]) -> Result<Money, FulfillmentError> {
    lines.iter().try_fold(Money::default(), |total, line| {
        total
            .checked_add(line.line_total)
            .ok_or_else(|| FulfillmentError::ValidationError("The order total does not fit in a money amount".into()))
    })
}

//--------------------------------------          Order         --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    /// Walk-in point-of-sale orders have no customer.
    pub customer_id: Option<String>,
    pub seller_id: String,
    /// The id of the actor that placed the order. Idempotency keys are scoped to this id.
    pub placed_by: String,
    #[sqlx(json)]
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub is_pos: bool,
    pub shipping_address: Option<String>,
    /// True while the stock for this order's lines is reserved against the inventory.
    pub stock_held: bool,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn quantity_of(&self, product_id: ProductId) -> i64 {
        self.lines.iter().filter(|l| l.product_id == product_id).map(|l| l.quantity).sum()
    }
}

/// A fully validated order that is ready to be committed, along with the stock movements it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: Option<String>,
    pub seller_id: String,
    pub placed_by: String,
    pub items: Vec<(ProductId, i64)>,
    pub is_pos: bool,
    pub shipping_address: Option<String>,
    pub idempotency_key: Option<String>,
}

//--------------------------------------     PaymentMethod      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    Wallet,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
            PaymentMethod::BankTransfer => write!(f, "bank_transfer"),
            PaymentMethod::Wallet => write!(f, "wallet"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cash_tendered: Option<Money>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_due: Option<Money>,
}

impl PaymentMetadata {
    /// Cash metadata for an order total. Change is never negative.
    pub fn cash(tendered: Money, total: Money) -> Self {
        Self { cash_tendered: Some(tendered), change_due: Some(tendered.saturating_sub_to_zero(total)) }
    }
}

//--------------------------------------         Payment        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub failure_reason: Option<String>,
    #[sqlx(json)]
    pub metadata: PaymentMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub metadata: PaymentMetadata,
}

impl NewPayment {
    pub fn new(order_id: OrderId, amount: Money, method: PaymentMethod) -> Self {
        Self { order_id, amount, method, metadata: PaymentMetadata::default() }
    }

    pub fn with_metadata(mut self, metadata: PaymentMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

//--------------------------------------   LoyaltyTransaction   --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTransactionType {
    Earned,
    Redeemed,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub id: i64,
    pub customer_id: String,
    /// Positive for earned points, negative for redemptions.
    pub points: i64,
    pub transaction_type: LoyaltyTransactionType,
    pub payment_id: Option<PaymentId>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLoyaltyTransaction {
    pub customer_id: String,
    pub points: i64,
    pub transaction_type: LoyaltyTransactionType,
    pub payment_id: Option<PaymentId>,
    pub description: Option<String>,
}

impl NewLoyaltyTransaction {
    pub fn earned(customer_id: &str, points: i64, payment_id: PaymentId) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            points,
            transaction_type: LoyaltyTransactionType::Earned,
            payment_id: Some(payment_id),
            description: Some(format!("Points earned for payment {payment_id}")),
        }
    }

    pub fn redeemed(customer_id: &str, points: i64, description: Option<String>) -> Self {
        Self {
            customer_id: customer_id.to_string(),
            points: -points,
            transaction_type: LoyaltyTransactionType::Redeemed,
            payment_id: None,
            description,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_status_transitions() {
        use OrderStatus::*;
        let all = [Pending, Processing, Shipped, Delivered, Cancelled];
        let legal = [(Pending, Processing), (Pending, Cancelled), (Processing, Shipped), (Shipped, Delivered)];
        for from in all {
            for to in all {
                let expected = legal.contains(&(from, to));
                assert_eq!(from.can_transition_to(to), expected, "{from} -> {to}");
            }
        }
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
        assert!(!Shipped.is_terminal());
    }

    #[test]
    fn payment_status_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Failed));
        assert!(!Completed.can_transition_to(Pending));
    }

    #[test]
    fn status_strings() {
        assert_eq!("Shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
        assert_eq!(serde_json::to_string(&OrderStatus::Processing).unwrap(), "\"processing\"");
        assert_eq!(serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(), "\"bank_transfer\"");
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
    }

    #[test]
    fn line_snapshot() {
        let product = Product {
            id: ProductId(3),
            seller_id: "s1".into(),
            name: "Lamp".into(),
            price: Money::from(12_500),
            stock: 10,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let line = OrderLine::snapshot(&product, 3).unwrap();
        assert_eq!(line.line_total, Money::from(37_500));
        assert_eq!(line.product_name, "Lamp");
        let other = OrderLine::snapshot(&product, 1).unwrap();
        assert_eq!(order_total(&[line, other]).unwrap(), Money::from(50_000));
    }

    #[test]
    fn oversized_lines_are_rejected() {
        let product = Product {
            id: ProductId(4),
            seller_id: "s1".into(),
            name: "Yacht".into(),
            price: Money::from(i64::MAX / 4),
            stock: 10,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let err = OrderLine::snapshot(&product, 5).unwrap_err();
        assert!(matches!(err, FulfillmentError::ValidationError(_)), "{err}");
        let line = OrderLine::snapshot(&product, 3).unwrap();
        let err = order_total(&[line.clone(), line]).unwrap_err();
        assert!(matches!(err, FulfillmentError::ValidationError(_)), "{err}");
    }

    #[test]
    fn cash_change_is_never_negative() {
        let meta = PaymentMetadata::cash(Money::from(50_000), Money::from(45_000));
        assert_eq!(meta.change_due, Some(Money::from(5_000)));
        let meta = PaymentMetadata::cash(Money::from(40_000), Money::from(45_000));
        assert_eq!(meta.change_due, Some(Money::from(0)));
    }

    #[test]
    fn id_parsing() {
        assert_eq!("#42".parse::<OrderId>().unwrap(), OrderId(42));
        assert_eq!("7".parse::<ProductId>().unwrap(), ProductId(7));
        assert_eq!(OrderId(42).to_string(), "#42");
    }
}

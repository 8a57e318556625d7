//! Helpers for tests in this crate and its dependents. Only available with the `test_utils` feature.
mod memory;
#[cfg(feature = "sqlite")]
pub mod prepare_env;

pub use memory::MemoryDatabase;

use crate::{
    db_types::{Money, NewCustomer, NewProduct, NewSeller, Product},
    traits::{DirectoryManagement, FulfillmentError, InventoryManagement},
};

pub const SELLER: &str = "seller-1";
pub const OTHER_SELLER: &str = "seller-2";
pub const CUSTOMER: &str = "alice";
pub const OTHER_CUSTOMER: &str = "bob";

/// Registers two sellers and two customers.
pub async fn seed_directory<B: DirectoryManagement>(db: &B) -> Result<(), FulfillmentError> {
    db.upsert_seller(NewSeller::new(SELLER, "Sam Seller", "Sam's Surplus")).await?;
    db.upsert_seller(NewSeller::new(OTHER_SELLER, "Olive Other", "Olive's Oddments")).await?;
    db.upsert_customer(NewCustomer::new(CUSTOMER, "Alice")).await?;
    db.upsert_customer(NewCustomer::new(OTHER_CUSTOMER, "Bob")).await?;
    Ok(())
}

/// Lists a product for `seller_id`. `price` is in whole currency units.
pub async fn seed_product<B: InventoryManagement>(
    db: &B,
    seller_id: &str,
    name: &str,
    price: i64,
    stock: i64,
) -> Result<Product, FulfillmentError> {
    db.create_product(NewProduct::new(seller_id, name, Money::from_units(price), stock)).await
}

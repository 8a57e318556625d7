use crate::{
    db_types::{Customer, NewCustomer, NewSeller, Seller},
    traits::FulfillmentError,
};

/// The customer and seller directory.
#[allow(async_fn_in_trait)]
pub trait DirectoryManagement {
    /// Creates the customer, or updates the name and email of an existing one.
    async fn upsert_customer(&self, customer: NewCustomer) -> Result<Customer, FulfillmentError>;

    async fn fetch_customer(&self, id: &str) -> Result<Option<Customer>, FulfillmentError>;

    /// Creates the seller, or updates the details of an existing one.
    async fn upsert_seller(&self, seller: NewSeller) -> Result<Seller, FulfillmentError>;

    async fn fetch_seller(&self, id: &str) -> Result<Option<Seller>, FulfillmentError>;
}

use crate::{
    db_types::{CartItem, ProductId},
    traits::FulfillmentError,
};

#[allow(async_fn_in_trait)]
pub trait CartManagement {
    /// Adds `quantity` units of a product to the customer's cart. Adding a product that is already in the cart
    /// increases its quantity.
    async fn add_to_cart(
        &self,
        customer_id: &str,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, FulfillmentError>;

    /// The customer's cart, in the order the items were added.
    async fn fetch_cart(&self, customer_id: &str) -> Result<Vec<CartItem>, FulfillmentError>;

    async fn remove_from_cart(&self, customer_id: &str, product_id: ProductId) -> Result<(), FulfillmentError>;

    async fn clear_cart(&self, customer_id: &str) -> Result<(), FulfillmentError>;
}

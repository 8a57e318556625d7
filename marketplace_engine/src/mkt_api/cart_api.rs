use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, CartItem, ProductId, Role},
    traits::{CartManagement, DirectoryManagement, FulfillmentError, InventoryManagement},
};

/// A customer's persisted cart. Items are not reserved; stock is only checked (and taken) at checkout.
pub struct CartApi<B> {
    db: B,
}

impl<B> Debug for CartApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CartApi")
    }
}

impl<B> CartApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> CartApi<B>
where B: CartManagement + InventoryManagement + DirectoryManagement
{
    pub async fn add_item(
        &self,
        actor: &Actor,
        product_id: ProductId,
        quantity: i64,
    ) -> Result<CartItem, FulfillmentError> {
        let customer_id = customer_of(actor)?;
        if quantity <= 0 {
            return Err(FulfillmentError::ValidationError(format!("Invalid quantity for {product_id}: {quantity}")));
        }
        if self.db.fetch_customer(customer_id).await?.is_none() {
            return Err(FulfillmentError::CustomerNotFound(customer_id.to_string()));
        }
        let product = self.db.fetch_product(product_id).await?.ok_or(FulfillmentError::ProductNotFound(product_id))?;
        if !product.active {
            return Err(FulfillmentError::ProductUnavailable(product_id));
        }
        let item = self.db.add_to_cart(customer_id, product_id, quantity).await?;
        debug!("🛒️ {customer_id} has {} x {product_id} in their cart", item.quantity);
        Ok(item)
    }

    pub async fn cart(&self, actor: &Actor) -> Result<Vec<CartItem>, FulfillmentError> {
        let customer_id = customer_of(actor)?;
        self.db.fetch_cart(customer_id).await
    }

    pub async fn remove_item(&self, actor: &Actor, product_id: ProductId) -> Result<(), FulfillmentError> {
        let customer_id = customer_of(actor)?;
        self.db.remove_from_cart(customer_id, product_id).await
    }

    pub async fn clear(&self, actor: &Actor) -> Result<(), FulfillmentError> {
        let customer_id = customer_of(actor)?;
        self.db.clear_cart(customer_id).await
    }
}

fn customer_of(actor: &Actor) -> Result<&str, FulfillmentError> {
    match actor.role {
        Role::Customer => Ok(actor.id.as_str()),
        _ => Err(FulfillmentError::Unauthorized(format!("{actor} does not have a cart"))),
    }
}

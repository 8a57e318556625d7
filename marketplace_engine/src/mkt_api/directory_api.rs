use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, Customer, NewCustomer, NewSeller, Role, Seller},
    traits::{DirectoryManagement, FulfillmentError},
};

/// Mirrors customer and seller identities issued by the external identity provider.
///
/// A party may register or update itself. Admins may manage anyone.
pub struct DirectoryApi<B> {
    db: B,
}

impl<B> Debug for DirectoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DirectoryApi")
    }
}

impl<B> DirectoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> DirectoryApi<B>
where B: DirectoryManagement
{
    pub async fn register_customer(&self, actor: &Actor, customer: NewCustomer) -> Result<Customer, FulfillmentError> {
        authorize(actor, Role::Customer, &customer.id)?;
        check_name(&customer.name)?;
        let customer = self.db.upsert_customer(customer).await?;
        info!("🗂️ Customer {} registered by {actor}", customer.id);
        Ok(customer)
    }

    pub async fn register_seller(&self, actor: &Actor, seller: NewSeller) -> Result<Seller, FulfillmentError> {
        authorize(actor, Role::Seller, &seller.id)?;
        check_name(&seller.name)?;
        check_name(&seller.store_name)?;
        let seller = self.db.upsert_seller(seller).await?;
        info!("🗂️ Seller {} ({}) registered by {actor}", seller.id, seller.store_name);
        Ok(seller)
    }

    pub async fn customer(&self, id: &str) -> Result<Customer, FulfillmentError> {
        self.db.fetch_customer(id).await?.ok_or_else(|| FulfillmentError::CustomerNotFound(id.to_string()))
    }

    pub async fn seller(&self, id: &str) -> Result<Seller, FulfillmentError> {
        self.db.fetch_seller(id).await?.ok_or_else(|| FulfillmentError::SellerNotFound(id.to_string()))
    }
}

fn authorize(actor: &Actor, role: Role, id: &str) -> Result<(), FulfillmentError> {
    if actor.is_admin() || (actor.role == role && actor.id == id) {
        Ok(())
    } else {
        Err(FulfillmentError::Unauthorized(format!("{actor} cannot register {role} {id}")))
    }
}

fn check_name(name: &str) -> Result<(), FulfillmentError> {
    if name.trim().is_empty() {
        Err(FulfillmentError::ValidationError("Names cannot be empty".to_string()))
    } else {
        Ok(())
    }
}

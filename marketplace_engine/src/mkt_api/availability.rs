//! Optimistic availability checks.
//!
//! These checks narrow the window in which a checkout can fail, and give callers a precise error early. They are
//! never the final word: stock is re-checked by the conditional decrement when the order is committed.
use std::collections::HashMap;

use log::*;

use crate::{
    db_types::{Product, ProductId},
    mkt_api::order_objects::CheckoutItem,
    traits::{FulfillmentError, InventoryManagement},
};

/// Rejects empty baskets and non-positive quantities, and merges repeated products into a single line. The order of
/// first appearance is preserved.
pub fn normalize_items(items: &[CheckoutItem]) -> Result<Vec<(ProductId, i64)>, FulfillmentError> {
    if items.is_empty() {
        return Err(FulfillmentError::EmptyCart);
    }
    let mut merged: Vec<(ProductId, i64)> = Vec::with_capacity(items.len());
    for item in items {
        if item.quantity <= 0 {
            return Err(FulfillmentError::ValidationError(format!(
                "Quantity for {} must be positive, not {}",
                item.product_id, item.quantity
            )));
        }
        match merged.iter_mut().find(|(id, _)| *id == item.product_id) {
            Some((_, qty)) => {
                *qty = qty.checked_add(item.quantity).ok_or_else(|| {
                    FulfillmentError::ValidationError(format!("Quantity for {} is too large", item.product_id))
                })?;
            },
            None => merged.push((item.product_id, item.quantity)),
        }
    }
    Ok(merged)
}

pub struct AvailabilityValidator<'a, B> {
    db: &'a B,
}

impl<'a, B> AvailabilityValidator<'a, B>
where B: InventoryManagement
{
    pub fn new(db: &'a B) -> Self {
        Self { db }
    }

    /// Checks every line against current stock, and returns the products in line order.
    ///
    /// The first failing line determines the error.
    pub async fn check(&self, items: &[(ProductId, i64)]) -> Result<Vec<Product>, FulfillmentError> {
        let ids = items.iter().map(|(id, _)| *id).collect::<Vec<_>>();
        let mut products =
            self.db.fetch_products(&ids).await?.into_iter().map(|p| (p.id, p)).collect::<HashMap<_, _>>();
        let mut result = Vec::with_capacity(items.len());
        for (id, quantity) in items {
            let product = products.remove(id).ok_or(FulfillmentError::ProductNotFound(*id))?;
            if !product.active {
                return Err(FulfillmentError::ProductUnavailable(*id));
            }
            if product.stock < *quantity {
                debug!("🔍️ {id} has {} in stock, but {quantity} were requested", product.stock);
                return Err(FulfillmentError::InsufficientStock {
                    product_id: *id,
                    requested: *quantity,
                    available: product.stock,
                });
            }
            result.push(product);
        }
        Ok(result)
    }
}

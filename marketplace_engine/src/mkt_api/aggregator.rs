//! Builds orders from validated lines.
use crate::{
    db_types::{NewOrder, Product, ProductId},
    traits::FulfillmentError,
};

/// Everything the aggregator needs to know about who is checking out.
#[derive(Debug, Clone)]
pub struct CheckoutContext {
    pub placed_by: String,
    pub customer_id: Option<String>,
    pub is_pos: bool,
    pub shipping_address: Option<String>,
    pub idempotency_key: Option<String>,
}

pub struct OrderAggregator;

impl OrderAggregator {
    /// An order belongs to the seller of its first line. Every other line must belong to the same seller.
    pub fn seller_for(products: &[Product]) -> Result<String, FulfillmentError> {
        let first = products.first().ok_or(FulfillmentError::EmptyCart)?;
        let mut sellers = vec![first.seller_id.clone()];
        for product in &products[1..] {
            if !sellers.contains(&product.seller_id) {
                sellers.push(product.seller_id.clone());
            }
        }
        if sellers.len() > 1 {
            return Err(FulfillmentError::MultipleSellers(sellers));
        }
        Ok(first.seller_id.clone())
    }

    /// Assembles the order to commit. Prices and names are not captured here; they are snapshotted from the product
    /// rows at the moment stock is decremented, so the order always reflects what was actually sold.
    pub fn build(
        context: CheckoutContext,
        products: &[Product],
        items: &[(ProductId, i64)],
    ) -> Result<NewOrder, FulfillmentError> {
        let seller_id = Self::seller_for(products)?;
        Ok(NewOrder {
            customer_id: context.customer_id,
            seller_id,
            placed_by: context.placed_by,
            items: items.to_vec(),
            is_pos: context.is_pos,
            shipping_address: context.shipping_address,
            idempotency_key: context.idempotency_key,
        })
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::db_types::Money;

    fn product(id: i64, seller: &str) -> Product {
        Product {
            id: ProductId(id),
            seller_id: seller.to_string(),
            name: format!("Product {id}"),
            price: Money::from(1_000),
            stock: 5,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn seller_comes_from_the_first_line() {
        let products = [product(1, "alice"), product(2, "alice")];
        assert_eq!(OrderAggregator::seller_for(&products).unwrap(), "alice");
    }

    #[test]
    fn multi_seller_baskets_are_rejected() {
        let products = [product(1, "alice"), product(2, "bob"), product(3, "alice")];
        let err = OrderAggregator::seller_for(&products).unwrap_err();
        assert_eq!(err, FulfillmentError::MultipleSellers(vec!["alice".into(), "bob".into()]));
    }

    #[test]
    fn build_copies_context() {
        let ctx = CheckoutContext {
            placed_by: "till-1".into(),
            customer_id: None,
            is_pos: true,
            shipping_address: None,
            idempotency_key: Some("k1".into()),
        };
        let order = OrderAggregator::build(ctx, &[product(1, "alice")], &[(ProductId(1), 2)]).unwrap();
        assert_eq!(order.seller_id, "alice");
        assert!(order.is_pos);
        assert_eq!(order.items, vec![(ProductId(1), 2)]);
        assert_eq!(order.idempotency_key.as_deref(), Some("k1"));
    }
}

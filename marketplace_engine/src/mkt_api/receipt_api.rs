use std::fmt::Debug;

use crate::{
    db_types::{Actor, OrderId, PaymentStatus},
    mkt_api::{order_flow_api::can_view, order_objects::Receipt},
    traits::{DirectoryManagement, FulfillmentError, LoyaltyManagement, OrderManagement},
};

/// Read-only receipts. Building a receipt never changes any state.
pub struct ReceiptApi<B> {
    db: B,
}

impl<B> Debug for ReceiptApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReceiptApi")
    }
}

impl<B> ReceiptApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> ReceiptApi<B>
where B: OrderManagement + DirectoryManagement + LoyaltyManagement
{
    pub async fn receipt(&self, actor: &Actor, order_id: OrderId) -> Result<Receipt, FulfillmentError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(FulfillmentError::OrderNotFound(order_id))?;
        if !can_view(actor, &order) {
            return Err(FulfillmentError::Unauthorized(format!("{actor} cannot view the receipt for {order_id}")));
        }
        let seller = self.db.fetch_seller(&order.seller_id).await?;
        let customer = match order.customer_id.as_deref() {
            Some(id) => self.db.fetch_customer(id).await?,
            None => None,
        };
        let payments = self.db.fetch_payments_for_order(order_id).await?;
        let settled_payment = payments.iter().find(|p| p.status == PaymentStatus::Completed).cloned();
        let change_due = settled_payment.as_ref().and_then(|p| p.metadata.change_due);
        let loyalty_points = match settled_payment.as_ref() {
            Some(p) => self.db.fetch_loyalty_for_payment(p.id).await?.map(|t| t.points),
            None => None,
        };
        Ok(Receipt { order, seller, customer, payments, settled_payment, change_due, loyalty_points })
    }
}

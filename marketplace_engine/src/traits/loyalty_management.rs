use crate::{
    db_types::{LoyaltyTransaction, NewLoyaltyTransaction, PaymentId},
    traits::{FulfillmentError, LoyaltyCredit},
};

/// The loyalty points ledger. A customer's balance is the sum of their transactions.
#[allow(async_fn_in_trait)]
pub trait LoyaltyManagement {
    /// Credits points for a payment. At most one transaction may ever reference a given payment, so repeating this
    /// call returns `AlreadyCredited` with the original transaction rather than crediting twice.
    async fn credit_points(&self, credit: NewLoyaltyTransaction) -> Result<LoyaltyCredit, FulfillmentError>;

    /// Records a redemption. Fails with `InsufficientPoints` if the balance would become negative.
    async fn redeem_points(&self, redemption: NewLoyaltyTransaction) -> Result<LoyaltyTransaction, FulfillmentError>;

    async fn fetch_loyalty_balance(&self, customer_id: &str) -> Result<i64, FulfillmentError>;

    /// The customer's loyalty transactions, oldest first.
    async fn fetch_loyalty_history(&self, customer_id: &str) -> Result<Vec<LoyaltyTransaction>, FulfillmentError>;

    async fn fetch_loyalty_for_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<LoyaltyTransaction>, FulfillmentError>;
}

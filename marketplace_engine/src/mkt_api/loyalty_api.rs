use std::{fmt::Debug, sync::Arc};

use log::*;

use crate::{
    db_types::{LoyaltyTransaction, Money, NewLoyaltyTransaction, Order, Payment, PaymentId},
    mkt_api::order_objects::LoyaltySummary,
    traits::{FulfillmentError, LoyaltyCredit, LoyaltyManagement},
};

/// Decides how many points a settled amount is worth.
pub trait AccrualPolicy: Send + Sync {
    fn points_for(&self, amount: Money) -> i64;
}

/// One point per whole currency unit, rounded down.
#[derive(Debug, Clone, Copy, Default)]
pub struct WholeUnitsPolicy;

impl AccrualPolicy for WholeUnitsPolicy {
    fn points_for(&self, amount: Money) -> i64 {
        amount.whole_units().max(0)
    }
}

pub fn default_policy() -> Arc<dyn AccrualPolicy> {
    Arc::new(WholeUnitsPolicy)
}

/// Credits points for a settled payment against the order's customer. Walk-in sales and zero-point amounts accrue
/// nothing.
pub(crate) async fn accrue<B: LoyaltyManagement>(
    db: &B,
    policy: &dyn AccrualPolicy,
    payment: &Payment,
    order: &Order,
) -> Result<Option<LoyaltyCredit>, FulfillmentError> {
    let Some(customer_id) = order.customer_id.as_deref() else {
        trace!("🎁️ Order {} has no customer. No loyalty points accrue", order.id);
        return Ok(None);
    };
    let points = policy.points_for(payment.amount);
    if points <= 0 {
        return Ok(None);
    }
    let credit = db.credit_points(NewLoyaltyTransaction::earned(customer_id, points, payment.id)).await?;
    if credit.is_new() {
        info!("🎁️ {points} loyalty points credited to {customer_id} for payment {}", payment.id);
    } else {
        debug!("🎁️ Loyalty points for payment {} were already credited", payment.id);
    }
    Ok(Some(credit))
}

pub struct LoyaltyApi<B> {
    db: B,
}

impl<B> Debug for LoyaltyApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LoyaltyApi")
    }
}

impl<B> LoyaltyApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> LoyaltyApi<B>
where B: LoyaltyManagement
{
    /// Credits `points` for `payment_id` at most once. Repeating the call returns the original transaction.
    pub async fn credit(
        &self,
        customer_id: &str,
        payment_id: PaymentId,
        points: i64,
    ) -> Result<LoyaltyCredit, FulfillmentError> {
        if points <= 0 {
            return Err(FulfillmentError::ValidationError(format!("Cannot credit {points} loyalty points")));
        }
        self.db.credit_points(NewLoyaltyTransaction::earned(customer_id, points, payment_id)).await
    }

    pub async fn redeem(
        &self,
        customer_id: &str,
        points: i64,
        description: Option<String>,
    ) -> Result<LoyaltyTransaction, FulfillmentError> {
        if points <= 0 {
            return Err(FulfillmentError::ValidationError(format!("Cannot redeem {points} loyalty points")));
        }
        let tx = self.db.redeem_points(NewLoyaltyTransaction::redeemed(customer_id, points, description)).await?;
        info!("🎁️ {customer_id} redeemed {points} loyalty points");
        Ok(tx)
    }

    pub async fn balance(&self, customer_id: &str) -> Result<i64, FulfillmentError> {
        self.db.fetch_loyalty_balance(customer_id).await
    }

    pub async fn history(&self, customer_id: &str) -> Result<Vec<LoyaltyTransaction>, FulfillmentError> {
        self.db.fetch_loyalty_history(customer_id).await
    }

    pub async fn summary(&self, customer_id: &str) -> Result<LoyaltySummary, FulfillmentError> {
        let transactions = self.history(customer_id).await?;
        let balance = transactions.iter().map(|t| t.points).sum();
        Ok(LoyaltySummary { customer_id: customer_id.to_string(), balance, transactions })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whole_units_rounds_down() {
        let policy = WholeUnitsPolicy;
        assert_eq!(policy.points_for(Money::from(10_000)), 10);
        assert_eq!(policy.points_for(Money::from(7_999)), 7);
        assert_eq!(policy.points_for(Money::from(999)), 0);
        assert_eq!(policy.points_for(Money::from(-5_000)), 0);
    }
}

//! # Payment settlement
//!
//! A [`SettlementGateway`] is the seam between the engine and whatever actually moves money. The engine records a
//! `pending` payment, asks the gateway to settle it, and then records the outcome.
//!
//! Two families of gateway are provided:
//! * [`SimulatedGateway`] approves a configurable fraction of requests and invents transaction ids. This is the default
//!   for the server.
//! * [`ApproveAll`], [`DeclineAll`] and [`ScriptedGateway`] are deterministic, and are intended for tests.
mod fixed;
mod simulated;

pub use fixed::{ApproveAll, DeclineAll, ScriptedGateway};
use serde::{Deserialize, Serialize};
pub use simulated::SimulatedGateway;

use crate::db_types::{Money, OrderId, PaymentId, PaymentMethod};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub amount: Money,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    Completed { transaction_id: String },
    Declined { reason: String },
}

impl SettlementOutcome {
    pub fn completed<S: Into<String>>(transaction_id: S) -> Self {
        Self::Completed { transaction_id: transaction_id.into() }
    }

    pub fn declined<S: Into<String>>(reason: S) -> Self {
        Self::Declined { reason: reason.into() }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Settles payments. A gateway never fails: transport errors and rejections alike are reported as
/// [`SettlementOutcome::Declined`].
#[allow(async_fn_in_trait)]
pub trait SettlementGateway: Clone {
    async fn settle(&self, request: &SettlementRequest) -> SettlementOutcome;
}

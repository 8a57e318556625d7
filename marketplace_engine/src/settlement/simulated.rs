use std::time::Duration;

use log::*;
use rand::Rng;

use crate::settlement::{SettlementGateway, SettlementOutcome, SettlementRequest};

pub const DEFAULT_APPROVAL_RATE: f64 = 0.9;

/// A stand-in for a real payment processor. Cash is always approved; other methods are approved with probability
/// `approval_rate`.
#[derive(Debug, Clone)]
pub struct SimulatedGateway {
    approval_rate: f64,
    latency: Duration,
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(DEFAULT_APPROVAL_RATE)
    }
}

impl SimulatedGateway {
    /// `approval_rate` is clamped to `[0, 1]`.
    pub fn new(approval_rate: f64) -> Self {
        let approval_rate = if approval_rate.is_nan() { DEFAULT_APPROVAL_RATE } else { approval_rate.clamp(0.0, 1.0) };
        Self { approval_rate, latency: Duration::ZERO }
    }

    /// Adds an artificial processing delay to every settlement.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn approval_rate(&self) -> f64 {
        self.approval_rate
    }

    fn roll(&self, request: &SettlementRequest) -> SettlementOutcome {
        let mut rng = rand::thread_rng();
        let approved = request.method == crate::db_types::PaymentMethod::Cash || rng.gen_bool(self.approval_rate);
        if approved {
            SettlementOutcome::completed(format!("sim_{:016x}", rng.gen::<u64>()))
        } else {
            SettlementOutcome::declined(format!("{} payment declined by processor", request.method))
        }
    }
}

impl SettlementGateway for SimulatedGateway {
    async fn settle(&self, request: &SettlementRequest) -> SettlementOutcome {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let outcome = self.roll(request);
        debug!("💳️ Simulated settlement of {} for order {}: {outcome:?}", request.amount, request.order_id);
        outcome
    }
}

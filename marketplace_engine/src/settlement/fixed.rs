use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use log::*;

use crate::settlement::{SettlementGateway, SettlementOutcome, SettlementRequest};

/// Approves everything, with transaction ids derived from the payment id.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

impl SettlementGateway for ApproveAll {
    async fn settle(&self, request: &SettlementRequest) -> SettlementOutcome {
        SettlementOutcome::completed(format!("approved_{}", request.payment_id.value()))
    }
}

/// Declines everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineAll;

impl SettlementGateway for DeclineAll {
    async fn settle(&self, _request: &SettlementRequest) -> SettlementOutcome {
        SettlementOutcome::declined("card declined")
    }
}

/// Returns queued outcomes in order, then falls back to approving. Clones share the same queue.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<VecDeque<SettlementOutcome>>>,
    requests: Arc<Mutex<Vec<SettlementRequest>>>,
}

impl ScriptedGateway {
    pub fn new<I: IntoIterator<Item = SettlementOutcome>>(outcomes: I) -> Self {
        let script = Arc::new(Mutex::new(outcomes.into_iter().collect()));
        Self { script, requests: Arc::default() }
    }

    pub fn push(&self, outcome: SettlementOutcome) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(outcome);
        }
    }

    /// Every request this gateway has seen, in order.
    pub fn requests(&self) -> Vec<SettlementRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl SettlementGateway for ScriptedGateway {
    async fn settle(&self, request: &SettlementRequest) -> SettlementOutcome {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        let outcome =
            next.unwrap_or_else(|| SettlementOutcome::completed(format!("scripted_{}", request.payment_id.value())));
        trace!("💳️ Scripted settlement for {}: {outcome:?}", request.payment_id);
        outcome
    }
}

use chrono::Duration;
use log::*;
use marketplace_engine::{
    db_types::Order,
    events::EventProducers,
    settlement::SimulatedGateway,
    OrderFlowApi,
    SqliteDatabase,
};
use tokio::task::JoinHandle;

const EXPIRY_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60);

/// Starts the expiry worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every minute, pending orders that have been idle for longer than `unpaid_expiry` are cancelled and the stock they
/// hold is returned to inventory.
pub fn start_expiry_worker(
    db: SqliteDatabase,
    gateway: SimulatedGateway,
    producers: EventProducers,
    unpaid_expiry: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(EXPIRY_INTERVAL);
        let api = OrderFlowApi::new(db, gateway, producers);
        info!("🕰️ Unpaid order expiry worker started. Orders expire after {} hrs", unpaid_expiry.num_hours());
        loop {
            timer.tick().await;
            trace!("🕰️ Running unpaid order expiry job");
            match api.expire_stale_orders(unpaid_expiry).await {
                Ok(expired) if expired.is_empty() => trace!("🕰️ No orders expired"),
                Ok(expired) => {
                    info!("🕰️ {} orders expired", expired.len());
                    debug!("🕰️ Expired orders: {}", order_list(&expired));
                },
                Err(e) => {
                    error!("🕰️ Error running unpaid order expiry job: {e}");
                },
            }
        }
    })
}

fn order_list(orders: &[Order]) -> String {
    orders
        .iter()
        .map(|o| format!("[{}] seller: {} customer: {}", o.id, o.seller_id, o.customer_id.as_deref().unwrap_or("walk-in")))
        .collect::<Vec<String>>()
        .join(", ")
}

use chrono::Utc;
use log::debug;
use sqlx::SqliteConnection;

use super::products;
use crate::{
    db_types::{InventoryLogEntry, Order, Product, ProductId, StockChange, StockDelta},
    traits::FulfillmentError,
};

/// Appends an entry to the inventory log. This is not atomic with the stock change that it records, so callers must
/// run both inside the same transaction.
pub async fn append_log_entry(
    delta: &StockDelta,
    change: &StockChange,
    conn: &mut SqliteConnection,
) -> Result<InventoryLogEntry, FulfillmentError> {
    let entry = sqlx::query_as(
        r#"
            INSERT INTO inventory_log (
                product_id,
                delta,
                previous_quantity,
                new_quantity,
                change_type,
                reason,
                order_id,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(change.product_id)
    .bind(change.delta())
    .bind(change.previous_quantity)
    .bind(change.new_quantity)
    .bind(delta.change_type)
    .bind(&delta.reason)
    .bind(delta.order_id)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(entry)
}

/// Changes stock and logs the change. Run this inside a transaction.
pub async fn apply_delta(
    delta: &StockDelta,
    conn: &mut SqliteConnection,
) -> Result<(Product, StockChange), FulfillmentError> {
    let (product, change) = products::update_stock(delta, conn).await?;
    let entry = append_log_entry(delta, &change, conn).await?;
    debug!(
        "🗃️ Inventory log #{} for {}: {} {:+} ({})",
        entry.id, entry.product_id, entry.previous_quantity, entry.delta, entry.change_type
    );
    Ok((product, change))
}

pub async fn fetch_log_for_product(
    product_id: ProductId,
    conn: &mut SqliteConnection,
) -> Result<Vec<InventoryLogEntry>, sqlx::Error> {
    let entries = sqlx::query_as("SELECT * FROM inventory_log WHERE product_id = $1 ORDER BY id")
        .bind(product_id)
        .fetch_all(conn)
        .await?;
    Ok(entries)
}

/// Returns all the stock held by an order to inventory, with one `adjustment` entry per line that references the
/// order. Run this inside the same transaction that clears the order's hold.
pub async fn release_order_stock(
    order: &Order,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockChange>, FulfillmentError> {
    let mut released = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        let delta = StockDelta::release(line.product_id, line.quantity, order.id, reason);
        let (_, change) = apply_delta(&delta, conn).await?;
        released.push(change);
    }
    Ok(released)
}

/// Takes an order's stock out of inventory again, with one `sale` entry per line that references the order. Run this
/// inside the same transaction that sets the order's hold. Fails on the first line that cannot be satisfied.
pub async fn reserve_order_stock(
    order: &Order,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<StockChange>, FulfillmentError> {
    let mut reserved = Vec::with_capacity(order.lines.len());
    for line in &order.lines {
        let delta = StockDelta::sale(line.product_id, line.quantity).with_order(order.id).with_reason(reason);
        let (_, change) = apply_delta(&delta, conn).await?;
        reserved.push(change);
    }
    Ok(reserved)
}

use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{order_total, NewOrder, Order, OrderId, OrderLine, OrderStatus},
    traits::FulfillmentError,
};

/// Inserts a new order header with the given (already snapshotted) lines. The order starts out `pending`, with its
/// stock held.
///
/// If the idempotency key has already been used by the same actor, `AlreadyExists` is returned.
pub async fn insert_order(
    order: &NewOrder,
    lines: &[OrderLine],
    conn: &mut SqliteConnection,
) -> Result<Order, FulfillmentError> {
    let now = Utc::now();
    let total = order_total(lines)?;
    let order: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                customer_id,
                seller_id,
                placed_by,
                lines,
                total,
                status,
                payment_status,
                is_pos,
                shipping_address,
                stock_held,
                idempotency_key,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, 'pending', 'pending', $6, $7, 1, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(&order.customer_id)
    .bind(&order.seller_id)
    .bind(&order.placed_by)
    .bind(Json(lines))
    .bind(total)
    .bind(order.is_pos)
    .bind(&order.shipping_address)
    .bind(&order.idempotency_key)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            FulfillmentError::AlreadyExists(format!("order with idempotency key {:?}", order.idempotency_key))
        },
        _ => FulfillmentError::from(e),
    })?;
    debug!("🗃️ Order {} inserted for seller {} with total {}", order.id, order.seller_id, order.total);
    Ok(order)
}

pub async fn fetch_order(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_idempotency_key(
    placed_by: &str,
    key: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE placed_by = $1 AND idempotency_key = $2")
        .bind(placed_by)
        .bind(key)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_orders_for_customer(
    customer_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE customer_id = $1 ORDER BY id").bind(customer_id).fetch_all(conn).await
}

pub async fn fetch_orders_for_seller(seller_id: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE seller_id = $1 ORDER BY id").bind(seller_id).fetch_all(conn).await
}

/// Pending orders that have not been touched since `cutoff`.
pub async fn fetch_stale_orders(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE status = 'pending' AND updated_at < $1 ORDER BY id")
        .bind(cutoff)
        .fetch_all(conn)
        .await
}

/// Moves the order from `from` to `to`. Returns `None` if the order does not exist or is not currently in `from`.
pub async fn update_status(
    id: OrderId,
    from: OrderStatus,
    to: OrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4 RETURNING *")
        .bind(to)
        .bind(Utc::now())
        .bind(id)
        .bind(from)
        .fetch_optional(conn)
        .await
}

/// Marks a pending order as paid. Returns `None` if the order is no longer pending, or does not hold its stock.
pub async fn mark_paid(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET status = 'processing', payment_status = 'completed', updated_at = $1
            WHERE id = $2 AND status = 'pending' AND stock_held = 1
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Records a failed payment attempt against the order. An order that has already been paid is left untouched, and
/// `None` is returned.
pub async fn mark_payment_failed(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET payment_status = 'failed', updated_at = $1
            WHERE id = $2 AND payment_status != 'completed'
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Flags a pending order as holding its stock again. Returns `None` if the order is not pending, or already holds its
/// stock.
pub async fn reserve_hold(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET stock_held = 1, updated_at = $1
            WHERE id = $2 AND stock_held = 0 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Clears the stock hold on an unpaid (pending or cancelled) order. Returns `None` if there was no hold to clear. The
/// caller must return the stock in the same transaction.
pub async fn release_hold(id: OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE orders SET stock_held = 0, updated_at = $1
            WHERE id = $2 AND stock_held = 1 AND status IN ('pending', 'cancelled')
            RETURNING *;
        "#,
    )
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

use chrono::Utc;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentId},
    traits::FulfillmentError,
};

/// Inserts a `pending` payment. If the order already has a pending payment, `PaymentInProgress` is returned.
pub async fn insert_payment(payment: &NewPayment, conn: &mut SqliteConnection) -> Result<Payment, FulfillmentError> {
    let now = Utc::now();
    let new_payment = sqlx::query_as::<_, Payment>(
        r#"
            INSERT INTO payments (order_id, amount, method, status, metadata, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(payment.order_id)
    .bind(payment.amount)
    .bind(payment.method)
    .bind(Json(&payment.metadata))
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => FulfillmentError::PaymentInProgress(payment.order_id),
        _ => FulfillmentError::from(e),
    })?;
    Ok(new_payment)
}

pub async fn fetch_payment(id: PaymentId, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_payments_for_order(
    order_id: OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY id").bind(order_id).fetch_all(conn).await
}

/// Settles a pending payment. Returns `None` if the payment does not exist or has already been settled.
///
/// A second completed payment for the same order violates a unique index, and is reported as
/// `PaymentAlreadyCompleted`.
pub async fn mark_completed(
    id: PaymentId,
    transaction_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, FulfillmentError> {
    let payment = sqlx::query_as::<_, Payment>(
        r#"
            UPDATE payments SET status = 'completed', transaction_id = $1, updated_at = $2
            WHERE id = $3 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(transaction_id)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(&mut *conn)
    .await;
    match payment {
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            let order_id = fetch_payment(id, conn).await?.map(|p| p.order_id).unwrap_or_default();
            Err(FulfillmentError::PaymentAlreadyCompleted(order_id))
        },
        Err(e) => Err(e.into()),
        Ok(p) => Ok(p),
    }
}

/// Marks a pending payment as failed. Returns `None` if the payment does not exist or has already been settled.
///
/// A `transaction_id` is recorded when the gateway took the funds even though the payment could not be accepted.
pub async fn mark_failed(
    id: PaymentId,
    reason: &str,
    transaction_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE payments SET status = 'failed', failure_reason = $1, transaction_id = $2, updated_at = $3
            WHERE id = $4 AND status = 'pending'
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(transaction_id)
    .bind(Utc::now())
    .bind(id)
    .fetch_optional(conn)
    .await
}

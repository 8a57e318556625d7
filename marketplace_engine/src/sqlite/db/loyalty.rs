use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LoyaltyTransaction, NewLoyaltyTransaction, PaymentId},
    traits::FulfillmentError,
};

/// Inserts an earned-points transaction. Returns `None` if the payment has already been credited.
pub async fn insert_credit(
    credit: &NewLoyaltyTransaction,
    conn: &mut SqliteConnection,
) -> Result<Option<LoyaltyTransaction>, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO loyalty_transactions (customer_id, points, transaction_type, payment_id, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(&credit.customer_id)
    .bind(credit.points)
    .bind(credit.transaction_type)
    .bind(credit.payment_id)
    .bind(&credit.description)
    .bind(Utc::now())
    .fetch_optional(conn)
    .await
}

/// Inserts a redemption only if the customer's balance covers it. The balance check and the insert are a single
/// statement, so concurrent redemptions cannot overdraw the balance.
pub async fn insert_redemption(
    redemption: &NewLoyaltyTransaction,
    conn: &mut SqliteConnection,
) -> Result<LoyaltyTransaction, FulfillmentError> {
    let requested = -redemption.points;
    let inserted: Option<LoyaltyTransaction> = sqlx::query_as(
        r#"
            INSERT INTO loyalty_transactions (customer_id, points, transaction_type, payment_id, description, created_at)
            SELECT $1, $2, $3, NULL, $4, $5
            WHERE (SELECT COALESCE(SUM(points), 0) FROM loyalty_transactions WHERE customer_id = $1) >= $6
            RETURNING *;
        "#,
    )
    .bind(&redemption.customer_id)
    .bind(redemption.points)
    .bind(redemption.transaction_type)
    .bind(&redemption.description)
    .bind(Utc::now())
    .bind(requested)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(tx) => Ok(tx),
        None => {
            let available = balance(&redemption.customer_id, conn).await?;
            Err(FulfillmentError::InsufficientPoints {
                customer_id: redemption.customer_id.clone(),
                requested,
                available,
            })
        },
    }
}

pub async fn fetch_for_payment(
    payment_id: PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Option<LoyaltyTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM loyalty_transactions WHERE payment_id = $1").bind(payment_id).fetch_optional(conn).await
}

pub async fn balance(customer_id: &str, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let (balance,): (i64,) =
        sqlx::query_as("SELECT COALESCE(SUM(points), 0) FROM loyalty_transactions WHERE customer_id = $1")
            .bind(customer_id)
            .fetch_one(conn)
            .await?;
    Ok(balance)
}

pub async fn history(customer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<LoyaltyTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM loyalty_transactions WHERE customer_id = $1 ORDER BY id")
        .bind(customer_id)
        .fetch_all(conn)
        .await
}

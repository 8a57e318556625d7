use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{CartItem, ProductId},
    traits::FulfillmentError,
};

/// Adds to the cart, merging with an existing entry for the same product.
pub async fn add_item(
    customer_id: &str,
    product_id: ProductId,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<CartItem, FulfillmentError> {
    let item = sqlx::query_as(
        r#"
            INSERT INTO cart_items (customer_id, product_id, quantity, added_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (customer_id, product_id) DO UPDATE SET quantity = quantity + excluded.quantity
            RETURNING *;
        "#,
    )
    .bind(customer_id)
    .bind(product_id)
    .bind(quantity)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(item)
}

pub async fn fetch_cart(customer_id: &str, conn: &mut SqliteConnection) -> Result<Vec<CartItem>, sqlx::Error> {
    let items = sqlx::query_as("SELECT * FROM cart_items WHERE customer_id = $1 ORDER BY added_at, product_id")
        .bind(customer_id)
        .fetch_all(conn)
        .await?;
    Ok(items)
}

pub async fn remove_item(
    customer_id: &str,
    product_id: ProductId,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1 AND product_id = $2")
        .bind(customer_id)
        .bind(product_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}

pub async fn clear_cart(customer_id: &str, conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1").bind(customer_id).execute(conn).await?;
    Ok(result.rows_affected())
}

use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Customer, NewCustomer, NewSeller, Seller},
    traits::FulfillmentError,
};

pub async fn upsert_customer(customer: NewCustomer, conn: &mut SqliteConnection) -> Result<Customer, FulfillmentError> {
    let customer = sqlx::query_as(
        r#"
            INSERT INTO customers (id, name, email, created_at) VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE SET name = excluded.name, email = excluded.email
            RETURNING *;
        "#,
    )
    .bind(customer.id)
    .bind(customer.name)
    .bind(customer.email)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(customer)
}

pub async fn fetch_customer(id: &str, conn: &mut SqliteConnection) -> Result<Option<Customer>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM customers WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn upsert_seller(seller: NewSeller, conn: &mut SqliteConnection) -> Result<Seller, FulfillmentError> {
    let seller = sqlx::query_as(
        r#"
            INSERT INTO sellers (id, name, store_name, email, created_at) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                store_name = excluded.store_name,
                email = excluded.email
            RETURNING *;
        "#,
    )
    .bind(seller.id)
    .bind(seller.name)
    .bind(seller.store_name)
    .bind(seller.email)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(seller)
}

pub async fn fetch_seller(id: &str, conn: &mut SqliteConnection) -> Result<Option<Seller>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM sellers WHERE id = $1").bind(id).fetch_optional(conn).await
}

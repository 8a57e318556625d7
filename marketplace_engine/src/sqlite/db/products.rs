use chrono::Utc;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{ChangeType, Money, NewProduct, Product, ProductId, StockChange, StockDelta},
    traits::FulfillmentError,
};

/// Inserts a new product with zero stock. Initial stock must be added with a logged restock so that the inventory log
/// accounts for every unit.
pub async fn insert_product(product: &NewProduct, conn: &mut SqliteConnection) -> Result<Product, FulfillmentError> {
    let now = Utc::now();
    let product = sqlx::query_as(
        r#"
            INSERT INTO products (seller_id, name, price, stock, active, created_at, updated_at)
            VALUES ($1, $2, $3, 0, 1, $4, $4)
            RETURNING *;
        "#,
    )
    .bind(&product.seller_id)
    .bind(&product.name)
    .bind(product.price)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(product)
}

pub async fn fetch_product(id: ProductId, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn fetch_products(ids: &[ProductId], conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() {
        return Ok(vec![]);
    }
    let mut builder = QueryBuilder::new("SELECT * FROM products WHERE id IN (");
    let mut list = builder.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(") ORDER BY id");
    let products = builder.build_query_as::<Product>().fetch_all(conn).await?;
    Ok(products)
}

pub async fn fetch_products_for_seller(
    seller_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<Product>, sqlx::Error> {
    let products = sqlx::query_as("SELECT * FROM products WHERE seller_id = $1 ORDER BY id")
        .bind(seller_id)
        .fetch_all(conn)
        .await?;
    Ok(products)
}

pub async fn set_price(id: ProductId, price: Money, conn: &mut SqliteConnection) -> Result<Product, FulfillmentError> {
    let product = sqlx::query_as("UPDATE products SET price = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(price)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(FulfillmentError::ProductNotFound(id))?;
    Ok(product)
}

pub async fn set_active(id: ProductId, active: bool, conn: &mut SqliteConnection) -> Result<Product, FulfillmentError> {
    let product = sqlx::query_as("UPDATE products SET active = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(active)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or(FulfillmentError::ProductNotFound(id))?;
    Ok(product)
}

/// Applies `delta` to the product's stock with a single conditional write. The write only succeeds if the resulting
/// stock is non-negative, and (for sales) if the product is active. No inventory log entry is written; see
/// [`super::inventory::apply_delta`].
///
/// Returns the updated product row, which doubles as the price and name snapshot for order lines.
pub async fn update_stock(
    delta: &StockDelta,
    conn: &mut SqliteConnection,
) -> Result<(Product, StockChange), FulfillmentError> {
    let updated: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET stock = stock + $1, updated_at = $2
            WHERE id = $3 AND stock + $1 >= 0 AND (active = 1 OR $4 != 'sale')
            RETURNING *;
        "#,
    )
    .bind(delta.delta)
    .bind(Utc::now())
    .bind(delta.product_id)
    .bind(delta.change_type)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(product) => {
            let change = StockChange {
                product_id: product.id,
                previous_quantity: product.stock - delta.delta,
                new_quantity: product.stock,
            };
            trace!("🗃️ Stock for {} moved from {} to {}", product.id, change.previous_quantity, change.new_quantity);
            Ok((product, change))
        },
        None => {
            let product =
                fetch_product(delta.product_id, conn).await?.ok_or(FulfillmentError::ProductNotFound(delta.product_id))?;
            if !product.active && delta.change_type == ChangeType::Sale {
                Err(FulfillmentError::ProductUnavailable(product.id))
            } else {
                Err(FulfillmentError::InsufficientStock {
                    product_id: product.id,
                    requested: -delta.delta,
                    available: product.stock,
                })
            }
        },
    }
}

use crate::{
    db_types::{InventoryLogEntry, Money, NewProduct, Product, ProductId, StockChange, StockDelta},
    traits::FulfillmentError,
};

/// Products and their stock levels.
///
/// Stock is never written directly. Every change goes through [`InventoryManagement::apply_delta`] (or one of the
/// multi-table units of work on [`crate::traits::FulfillmentDatabase`]), which applies the change and appends the
/// corresponding inventory log entry atomically.
#[allow(async_fn_in_trait)]
pub trait InventoryManagement {
    /// Creates a product. A positive `initial_stock` is recorded as a `restock` log entry.
    async fn create_product(&self, product: NewProduct) -> Result<Product, FulfillmentError>;

    async fn fetch_product(&self, id: ProductId) -> Result<Option<Product>, FulfillmentError>;

    /// Fetches the requested products. Unknown ids are silently skipped.
    async fn fetch_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, FulfillmentError>;

    async fn fetch_products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>, FulfillmentError>;

    /// Changes the list price. Orders that were already placed keep the price they were snapshotted with.
    async fn set_price(&self, id: ProductId, price: Money) -> Result<Product, FulfillmentError>;

    async fn set_active(&self, id: ProductId, active: bool) -> Result<Product, FulfillmentError>;

    /// Applies a stock movement and appends the log entry in one unit of work.
    ///
    /// Fails with `InsufficientStock` if the resulting stock would be negative, and with `ProductUnavailable` if a
    /// sale is attempted against an inactive product.
    async fn apply_delta(&self, delta: StockDelta) -> Result<StockChange, FulfillmentError>;

    /// The full log for a product, oldest first.
    async fn fetch_inventory_log(&self, id: ProductId) -> Result<Vec<InventoryLogEntry>, FulfillmentError>;
}

use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Actor, ChangeType, InventoryLogEntry, Money, NewProduct, Product, ProductId, StockChange, StockDelta},
    events::{publish_to_all, EventProducers, LowStockEvent},
    mkt_api::{order_flow_api::DEFAULT_LOW_STOCK_THRESHOLD, order_objects::InventoryAudit, order_objects::StockAdjustment},
    traits::{DirectoryManagement, FulfillmentError, InventoryManagement},
};

/// Seller-facing product and stock management.
///
/// Every stock change made here goes through [`InventoryManagement::apply_delta`], the same primitive checkout uses,
/// so manual corrections land in the same audit chain as sales.
pub struct InventoryApi<B> {
    db: B,
    producers: EventProducers,
    low_stock_threshold: i64,
}

impl<B> Debug for InventoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InventoryApi")
    }
}

impl<B> InventoryApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers, low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD }
    }

    pub fn with_low_stock_threshold(mut self, threshold: i64) -> Self {
        self.low_stock_threshold = threshold;
        self
    }
}

impl<B> InventoryApi<B>
where B: InventoryManagement + DirectoryManagement
{
    pub async fn create_product(&self, actor: &Actor, product: NewProduct) -> Result<Product, FulfillmentError> {
        if !actor.acts_for_seller(&product.seller_id) {
            return Err(FulfillmentError::Unauthorized(format!(
                "{actor} cannot list products for {}",
                product.seller_id
            )));
        }
        if product.name.trim().is_empty() {
            return Err(FulfillmentError::ValidationError("Product name cannot be empty".to_string()));
        }
        if product.price.is_negative() {
            return Err(FulfillmentError::ValidationError(format!("Invalid price: {}", product.price)));
        }
        if product.initial_stock < 0 {
            return Err(FulfillmentError::ValidationError(format!(
                "Initial stock cannot be negative ({})",
                product.initial_stock
            )));
        }
        if self.db.fetch_seller(&product.seller_id).await?.is_none() {
            return Err(FulfillmentError::SellerNotFound(product.seller_id));
        }
        let product = self.db.create_product(product).await?;
        info!("📦️ {actor} listed {} ({}) at {} with {} in stock", product.id, product.name, product.price, product.stock);
        Ok(product)
    }

    pub async fn product(&self, id: ProductId) -> Result<Product, FulfillmentError> {
        self.db.fetch_product(id).await?.ok_or(FulfillmentError::ProductNotFound(id))
    }

    pub async fn products_for_seller(&self, seller_id: &str) -> Result<Vec<Product>, FulfillmentError> {
        self.db.fetch_products_for_seller(seller_id).await
    }

    /// Manual stock correction by the product's seller (or an admin).
    ///
    /// Without an explicit change type, positive changes are logged as `restock` and negative ones as `adjustment`.
    /// Sales can only be recorded by checkout.
    pub async fn adjust_stock(
        &self,
        actor: &Actor,
        product_id: ProductId,
        adjustment: StockAdjustment,
    ) -> Result<StockChange, FulfillmentError> {
        let product = self.owned_product(actor, product_id).await?;
        let qty = adjustment.quantity_change;
        if qty == 0 {
            return Err(FulfillmentError::ValidationError("Stock adjustments cannot be zero".to_string()));
        }
        let change_type = match adjustment.change_type {
            None if qty > 0 => ChangeType::Restock,
            None => ChangeType::Adjustment,
            Some(ChangeType::Sale) => {
                return Err(FulfillmentError::ValidationError("Sales are recorded by checkout only".to_string()))
            },
            Some(t @ (ChangeType::Restock | ChangeType::Return)) if qty < 0 => {
                return Err(FulfillmentError::ValidationError(format!("A {t} cannot reduce stock")))
            },
            Some(t) => t,
        };
        let mut delta = StockDelta::new(product.id, qty, change_type);
        if let Some(reason) = adjustment.reason {
            delta = delta.with_reason(reason);
        }
        let change = self.db.apply_delta(delta).await?;
        info!(
            "📦️ {actor} adjusted stock for {product_id} by {qty} ({change_type}): {} -> {}",
            change.previous_quantity, change.new_quantity
        );
        if qty < 0 && change.new_quantity <= self.low_stock_threshold {
            let event =
                LowStockEvent { product_id, stock: change.new_quantity, threshold: self.low_stock_threshold };
            publish_to_all(&self.producers.low_stock_producer, event).await;
        }
        Ok(change)
    }

    /// Changes the list price. Orders already placed keep their snapshotted prices.
    pub async fn set_price(&self, actor: &Actor, id: ProductId, price: Money) -> Result<Product, FulfillmentError> {
        self.owned_product(actor, id).await?;
        if price.is_negative() {
            return Err(FulfillmentError::ValidationError(format!("Invalid price: {price}")));
        }
        let product = self.db.set_price(id, price).await?;
        info!("📦️ {actor} changed the price of {id} to {price}");
        Ok(product)
    }

    pub async fn set_active(&self, actor: &Actor, id: ProductId, active: bool) -> Result<Product, FulfillmentError> {
        self.owned_product(actor, id).await?;
        let product = self.db.set_active(id, active).await?;
        info!("📦️ {actor} set {id} active={active}");
        Ok(product)
    }

    /// The product's full audit chain, checked against its current stock.
    pub async fn inventory_audit(&self, actor: &Actor, id: ProductId) -> Result<InventoryAudit, FulfillmentError> {
        let product = self.owned_product(actor, id).await?;
        let entries = self.db.fetch_inventory_log(id).await?;
        let consistent = verify_chain(&entries, product.stock);
        if !consistent {
            error!("📦️ The inventory log for {id} does not reproduce its current stock of {}", product.stock);
        }
        Ok(InventoryAudit { product_id: id, current_stock: product.stock, entries, consistent })
    }

    async fn owned_product(&self, actor: &Actor, id: ProductId) -> Result<Product, FulfillmentError> {
        let product = self.product(id).await?;
        if !actor.acts_for_seller(&product.seller_id) {
            return Err(FulfillmentError::Unauthorized(format!("{actor} does not manage {id}")));
        }
        Ok(product)
    }
}

/// Replays an inventory log from zero. The chain is valid if every entry starts where the previous one ended, every
/// entry's delta accounts for its own movement, and the final quantity equals `stock`.
pub fn verify_chain(entries: &[InventoryLogEntry], stock: i64) -> bool {
    let mut level = 0;
    for entry in entries {
        if entry.previous_quantity != level || entry.previous_quantity + entry.delta != entry.new_quantity {
            return false;
        }
        level = entry.new_quantity;
    }
    level == stock
}

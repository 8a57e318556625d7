use std::collections::HashMap;

use cucumber::World;
use log::*;
use marketplace_engine::{
    db_types::{Order, Product},
    events::EventProducers,
    order_objects::PaymentOutcome,
    settlement::ScriptedGateway,
    test_utils::{
        prepare_env::{create_database, random_db_path, run_migrations},
        seed_directory,
    },
    FulfillmentError,
    InventoryApi,
    OrderFlowApi,
    SqliteDatabase,
};

#[derive(Default, Debug, World)]
pub struct MarketplaceWorld {
    pub system: Option<MarketplaceSystem>,
    pub products: HashMap<String, Product>,
    pub orders: Vec<Order>,
    pub errors: Vec<FulfillmentError>,
    pub last_outcome: Option<PaymentOutcome>,
}

#[derive(Debug)]
pub struct MarketplaceSystem {
    pub db_path: String,
    pub flow: OrderFlowApi<SqliteDatabase, ScriptedGateway>,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub gateway: ScriptedGateway,
}

impl MarketplaceWorld {
    pub fn system(&self) -> &MarketplaceSystem {
        self.system.as_ref().expect("Marketplace not initialised")
    }

    pub fn product(&self, name: &str) -> &Product {
        self.products.get(name).unwrap_or_else(|| panic!("No product named {name}"))
    }

    pub fn last_order(&self) -> &Order {
        self.orders.last().expect("No orders have been placed")
    }

    pub fn last_outcome(&self) -> &PaymentOutcome {
        self.last_outcome.as_ref().expect("No payments have been made")
    }
}

impl MarketplaceSystem {
    pub async fn new() -> Self {
        let url = prepare_test_env().await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        seed_directory(&db).await.expect("Error seeding directory");
        debug!("Created database: {url}");
        let gateway = ScriptedGateway::default();
        let flow = OrderFlowApi::new(db.clone(), gateway.clone(), EventProducers::default());
        let inventory = InventoryApi::new(db, EventProducers::default());
        Self { db_path: url, flow, inventory, gateway }
    }
}

pub async fn prepare_test_env() -> String {
    let path = random_db_path();
    create_database(&path).await;
    run_migrations(&path).await;
    path
}

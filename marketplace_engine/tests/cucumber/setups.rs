use cucumber::given;
use marketplace_engine::{
    db_types::{Actor, Money, NewProduct},
    settlement::SettlementOutcome,
    CartManagement,
};

use crate::cucumber::{marketplace_world::MarketplaceSystem, MarketplaceWorld};

#[given("a fresh install")]
async fn fresh_database(world: &mut MarketplaceWorld) {
    let system = MarketplaceSystem::new().await;
    world.system = Some(system);
}

#[given(expr = "seller '{word}' lists '{word}' at {word} with {int} in stock")]
async fn list_product(world: &mut MarketplaceWorld, seller: String, name: String, price: String, stock: i64) {
    let price = price.parse::<Money>().expect("Invalid price");
    let product = world
        .system()
        .inventory
        .create_product(&Actor::seller(seller.as_str()), NewProduct::new(seller.as_str(), name.as_str(), price, stock))
        .await
        .expect("Error listing product");
    world.products.insert(name, product);
}

#[given(expr = "'{word}' adds {int} '{word}' to the cart")]
async fn add_to_cart(world: &mut MarketplaceWorld, customer: String, quantity: i64, name: String) {
    let product_id = world.product(&name).id;
    world.system().flow.db().add_to_cart(&customer, product_id, quantity).await.expect("Error adding to cart");
}

#[given(expr = "the gateway will decline with {string}")]
async fn scripted_decline(world: &mut MarketplaceWorld, reason: String) {
    world.system().gateway.push(SettlementOutcome::declined(reason));
}

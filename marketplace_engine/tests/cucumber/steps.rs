use cucumber::{then, when};
use futures_util::future::join_all;
use marketplace_engine::{
    db_types::{Actor, ChangeType, Money, OrderStatus, PaymentMethod, PaymentStatus},
    order_objects::{CheckoutItem, CheckoutRequest, PaymentOutcome, PaymentRequest},
    CartManagement,
    FulfillmentError,
    InventoryManagement,
    LoyaltyManagement,
};

use crate::cucumber::MarketplaceWorld;

fn money(s: &str) -> Money {
    s.parse::<Money>().unwrap_or_else(|e| panic!("Invalid amount {s}: {e}"))
}

fn method(s: &str) -> PaymentMethod {
    match s {
        "cash" => PaymentMethod::Cash,
        "card" => PaymentMethod::Card,
        "bank transfer" | "bank_transfer" => PaymentMethod::BankTransfer,
        "wallet" => PaymentMethod::Wallet,
        _ => panic!("Unknown payment method {s}"),
    }
}

#[when(expr = "'{word}' checks out the cart")]
async fn checkout_cart(world: &mut MarketplaceWorld, customer: String) {
    let actor = Actor::customer(customer.as_str());
    match world.system().flow.checkout(&actor, CheckoutRequest::from_cart()).await {
        Ok(result) => world.orders.push(result.order),
        Err(e) => world.errors.push(e),
    }
}

#[when(expr = "'{word}' and '{word}' each check out {int} '{word}' at the same time")]
async fn racing_checkouts(world: &mut MarketplaceWorld, first: String, second: String, quantity: i64, name: String) {
    let product_id = world.product(&name).id;
    let buyers = [first, second];
    for buyer in &buyers {
        world.system().flow.db().add_to_cart(buyer, product_id, quantity).await.expect("Error adding to cart");
    }
    let actors = buyers.iter().map(|b| Actor::customer(b.as_str())).collect::<Vec<_>>();
    let flow = &world.system().flow;
    let results = join_all(actors.iter().map(|a| flow.checkout(a, CheckoutRequest::from_cart()))).await;
    for result in results {
        match result {
            Ok(r) => world.orders.push(r.order),
            Err(e) => world.errors.push(e),
        }
    }
}

#[when(expr = "seller '{word}' rings up {int} '{word}' and takes {word} in cash")]
async fn pos_cash_sale(world: &mut MarketplaceWorld, seller: String, quantity: i64, name: String, tendered: String) {
    let product_id = world.product(&name).id;
    let actor = Actor::seller(seller.as_str());
    let request = CheckoutRequest::point_of_sale(vec![CheckoutItem::new(product_id, quantity)]);
    let order = world.system().flow.checkout(&actor, request).await.expect("Error ringing up sale").order;
    let payment = PaymentRequest::new(order.id, order.total, PaymentMethod::Cash).with_cash_tendered(money(&tendered));
    let outcome = world.system().flow.submit_payment(&actor, payment).await.expect("Error taking payment");
    world.orders.push(order);
    world.last_outcome = Some(outcome);
}

#[when(expr = "'{word}' pays for the order by {word}")]
async fn pay_for_order(world: &mut MarketplaceWorld, customer: String, via: String) {
    let order = world.last_order().clone();
    let actor = Actor::customer(customer.as_str());
    let request = PaymentRequest::new(order.id, order.total, method(&via));
    match world.system().flow.submit_payment(&actor, request).await {
        Ok(outcome) => world.last_outcome = Some(outcome),
        Err(e) => world.errors.push(e),
    }
}

#[when("the settlement is confirmed again")]
async fn confirm_again(world: &mut MarketplaceWorld) {
    let payment_id = world.last_outcome().payment().id;
    world.system().flow.confirm_settlement(payment_id).await.expect("Error confirming settlement");
}

#[then(expr = "exactly {int} order(s) created with total {word}")]
async fn orders_created(world: &mut MarketplaceWorld, count: usize, total: String) {
    assert_eq!(world.orders.len(), count);
    let total = money(&total);
    assert!(world.orders.iter().all(|o| o.total == total));
}

#[then(expr = "the other checkout fails with insufficient stock of '{word}', requested {int}, available {int}")]
async fn insufficient_stock(world: &mut MarketplaceWorld, name: String, requested: i64, available: i64) {
    let product_id = world.product(&name).id;
    assert_eq!(world.errors, vec![FulfillmentError::InsufficientStock { product_id, requested, available }]);
}

#[then(expr = "'{word}' has {int} in stock")]
async fn stock_level(world: &mut MarketplaceWorld, name: String, stock: i64) {
    let product_id = world.product(&name).id;
    let product = world.system().flow.db().fetch_product(product_id).await.unwrap().expect("Product is missing");
    assert_eq!(product.stock, stock);
}

#[then("the payment is completed")]
async fn payment_completed(world: &mut MarketplaceWorld) {
    let outcome = world.last_outcome();
    assert!(outcome.is_completed(), "Payment was not completed: {outcome:?}");
    assert_eq!(outcome.payment().status, PaymentStatus::Completed);
    assert_eq!(outcome.order().status, OrderStatus::Processing);
}

#[then(expr = "the payment is declined with {string}")]
async fn payment_declined(world: &mut MarketplaceWorld, reason: String) {
    let PaymentOutcome::Declined { payment, .. } = world.last_outcome() else {
        panic!("Payment was not declined");
    };
    assert_eq!(payment.status, PaymentStatus::Failed);
    assert_eq!(payment.failure_reason.as_deref(), Some(reason.as_str()));
}

#[then(expr = "the change due is {word}")]
async fn change_due(world: &mut MarketplaceWorld, change: String) {
    assert_eq!(world.last_outcome().payment().metadata.change_due, Some(money(&change)));
}

#[then(expr = "the order status is {word} and its payment status is {word}")]
async fn order_statuses(world: &mut MarketplaceWorld, status: String, payment_status: String) {
    let id = world.last_order().id;
    let order = world.system().flow.fetch_order(id).await.expect("Error fetching order");
    assert_eq!(order.status.to_string(), status);
    assert_eq!(order.payment_status.to_string(), payment_status);
}

#[then(expr = "the last inventory entry for '{word}' is an adjustment of {int} for the order")]
async fn compensating_entry(world: &mut MarketplaceWorld, name: String, delta: i64) {
    let product_id = world.product(&name).id;
    let order_id = world.last_order().id;
    let log = world.system().flow.db().fetch_inventory_log(product_id).await.expect("Error fetching log");
    let last = log.last().expect("Inventory log is empty");
    assert_eq!(last.change_type, ChangeType::Adjustment);
    assert_eq!(last.delta, delta);
    assert_eq!(last.order_id, Some(order_id));
    assert_eq!(last.previous_quantity + last.delta, last.new_quantity);
}

#[then(expr = "'{word}' has {int} loyalty points")]
async fn loyalty_points(world: &mut MarketplaceWorld, customer: String, points: i64) {
    let balance = world.system().flow.db().fetch_loyalty_balance(&customer).await.expect("Error fetching balance");
    assert_eq!(balance, points);
    let history = world.system().flow.db().fetch_loyalty_history(&customer).await.expect("Error fetching history");
    let payment_id = world.last_outcome().payment().id;
    assert_eq!(history.iter().filter(|t| t.payment_id == Some(payment_id)).count(), 1);
}

#[then(expr = "the cart of '{word}' is empty")]
async fn cart_is_empty(world: &mut MarketplaceWorld, customer: String) {
    let cart = world.system().flow.db().fetch_cart(&customer).await.expect("Error fetching cart");
    assert!(cart.is_empty());
}

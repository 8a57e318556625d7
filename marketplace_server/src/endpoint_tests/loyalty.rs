use actix_web::http::StatusCode;
use marketplace_engine::{
    db_types::Role,
    test_utils::{CUSTOMER, OTHER_CUSTOMER, SELLER},
};
use serde_json::json;

use super::helpers::{get, post, TestApp};

/// Alice buys 25.000 worth of goods by card, earning 25 points.
async fn earn_points(app: &TestApp) {
    let kettle = app.product(SELLER, "Kettle", 25, 3).await;
    let item = json!({ "product_id": kettle.id, "quantity": 1 });
    let (status, _) = app.call(post("/cart/items", CUSTOMER, Role::Customer, item)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.call_json(post("/orders", CUSTOMER, Role::Customer, json!({}))).await;
    let payment = json!({ "order_id": body["order"]["id"], "amount": 25_000, "method": "card" });
    let (status, _) = app.call(post("/payments", CUSTOMER, Role::Customer, payment)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn customers_see_only_their_own_points() {
    let app = TestApp::new().await;
    earn_points(&app).await;
    let path = format!("/customers/{CUSTOMER}/loyalty");
    let (status, summary) = app.call_json(get(&path, CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["customer_id"], CUSTOMER);
    assert_eq!(summary["balance"], 25);
    assert_eq!(summary["transactions"][0]["transaction_type"], "earned");
    let (status, _) = app.call(get(&path, OTHER_CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(get(&path, SELLER, Role::Seller)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(get(&path, "root", Role::Admin)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn redemptions_cannot_overdraw_the_balance() {
    let app = TestApp::new().await;
    earn_points(&app).await;
    let path = format!("/customers/{CUSTOMER}/loyalty/redeem");
    let redeem = json!({ "points": 10, "description": "Free coffee" });
    let (status, tx) = app.call_json(post(&path, CUSTOMER, Role::Customer, redeem)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tx["points"], -10);
    assert_eq!(tx["transaction_type"], "redeemed");
    let (status, body) = app.call_json(post(&path, CUSTOMER, Role::Customer, json!({ "points": 16 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("has 15 loyalty points, but 16 were requested"));
    let (status, _) = app.call(post(&path, CUSTOMER, Role::Customer, json!({ "points": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.call(post(&path, OTHER_CUSTOMER, Role::Customer, json!({ "points": 1 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, summary) = app.call_json(get(&format!("/customers/{CUSTOMER}/loyalty"), CUSTOMER, Role::Customer)).await;
    assert_eq!(summary["balance"], 15);
}

use actix_web::http::StatusCode;
use marketplace_engine::{
    db_types::Role,
    settlement::SettlementOutcome,
    test_utils::{CUSTOMER, OTHER_SELLER, SELLER},
};
use serde_json::{json, Value};

use super::helpers::{get, post, TestApp};

async fn pos_sale(app: &TestApp, seller: &str, stock: i64) -> (i64, Value) {
    let sandwich = app.product(SELLER, "Sandwich", 7, stock).await;
    let sale = json!({ "items": [{ "product_id": sandwich.id, "quantity": 1 }] });
    let (status, body) = app.call_json(post("/orders", seller, Role::Seller, sale)).await;
    assert_eq!(status, StatusCode::CREATED);
    (sandwich.id.value(), body["order"].clone())
}

async fn stock_of(app: &TestApp, product_id: i64) -> i64 {
    let (_, product) = app.call_json(get(&format!("/products/{product_id}"), SELLER, Role::Seller)).await;
    product["stock"].as_i64().unwrap()
}

#[actix_web::test]
async fn cash_sale_records_change() {
    let app = TestApp::new().await;
    let (_, order) = pos_sale(&app, SELLER, 5).await;
    let payment = json!({ "order_id": order["id"], "amount": 7_000, "method": "cash", "cash_tendered": 10_000 });
    let (status, outcome) = app.call_json(post("/payments", SELLER, Role::Seller, payment)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "completed");
    assert_eq!(outcome["payment"]["status"], "completed");
    assert_eq!(outcome["payment"]["metadata"]["cash_tendered"], 10_000);
    assert_eq!(outcome["payment"]["metadata"]["change_due"], 3_000);
    assert_eq!(outcome["order"]["status"], "processing");
    assert_eq!(outcome["order"]["payment_status"], "completed");
    // Walk-in sales earn no points
    assert_eq!(outcome["loyalty"], Value::Null);
}

#[actix_web::test]
async fn other_sellers_cannot_ring_up_a_sale() {
    let app = TestApp::new().await;
    let sandwich = app.product(SELLER, "Sandwich", 7, 5).await;
    let sale = json!({ "items": [{ "product_id": sandwich.id, "quantity": 1 }] });
    let (status, _) = app.call(post("/orders", OTHER_SELLER, Role::Seller, sale)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(stock_of(&app, sandwich.id.value()).await, 5);
}

#[actix_web::test]
async fn declined_payment_is_402_and_releases_stock() {
    let app = TestApp::new().await;
    let (product_id, order) = pos_sale(&app, SELLER, 5).await;
    assert_eq!(stock_of(&app, product_id).await, 4);
    app.gateway.push(SettlementOutcome::declined("card declined"));
    let payment = json!({ "order_id": order["id"], "amount": 7_000, "method": "card" });
    let (status, outcome) = app.call_json(post("/payments", SELLER, Role::Seller, payment.clone())).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(outcome["outcome"], "declined");
    assert_eq!(outcome["payment"]["status"], "failed");
    assert_eq!(outcome["payment"]["failure_reason"], "card declined");
    assert_eq!(outcome["order"]["status"], "pending");
    assert_eq!(outcome["order"]["payment_status"], "failed");
    assert_eq!(outcome["released"][0]["new_quantity"], 5);
    assert_eq!(stock_of(&app, product_id).await, 5);
    // The retry takes the stock again
    let (status, outcome) = app.call_json(post("/payments", SELLER, Role::Seller, payment)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["outcome"], "completed");
    assert_eq!(stock_of(&app, product_id).await, 4);
}

#[actix_web::test]
async fn payment_must_match_the_order_total() {
    let app = TestApp::new().await;
    let (_, order) = pos_sale(&app, SELLER, 5).await;
    let payment = json!({ "order_id": order["id"], "amount": 6_999, "method": "card" });
    let (status, body) = app.call_json(post("/payments", SELLER, Role::Seller, payment)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("does not match the order total"));
    assert!(app.gateway.requests().is_empty());
}

#[actix_web::test]
async fn paid_orders_cannot_be_paid_twice() {
    let app = TestApp::new().await;
    let (_, order) = pos_sale(&app, SELLER, 5).await;
    let payment = json!({ "order_id": order["id"], "amount": 7_000, "method": "cash" });
    let (status, _) = app.call(post("/payments", SELLER, Role::Seller, payment.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(post("/payments", SELLER, Role::Seller, payment)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(app.gateway.requests().len(), 1);
}

#[actix_web::test]
async fn malformed_payments_are_bad_requests() {
    let app = TestApp::new().await;
    let (_, order) = pos_sale(&app, SELLER, 5).await;
    let payment = json!({ "order_id": order["id"], "amount": 7_000, "method": "cheque" });
    let (status, body) = app.call_json(post("/payments", SELLER, Role::Seller, payment)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn settlement_confirmation_is_admin_only_and_idempotent() {
    let app = TestApp::new().await;
    let lamp = app.product(SELLER, "Lamp", 12, 5).await;
    let sale = json!({ "items": [{ "product_id": lamp.id, "quantity": 1 }], "customer_id": CUSTOMER });
    let (_, body) = app.call_json(post("/orders", SELLER, Role::Seller, sale)).await;
    let order = &body["order"];
    let payment = json!({ "order_id": order["id"], "amount": 12_000, "method": "card" });
    let (status, outcome) = app.call_json(post("/payments", CUSTOMER, Role::Customer, payment)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["loyalty"]["points"], 12);
    let path = format!("/payments/{}/confirm", outcome["payment"]["id"]);
    let (status, _) = app.call(post(&path, CUSTOMER, Role::Customer, json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    for _ in 0..2 {
        let (status, credit) = app.call_json(post(&path, "root", Role::Admin, json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(credit["result"], "already_credited");
        assert_eq!(credit["transaction"]["points"], 12);
    }
    let (_, summary) = app.call_json(get(&format!("/customers/{CUSTOMER}/loyalty"), CUSTOMER, Role::Customer)).await;
    assert_eq!(summary["balance"], 12);
    let (status, _) = app.call(post("/payments/404/confirm", "root", Role::Admin, json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

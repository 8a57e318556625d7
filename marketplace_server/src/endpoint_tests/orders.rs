use actix_web::{http::StatusCode, test::TestRequest};
use marketplace_engine::{
    db_types::Role,
    test_utils::{CUSTOMER, OTHER_CUSTOMER, OTHER_SELLER, SELLER},
};
use serde_json::{json, Value};

use super::helpers::{get, post, put, TestApp};

async fn cart_order(app: &TestApp, quantity: i64) -> Value {
    let lamp = app.product(SELLER, "Lamp", 10, 3).await;
    let item = json!({ "product_id": lamp.id, "quantity": quantity });
    let (status, _) = app.call(post("/cart/items", CUSTOMER, Role::Customer, item)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.call_json(post("/orders", CUSTOMER, Role::Customer, json!({}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["order"].clone()
}

#[actix_web::test]
async fn checkout_without_actor_is_rejected() {
    let app = TestApp::new().await;
    let req = TestRequest::post().uri("/orders").set_json(json!({}));
    let (status, body) = app.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("x-actor-id"), "{body}");
}

#[actix_web::test]
async fn unknown_roles_are_rejected() {
    let app = TestApp::new().await;
    let req = TestRequest::post()
        .uri("/orders")
        .insert_header(("x-actor-id", "mallory"))
        .insert_header(("x-actor-role", "root"))
        .set_json(json!({}));
    let (status, _) = app.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn cart_checkout_takes_stock_and_empties_cart() {
    let app = TestApp::new().await;
    let order = cart_order(&app, 2).await;
    assert_eq!(order["total"], 20_000);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["customer_id"], CUSTOMER);
    assert_eq!(order["lines"][0]["unit_price"], 10_000);
    let product_id = order["lines"][0]["product_id"].as_i64().unwrap();
    let (_, product) = app.call_json(get(&format!("/products/{product_id}"), CUSTOMER, Role::Customer)).await;
    assert_eq!(product["stock"], 1);
    let (status, cart) = app.call_json(get("/cart", CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart, json!([]));
}

#[actix_web::test]
async fn empty_cart_cannot_be_checked_out() {
    let app = TestApp::new().await;
    let (status, body) = app.call_json(post("/orders", CUSTOMER, Role::Customer, json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot check out an empty cart");
}

#[actix_web::test]
async fn overselling_is_a_conflict() {
    let app = TestApp::new().await;
    let lamp = app.product(SELLER, "Lamp", 10, 1).await;
    let sale = json!({ "items": [{ "product_id": lamp.id, "quantity": 2 }] });
    let (status, body) = app.call_json(post("/orders", SELLER, Role::Seller, sale)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let msg = body["error"].as_str().unwrap();
    assert!(msg.contains("Requested 2, but only 1 available"), "{msg}");
    let (_, product) = app.call_json(get(&format!("/products/{}", lamp.id), SELLER, Role::Seller)).await;
    assert_eq!(product["stock"], 1);
}

#[actix_web::test]
async fn repeated_idempotency_key_returns_the_original_order() {
    let app = TestApp::new().await;
    let lamp = app.product(SELLER, "Lamp", 10, 5).await;
    let sale = json!({ "items": [{ "productId": lamp.id, "quantity": 1 }], "idempotencyKey": "till-1-0042" });
    let (status, first) = app.call_json(post("/orders", SELLER, Role::Seller, sale.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["created"], true);
    let (status, second) = app.call_json(post("/orders", SELLER, Role::Seller, sale)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["created"], false);
    assert_eq!(first["order"]["id"], second["order"]["id"]);
    let (_, product) = app.call_json(get(&format!("/products/{}", lamp.id), SELLER, Role::Seller)).await;
    assert_eq!(product["stock"], 4);
}

#[actix_web::test]
async fn orders_are_only_visible_to_their_parties() {
    let app = TestApp::new().await;
    let order = cart_order(&app, 1).await;
    let path = format!("/orders/{}", order["id"]);
    let (status, _) = app.call(get(&path, CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(get(&path, SELLER, Role::Seller)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(get(&path, "root", Role::Admin)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.call(get(&path, OTHER_CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(get(&path, OTHER_SELLER, Role::Seller)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(get("/orders/999", "root", Role::Admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn status_changes_follow_the_order_lifecycle() {
    let app = TestApp::new().await;
    let order = cart_order(&app, 1).await;
    let path = format!("/orders/{}", order["id"]);
    let shipped = json!({ "status": "shipped" });
    // Not paid yet
    let (status, _) = app.call(put(&path, SELLER, Role::Seller, shipped.clone())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let payment = json!({ "order_id": order["id"], "amount": order["total"], "method": "card" });
    let (status, _) = app.call(post("/payments", CUSTOMER, Role::Customer, payment)).await;
    assert_eq!(status, StatusCode::OK);
    // Customers can only cancel
    let (status, _) = app.call(put(&path, CUSTOMER, Role::Customer, shipped.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, body) = app.call_json(put(&path, SELLER, Role::Seller, shipped)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "shipped");
    let (status, body) = app.call_json(put(&path, SELLER, Role::Seller, json!({ "status": "delivered" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "delivered");
    let (status, _) = app.call(put(&path, "root", Role::Admin, json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn cancelling_releases_stock() {
    let app = TestApp::new().await;
    let order = cart_order(&app, 2).await;
    let product_id = order["lines"][0]["product_id"].as_i64().unwrap();
    let path = format!("/orders/{}", order["id"]);
    let (status, body) = app.call_json(put(&path, CUSTOMER, Role::Customer, json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["stock_held"], false);
    let (_, product) = app.call_json(get(&format!("/products/{product_id}"), CUSTOMER, Role::Customer)).await;
    assert_eq!(product["stock"], 3);
}

#[actix_web::test]
async fn receipts_combine_order_parties_and_payment() {
    let app = TestApp::new().await;
    let order = cart_order(&app, 2).await;
    let path = format!("/orders/{}/receipt", order["id"]);
    let (status, receipt) = app.call_json(get(&path, CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["settled_payment"], Value::Null);
    let payment = json!({ "order_id": order["id"], "amount": 20_000, "method": "wallet" });
    let (status, _) = app.call(post("/payments", CUSTOMER, Role::Customer, payment)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, receipt) = app.call_json(get(&path, SELLER, Role::Seller)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["order"]["status"], "processing");
    assert_eq!(receipt["seller"]["store_name"], "Sam's Surplus");
    assert_eq!(receipt["customer"]["name"], "Alice");
    assert_eq!(receipt["settled_payment"]["method"], "wallet");
    assert_eq!(receipt["loyalty_points"], 20);
    let (status, _) = app.call(get(&path, OTHER_CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

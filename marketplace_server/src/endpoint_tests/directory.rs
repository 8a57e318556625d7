use actix_web::{http::StatusCode, test::TestRequest};
use marketplace_engine::{db_types::Role, test_utils::SELLER};
use serde_json::json;

use super::helpers::{put, TestApp};

#[actix_web::test]
async fn health_needs_no_actor() {
    let app = TestApp::new().await;
    let (status, body) = app.call(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
}

#[actix_web::test]
async fn customers_register_themselves() {
    let app = TestApp::new().await;
    let body = json!({ "name": "Carol", "email": "carol@example.com" });
    let (status, carol) = app.call_json(put("/customers/carol", "carol", Role::Customer, body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(carol["id"], "carol");
    assert_eq!(carol["email"], "carol@example.com");
    let (status, _) = app.call(put("/customers/dave", "carol", Role::Customer, body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(put("/customers/dave", "root", Role::Admin, json!({ "name": "" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, dave) = app.call_json(put("/customers/dave", "root", Role::Admin, json!({ "name": "Dave" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dave["name"], "Dave");
}

#[actix_web::test]
async fn sellers_update_their_store() {
    let app = TestApp::new().await;
    let body = json!({ "name": "Sam Seller", "storeName": "Sam's Superstore" });
    let (status, seller) = app.call_json(put(&format!("/sellers/{SELLER}"), SELLER, Role::Seller, body.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(seller["store_name"], "Sam's Superstore");
    let (status, _) = app.call(put("/sellers/seller-2", SELLER, Role::Seller, body.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(put("/sellers/seller-9", "carol", Role::Customer, body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

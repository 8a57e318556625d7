use actix_web::http::StatusCode;
use marketplace_engine::{
    db_types::Role,
    test_utils::{CUSTOMER, OTHER_SELLER, SELLER},
};
use serde_json::json;

use super::helpers::{delete, get, post, put, TestApp};

#[actix_web::test]
async fn sellers_list_restock_and_audit_products() {
    let app = TestApp::new().await;
    let listing = json!({ "seller_id": SELLER, "name": "Mug", "price": 4_500, "initial_stock": 2 });
    let (status, mug) = app.call_json(post("/products", SELLER, Role::Seller, listing)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(mug["stock"], 2);
    assert_eq!(mug["active"], true);
    let id = mug["id"].as_i64().unwrap();

    let restock = json!({ "quantityChange": 5, "reason": "delivery" });
    let (status, change) = app.call_json(post(&format!("/products/{id}/stock"), SELLER, Role::Seller, restock)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(change["previous_quantity"], 2);
    assert_eq!(change["new_quantity"], 7);

    let shrinkage = json!({ "quantity_change": -3, "reason": "breakage" });
    let (status, _) = app.call(post(&format!("/products/{id}/stock"), SELLER, Role::Seller, shrinkage)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, audit) = app.call_json(get(&format!("/products/{id}/inventory"), SELLER, Role::Seller)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit["current_stock"], 4);
    assert_eq!(audit["consistent"], true);
    let types = audit["entries"].as_array().unwrap().iter().map(|e| e["change_type"].clone()).collect::<Vec<_>>();
    assert_eq!(types, vec![json!("restock"), json!("restock"), json!("adjustment")]);
    assert_eq!(audit["entries"][2]["reason"], "breakage");
}

#[actix_web::test]
async fn stock_cannot_go_negative() {
    let app = TestApp::new().await;
    let mug = app.product(SELLER, "Mug", 4, 2).await;
    let adjustment = json!({ "quantity_change": -3, "reason": "stocktake" });
    let (status, body) =
        app.call_json(post(&format!("/products/{}/stock", mug.id), SELLER, Role::Seller, adjustment)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Requested 3, but only 2 available"));
}

#[actix_web::test]
async fn only_the_owner_manages_a_listing() {
    let app = TestApp::new().await;
    let mug = app.product(SELLER, "Mug", 4, 2).await;
    let listing = json!({ "seller_id": SELLER, "name": "Bowl", "price": 3_000 });
    let (status, _) = app.call(post("/products", CUSTOMER, Role::Customer, listing.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(post("/products", OTHER_SELLER, Role::Seller, listing)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let restock = json!({ "quantity_change": 10 });
    let (status, _) = app.call(post(&format!("/products/{}/stock", mug.id), OTHER_SELLER, Role::Seller, restock)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(get(&format!("/products/{}/inventory", mug.id), CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(get(&format!("/products/{}/inventory", mug.id), "root", Role::Admin)).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn price_changes_do_not_touch_placed_orders() {
    let app = TestApp::new().await;
    let mug = app.product(SELLER, "Mug", 4, 5).await;
    let sale = json!({ "items": [{ "product_id": mug.id, "quantity": 2 }] });
    let (_, placed) = app.call_json(post("/orders", SELLER, Role::Seller, sale)).await;
    let path = format!("/products/{}", mug.id);
    let (status, updated) = app.call_json(put(&path, SELLER, Role::Seller, json!({ "price": 6_000 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 6_000);
    let order_path = format!("/orders/{}", placed["order"]["id"]);
    let (_, order) = app.call_json(get(&order_path, SELLER, Role::Seller)).await;
    assert_eq!(order["total"], 8_000);
    assert_eq!(order["lines"][0]["unit_price"], 4_000);
}

#[actix_web::test]
async fn inactive_products_cannot_be_added_to_carts() {
    let app = TestApp::new().await;
    let mug = app.product(SELLER, "Mug", 4, 5).await;
    let path = format!("/products/{}", mug.id);
    let (status, _) = app.call(put(&path, SELLER, Role::Seller, json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, updated) = app.call_json(put(&path, SELLER, Role::Seller, json!({ "active": false }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["active"], false);
    let item = json!({ "product_id": mug.id, "quantity": 1 });
    let (status, _) = app.call(post("/cart/items", CUSTOMER, Role::Customer, item)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn carts_belong_to_customers() {
    let app = TestApp::new().await;
    let mug = app.product(SELLER, "Mug", 4, 5).await;
    let item = json!({ "productId": mug.id, "quantity": 2 });
    let (status, _) = app.call(post("/cart/items", CUSTOMER, Role::Customer, item.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, added) = app.call_json(post("/cart/items", CUSTOMER, Role::Customer, item.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(added["quantity"], 4);
    let (status, _) = app.call(post("/cart/items", SELLER, Role::Seller, item)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call(delete(&format!("/cart/items/{}", mug.id), CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::OK);
    let (_, cart) = app.call_json(get("/cart", CUSTOMER, Role::Customer)).await;
    assert_eq!(cart, json!([]));
    let zero = json!({ "product_id": mug.id, "quantity": 0 });
    let (status, _) = app.call(post("/cart/items", CUSTOMER, Role::Customer, zero)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn storefront_lists_a_sellers_products() {
    let app = TestApp::new().await;
    app.product(SELLER, "Mug", 4, 5).await;
    app.product(SELLER, "Bowl", 3, 0).await;
    app.product(OTHER_SELLER, "Jam", 6, 2).await;
    let (status, products) = app.call_json(get(&format!("/sellers/{SELLER}/products"), CUSTOMER, Role::Customer)).await;
    assert_eq!(status, StatusCode::OK);
    let names = products.as_array().unwrap().iter().map(|p| p["name"].clone()).collect::<Vec<_>>();
    assert_eq!(names, vec![json!("Mug"), json!("Bowl")]);
}

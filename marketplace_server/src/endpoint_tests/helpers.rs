use actix_web::{http::StatusCode, test, test::TestRequest, App};
use log::debug;
use marketplace_engine::{
    db_types::{Product, Role},
    events::EventProducers,
    mkt_api::order_flow_api::DEFAULT_LOW_STOCK_THRESHOLD,
    settlement::ScriptedGateway,
    test_utils::{seed_directory, seed_product, MemoryDatabase},
};
use serde_json::Value;

use crate::{
    auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER},
    server::configure_api,
};

/// A fully wired API over an in-memory backend. The directory is seeded with two sellers and two customers.
pub struct TestApp {
    pub db: MemoryDatabase,
    pub gateway: ScriptedGateway,
}

impl TestApp {
    pub async fn new() -> Self {
        let _ = env_logger::try_init().ok();
        let db = MemoryDatabase::new();
        seed_directory(&db).await.expect("Error seeding directory");
        Self { db, gateway: ScriptedGateway::default() }
    }

    pub async fn product(&self, seller: &str, name: &str, price: i64, stock: i64) -> Product {
        seed_product(&self.db, seller, name, price, stock).await.expect("Error seeding product")
    }

    pub async fn call(&self, req: TestRequest) -> (StatusCode, String) {
        let db = self.db.clone();
        let gateway = self.gateway.clone();
        let app = App::new().configure(move |cfg| {
            configure_api(cfg, db, gateway, EventProducers::default(), DEFAULT_LOW_STOCK_THRESHOLD)
        });
        let service = test::init_service(app).await;
        debug!("Making request");
        let res = test::call_service(&service, req.to_request()).await;
        let status = res.status();
        let body = test::read_body(res).await;
        (status, String::from_utf8_lossy(&body).into_owned())
    }

    /// Calls the API and parses the response body as JSON.
    pub async fn call_json(&self, req: TestRequest) -> (StatusCode, Value) {
        let (status, body) = self.call(req).await;
        let json = serde_json::from_str(&body).unwrap_or_else(|e| panic!("Response is not JSON ({e}): {body}"));
        (status, json)
    }
}

pub fn as_actor(req: TestRequest, id: &str, role: Role) -> TestRequest {
    req.insert_header((ACTOR_ID_HEADER, id)).insert_header((ACTOR_ROLE_HEADER, role.to_string()))
}

pub fn get(path: &str, id: &str, role: Role) -> TestRequest {
    as_actor(TestRequest::get().uri(path), id, role)
}

pub fn post(path: &str, id: &str, role: Role, body: Value) -> TestRequest {
    as_actor(TestRequest::post().uri(path).set_json(body), id, role)
}

pub fn put(path: &str, id: &str, role: Role, body: Value) -> TestRequest {
    as_actor(TestRequest::put().uri(path).set_json(body), id, role)
}

pub fn delete(path: &str, id: &str, role: Role) -> TestRequest {
    as_actor(TestRequest::delete().uri(path), id, role)
}

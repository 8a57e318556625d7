use std::time::Duration;

use actix_web::{dev::Server, error::JsonPayloadError, http::KeepAlive, middleware::Logger, web, App, HttpRequest, HttpServer};
use log::*;
use marketplace_engine::{
    events::{EventHandlers, EventProducers},
    settlement::{SettlementGateway, SimulatedGateway},
    traits::FulfillmentDatabase,
    CartApi,
    DirectoryApi,
    InventoryApi,
    LoyaltyApi,
    OrderFlowApi,
    ReceiptApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    notifications::notification_hooks,
    routes::{
        health,
        AddToCartRoute,
        AdjustStockRoute,
        CheckoutRoute,
        ConfirmPaymentRoute,
        CreateProductRoute,
        FetchProductRoute,
        InventoryAuditRoute,
        LoyaltySummaryRoute,
        MyCartRoute,
        OrderByIdRoute,
        ReceiptRoute,
        RedeemPointsRoute,
        RemoveFromCartRoute,
        SellerProductsRoute,
        SubmitPaymentRoute,
        UpdateOrderStatusRoute,
        UpdateProductRoute,
        UpsertCustomerRoute,
        UpsertSellerRoute,
    },
};

const EVENT_BUFFER_SIZE: usize = 64;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    }
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, notification_hooks());
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let gateway = SimulatedGateway::new(config.approval_rate);
    info!("💳️ Settling payments with the simulated gateway. Approval rate: {}", gateway.approval_rate());
    // Runs for the life of the process
    let _expiry_worker =
        start_expiry_worker(db.clone(), gateway.clone(), producers.clone(), config.unpaid_order_timeout);
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: SimulatedGateway,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let low_stock_threshold = config.low_stock_threshold;
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mkt::access_log"))
            .configure(|cfg| {
                configure_api(cfg, db.clone(), gateway.clone(), producers.clone(), low_stock_threshold)
            })
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// Registers the API objects and every route against the given backend and gateway.
pub fn configure_api<B, G>(
    cfg: &mut web::ServiceConfig,
    db: B,
    gateway: G,
    producers: EventProducers,
    low_stock_threshold: i64,
) where
    B: FulfillmentDatabase + 'static,
    G: SettlementGateway + 'static,
{
    let orders_api =
        OrderFlowApi::new(db.clone(), gateway, producers.clone()).with_low_stock_threshold(low_stock_threshold);
    let inventory_api = InventoryApi::new(db.clone(), producers).with_low_stock_threshold(low_stock_threshold);
    cfg.app_data(web::Data::new(orders_api))
        .app_data(web::Data::new(inventory_api))
        .app_data(web::Data::new(CartApi::new(db.clone())))
        .app_data(web::Data::new(ReceiptApi::new(db.clone())))
        .app_data(web::Data::new(LoyaltyApi::new(db.clone())))
        .app_data(web::Data::new(DirectoryApi::new(db)))
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .service(health)
        .service(CreateProductRoute::<B>::new())
        .service(FetchProductRoute::<B>::new())
        .service(SellerProductsRoute::<B>::new())
        .service(UpdateProductRoute::<B>::new())
        .service(AdjustStockRoute::<B>::new())
        .service(InventoryAuditRoute::<B>::new())
        .service(MyCartRoute::<B>::new())
        .service(AddToCartRoute::<B>::new())
        .service(RemoveFromCartRoute::<B>::new())
        .service(CheckoutRoute::<B, G>::new())
        .service(OrderByIdRoute::<B, G>::new())
        .service(UpdateOrderStatusRoute::<B, G>::new())
        .service(ReceiptRoute::<B>::new())
        .service(SubmitPaymentRoute::<B, G>::new())
        .service(ConfirmPaymentRoute::<B, G>::new())
        .service(LoyaltySummaryRoute::<B>::new())
        .service(RedeemPointsRoute::<B>::new())
        .service(UpsertCustomerRoute::<B>::new())
        .service(UpsertSellerRoute::<B>::new());
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("💻️ Could not deserialize request body. {err}");
    ServerError::InvalidRequestBody(err.to_string()).into()
}

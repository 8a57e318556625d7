//! Request handler definitions
//!
//! Define each route and its handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! Every route except `/health` sits behind the ACL middleware, which resolves the caller into an
//! [`AuthenticatedActor`] and checks the caller's role. Ownership checks happen in the engine.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Database calls and settlement are async for this reason, and
//! handlers must never block.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use marketplace_engine::{
    db_types::{Actor, NewProduct, OrderId, PaymentId, ProductId, Role},
    order_objects::{CheckoutRequest, PaymentOutcome, PaymentRequest, StatusUpdate, StockAdjustment},
    settlement::SettlementGateway,
    traits::FulfillmentDatabase,
    CartApi,
    DirectoryApi,
    InventoryApi,
    LoyaltyApi,
    OrderFlowApi,
    ReceiptApi,
};

use crate::{
    auth::AuthenticatedActor,
    data_objects::{
        AddToCartParams,
        CustomerParams,
        JsonResponse,
        RedeemPointsParams,
        SellerParams,
        UpdateProductParams,
    },
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro.
// Each trait bound becomes a type parameter on the generated `...Route` struct, in order, and the handler is called with
// the same type parameters.
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ident),+ where requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds >],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds >] >,)+ );}
        paste::paste! { impl< $( [< T $bounds >],)+ > [<$name:camel Route>]< $( [< T $bounds >],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds >] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds>],)+>
        where
            $([<T $bounds>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds >], )+>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Products  ----------------------------------------------------
route!(create_product => Post "/products" impl FulfillmentDatabase where requires [Role::Seller, Role::Admin]);
/// Lists a new product. Sellers may only list products under their own id. The initial stock is recorded as a
/// restock in the product's inventory log.
pub async fn create_product<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    body: web::Json<NewProduct>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST product by {}", *actor);
    let product = api.create_product(&actor, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(product))
}

route!(fetch_product => Get "/products/{id}" impl FulfillmentDatabase where requires [Role::Customer, Role::Seller, Role::Admin]);
pub async fn fetch_product<B: FulfillmentDatabase>(
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = ProductId::from(path.into_inner());
    trace!("💻️ GET product {id}");
    let product = api.product(id).await?;
    Ok(HttpResponse::Ok().json(product))
}

route!(seller_products => Get "/sellers/{id}/products" impl FulfillmentDatabase where requires [Role::Customer, Role::Seller, Role::Admin]);
pub async fn seller_products<B: FulfillmentDatabase>(
    path: web::Path<String>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let seller_id = path.into_inner();
    trace!("💻️ GET products for seller {seller_id}");
    let products = api.products_for_seller(&seller_id).await?;
    Ok(HttpResponse::Ok().json(products))
}

route!(update_product => Put "/products/{id}" impl FulfillmentDatabase where requires [Role::Seller, Role::Admin]);
/// Changes the price and/or the active flag of a listing. Orders that were already placed keep the price they were
/// placed at.
pub async fn update_product<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: web::Json<UpdateProductParams>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = ProductId::from(path.into_inner());
    let UpdateProductParams { price, active } = body.into_inner();
    debug!("💻️ PUT product {id} by {}. price: {price:?}, active: {active:?}", *actor);
    if price.is_none() && active.is_none() {
        return Err(ServerError::InvalidRequestBody("Nothing to update. Supply a price and/or active flag".into()));
    }
    let mut product = None;
    if let Some(price) = price {
        product = Some(api.set_price(&actor, id, price).await?);
    }
    if let Some(active) = active {
        product = Some(api.set_active(&actor, id, active).await?);
    }
    Ok(HttpResponse::Ok().json(product))
}

route!(adjust_stock => Post "/products/{id}/stock" impl FulfillmentDatabase where requires [Role::Seller, Role::Admin]);
/// Manual stock movement. Positive changes default to a restock and negative changes to an adjustment. The change goes
/// through the same conditional update as a sale, so stock can never become negative.
pub async fn adjust_stock<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: web::Json<StockAdjustment>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = ProductId::from(path.into_inner());
    let adjustment = body.into_inner();
    debug!("💻️ POST stock adjustment of {} for {id} by {}", adjustment.quantity_change, *actor);
    let change = api.adjust_stock(&actor, id, adjustment).await?;
    Ok(HttpResponse::Ok().json(change))
}

route!(inventory_audit => Get "/products/{id}/inventory" impl FulfillmentDatabase where requires [Role::Seller, Role::Admin]);
/// The product's inventory log in the order the movements were applied, and whether it replays to the current stock.
pub async fn inventory_audit<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    api: web::Data<InventoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = ProductId::from(path.into_inner());
    debug!("💻️ GET inventory audit for {id} by {}", *actor);
    let audit = api.inventory_audit(&actor, id).await?;
    if !audit.consistent {
        warn!("💻️ The inventory log for {id} does not replay to its current stock of {}", audit.current_stock);
    }
    Ok(HttpResponse::Ok().json(audit))
}

//----------------------------------------------   Cart  ----------------------------------------------------
route!(my_cart => Get "/cart" impl FulfillmentDatabase where requires [Role::Customer]);
pub async fn my_cart<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ GET cart for {}", *actor);
    let cart = api.cart(&actor).await?;
    Ok(HttpResponse::Ok().json(cart))
}

route!(add_to_cart => Post "/cart/items" impl FulfillmentDatabase where requires [Role::Customer]);
pub async fn add_to_cart<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    body: web::Json<AddToCartParams>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let AddToCartParams { product_id, quantity } = body.into_inner();
    debug!("💻️ POST {quantity} x {product_id} to the cart of {}", *actor);
    let item = api.add_item(&actor, product_id, quantity).await?;
    Ok(HttpResponse::Ok().json(item))
}

route!(remove_from_cart => Delete "/cart/items/{product_id}" impl FulfillmentDatabase where requires [Role::Customer]);
pub async fn remove_from_cart<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    api: web::Data<CartApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let product_id = ProductId::from(path.into_inner());
    debug!("💻️ DELETE {product_id} from the cart of {}", *actor);
    api.remove_item(&actor, product_id).await?;
    Ok(HttpResponse::Ok().json(JsonResponse::success(format!("{product_id} removed from cart"))))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(checkout => Post "/orders" impl FulfillmentDatabase, SettlementGateway where requires [Role::Customer, Role::Seller, Role::Admin]);
/// Commits an order.
///
/// Customers check out their cart and send no `items`. Sellers ring up point-of-sale orders by sending `items`, and
/// may name a `customer_id` for a known customer. Either every line is committed with its stock taken, or nothing
/// changes.
///
/// Returns `201 Created` for a new order and `200 OK` when an `idempotency_key` repeats an earlier checkout.
pub async fn checkout<B: FulfillmentDatabase, G: SettlementGateway>(
    actor: AuthenticatedActor,
    body: web::Json<CheckoutRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ POST checkout by {}", *actor);
    let result = api.checkout(&actor, body.into_inner()).await?;
    let response = if result.created { HttpResponse::Created().json(result) } else { HttpResponse::Ok().json(result) };
    Ok(response)
}

route!(order_by_id => Get "/orders/{id}" impl FulfillmentDatabase, SettlementGateway where requires [Role::Customer, Role::Seller, Role::Admin]);
/// Customers can fetch their own orders, sellers the orders placed with them, and admins any order.
pub async fn order_by_id<B: FulfillmentDatabase, G: SettlementGateway>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    trace!("💻️ GET order {id} for {}", *actor);
    let order = api.order_for_actor(&actor, id).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(update_order_status => Put "/orders/{id}" impl FulfillmentDatabase, SettlementGateway where requires [Role::Customer, Role::Seller, Role::Admin]);
/// Moves an order through fulfillment. Sellers (and admins) ship and deliver orders. Customers may only cancel their
/// own pending orders. An order only becomes `processing` by being paid.
pub async fn update_order_status<B: FulfillmentDatabase, G: SettlementGateway>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    body: web::Json<StatusUpdate>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    let update = body.into_inner();
    debug!("💻️ PUT order {id} to {} by {}", update.status, *actor);
    let order = api.update_status(&actor, id, update).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(receipt => Get "/orders/{id}/receipt" impl FulfillmentDatabase where requires [Role::Customer, Role::Seller, Role::Admin]);
pub async fn receipt<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<i64>,
    api: web::Data<ReceiptApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = OrderId::from(path.into_inner());
    trace!("💻️ GET receipt for order {id} by {}", *actor);
    let receipt = api.receipt(&actor, id).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(submit_payment => Post "/payments" impl FulfillmentDatabase, SettlementGateway where requires [Role::Customer, Role::Seller, Role::Admin]);
/// Settles an order.
///
/// A completed settlement returns `200 OK`. A declined settlement is not an error: the payment is recorded as failed,
/// the order's stock is released, and `402 Payment Required` is returned with the outcome. Paying the same order again
/// is the retry.
pub async fn submit_payment<B: FulfillmentDatabase, G: SettlementGateway>(
    actor: AuthenticatedActor,
    body: web::Json<PaymentRequest>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let request = body.into_inner();
    debug!("💻️ POST {} payment of {} for order {} by {}", request.method, request.amount, request.order_id, *actor);
    let outcome = api.submit_payment(&actor, request).await?;
    let response = match &outcome {
        PaymentOutcome::Completed { .. } => HttpResponse::Ok().json(outcome),
        PaymentOutcome::Declined { .. } => HttpResponse::PaymentRequired().json(outcome),
    };
    Ok(response)
}

route!(confirm_payment => Post "/payments/{id}/confirm" impl FulfillmentDatabase, SettlementGateway where requires [Role::Admin]);
/// Re-delivers a settlement confirmation. Loyalty points for a payment are only ever credited once, so this is safe to
/// repeat.
pub async fn confirm_payment<B: FulfillmentDatabase, G: SettlementGateway>(
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B, G>>,
) -> Result<HttpResponse, ServerError> {
    let id = PaymentId::from(path.into_inner());
    info!("💻️ POST settlement confirmation for {id}");
    let credit = api.confirm_settlement(id).await?;
    Ok(HttpResponse::Ok().json(credit))
}

//----------------------------------------------   Loyalty  ----------------------------------------------------
route!(loyalty_summary => Get "/customers/{id}/loyalty" impl FulfillmentDatabase where requires [Role::Customer, Role::Admin]);
pub async fn loyalty_summary<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<String>,
    api: web::Data<LoyaltyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = path.into_inner();
    trace!("💻️ GET loyalty summary for {customer_id} by {}", *actor);
    check_customer_access(&actor, &customer_id)?;
    let summary = api.summary(&customer_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(redeem_points => Post "/customers/{id}/loyalty/redeem" impl FulfillmentDatabase where requires [Role::Customer, Role::Admin]);
pub async fn redeem_points<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<String>,
    body: web::Json<RedeemPointsParams>,
    api: web::Data<LoyaltyApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let customer_id = path.into_inner();
    let RedeemPointsParams { points, description } = body.into_inner();
    debug!("💻️ POST redeem {points} points for {customer_id} by {}", *actor);
    check_customer_access(&actor, &customer_id)?;
    let tx = api.redeem(&customer_id, points, description).await?;
    Ok(HttpResponse::Ok().json(tx))
}

fn check_customer_access(actor: &Actor, customer_id: &str) -> Result<(), ServerError> {
    if actor.is_admin() || (actor.role == Role::Customer && actor.id == customer_id) {
        Ok(())
    } else {
        Err(ServerError::InsufficientPermissions(format!("{actor} cannot access the account of {customer_id}")))
    }
}

//----------------------------------------------   Directory  ----------------------------------------------------
route!(upsert_customer => Put "/customers/{id}" impl FulfillmentDatabase where requires [Role::Customer, Role::Admin]);
pub async fn upsert_customer<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<String>,
    body: web::Json<CustomerParams>,
    api: web::Data<DirectoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PUT customer {id} by {}", *actor);
    let customer = api.register_customer(&actor, body.into_inner().into_new_customer(id)).await?;
    Ok(HttpResponse::Ok().json(customer))
}

route!(upsert_seller => Put "/sellers/{id}" impl FulfillmentDatabase where requires [Role::Seller, Role::Admin]);
pub async fn upsert_seller<B: FulfillmentDatabase>(
    actor: AuthenticatedActor,
    path: web::Path<String>,
    body: web::Json<SellerParams>,
    api: web::Data<DirectoryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let id = path.into_inner();
    debug!("💻️ PUT seller {id} by {}", *actor);
    let seller = api.register_seller(&actor, body.into_inner().into_new_seller(id)).await?;
    Ok(HttpResponse::Ok().json(seller))
}

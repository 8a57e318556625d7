use futures_util::future::join_all;
use log::*;
use marketplace_engine::{
    db_types::{Actor, Money, NewCustomer, NewProduct, PaymentMethod, PaymentStatus},
    events::EventProducers,
    order_objects::{CheckoutItem, CheckoutRequest, PaymentRequest},
    settlement::ApproveAll,
    test_utils::{
        prepare_env::{drop_database, prepare_test_env, random_db_path},
        seed_directory,
        SELLER,
    },
    CartManagement,
    DirectoryManagement,
    FulfillmentError,
    InventoryApi,
    InventoryManagement,
    OrderFlowApi,
    OrderManagement,
    SqliteDatabase,
};
use tokio::runtime::Runtime;

const NUM_BUYERS: usize = 12;
const STOCK: i64 = 5;

async fn setup() -> (String, OrderFlowApi<SqliteDatabase, ApproveAll>) {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    seed_directory(&db).await.expect("Error seeding directory");
    (url, OrderFlowApi::new(db, ApproveAll, EventProducers::default()))
}

async fn tear_down(url: &str, api: OrderFlowApi<SqliteDatabase, ApproveAll>) {
    api.db().close().await;
    drop_database(url).await;
}

#[test]
fn concurrent_pos_sales_never_oversell() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (url, api) = setup().await;
        let product = api
            .db()
            .create_product(NewProduct::new(SELLER, "Limited print", Money::from_units(40), STOCK))
            .await
            .expect("Error creating product");
        let seller = Actor::seller(SELLER);
        info!("🚀️ Racing {NUM_BUYERS} checkouts for {STOCK} units");
        let attempts = (0..NUM_BUYERS).map(|_| {
            let request = CheckoutRequest::point_of_sale(vec![CheckoutItem::new(product.id, 1)]);
            api.checkout(&seller, request)
        });
        let results = join_all(attempts).await;
        let (ok, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
        assert_eq!(ok.len() as i64, STOCK);
        for result in failed {
            match result {
                Err(FulfillmentError::InsufficientStock { product_id, requested, available }) => {
                    assert_eq!(product_id, product.id);
                    assert_eq!(requested, 1);
                    assert_eq!(available, 0);
                },
                other => panic!("Expected InsufficientStock, got {other:?}"),
            }
        }
        let product = api.db().fetch_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock, 0);
        let orders = api.db().fetch_orders_for_seller(SELLER).await.unwrap();
        assert_eq!(orders.len() as i64, STOCK);
        let inventory = InventoryApi::new(api.db().clone(), EventProducers::default());
        let audit = inventory.inventory_audit(&seller, product.id).await.unwrap();
        assert!(audit.consistent);
        // One restock plus one sale per order
        assert_eq!(audit.entries.len() as i64, STOCK + 1);
        tear_down(&url, api).await;
    });
}

#[test]
fn last_unit_goes_to_exactly_one_customer() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (url, api) = setup().await;
        let db = api.db().clone();
        let lamp = db
            .create_product(NewProduct::new(SELLER, "Lamp", Money::from(10_000), 1))
            .await
            .expect("Error creating product");
        let buyers = ["carol", "dave"];
        for id in buyers {
            db.upsert_customer(NewCustomer::new(id, id)).await.unwrap();
            db.add_to_cart(id, lamp.id, 1).await.unwrap();
        }
        let actors = buyers.iter().map(|id| Actor::customer(*id)).collect::<Vec<_>>();
        let attempts = actors.iter().map(|actor| api.checkout(actor, CheckoutRequest::from_cart()));
        let results = join_all(attempts).await;
        let created = results.iter().filter_map(|r| r.as_ref().ok()).collect::<Vec<_>>();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].order.total, Money::from(10_000));
        let failure = results.iter().find_map(|r| r.as_ref().err()).expect("One checkout should fail");
        assert_eq!(failure, &FulfillmentError::InsufficientStock { product_id: lamp.id, requested: 1, available: 0 });
        assert_eq!(db.fetch_product(lamp.id).await.unwrap().unwrap().stock, 0);
        // Only the winner's cart is cleared
        let carts = join_all(buyers.iter().map(|id| db.fetch_cart(id))).await;
        let remaining = carts.into_iter().map(|c| c.unwrap().len()).sum::<usize>();
        assert_eq!(remaining, 1);
        tear_down(&url, api).await;
    });
}

#[test]
fn racing_duplicate_checkouts_collapse_to_one_order() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (url, api) = setup().await;
        let product = api
            .db()
            .create_product(NewProduct::new(SELLER, "Notebook", Money::from_units(3), 10))
            .await
            .expect("Error creating product");
        let seller = Actor::seller(SELLER);
        let attempts = (0..4).map(|_| {
            let request = CheckoutRequest::point_of_sale(vec![CheckoutItem::new(product.id, 2)])
                .with_idempotency_key("till-7-0042");
            api.checkout(&seller, request)
        });
        let results = join_all(attempts).await.into_iter().map(|r| r.expect("Checkout failed")).collect::<Vec<_>>();
        assert_eq!(results.iter().filter(|r| r.created).count(), 1);
        assert!(results.iter().all(|r| r.order.id == results[0].order.id));
        assert_eq!(api.db().fetch_product(product.id).await.unwrap().unwrap().stock, 8);
        tear_down(&url, api).await;
    });
}

#[test]
fn racing_payments_settle_an_order_once() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async move {
        let (url, api) = setup().await;
        let db = api.db().clone();
        let lamp = db
            .create_product(NewProduct::new(SELLER, "Lamp", Money::from(10_000), 1))
            .await
            .expect("Error creating product");
        let seller = Actor::seller(SELLER);
        let request = CheckoutRequest::point_of_sale(vec![CheckoutItem::new(lamp.id, 1)]);
        let order = api.checkout(&seller, request).await.unwrap().order;
        let attempts = (0..4).map(|_| {
            let payment = PaymentRequest::new(order.id, order.total, PaymentMethod::Card);
            api.submit_payment(&seller, payment)
        });
        let results = join_all(attempts).await;
        let (ok, failed): (Vec<_>, Vec<_>) = results.into_iter().partition(|r| r.is_ok());
        assert_eq!(ok.len(), 1);
        for result in failed {
            match result {
                Err(FulfillmentError::PaymentInProgress(id)) | Err(FulfillmentError::PaymentAlreadyCompleted(id)) => {
                    assert_eq!(id, order.id)
                },
                other => panic!("Expected the payment to be refused, got {other:?}"),
            }
        }
        let payments = db.fetch_payments_for_order(order.id).await.unwrap();
        assert_eq!(payments.iter().filter(|p| p.status == PaymentStatus::Completed).count(), 1);
        assert!(payments.iter().all(|p| p.status != PaymentStatus::Pending));
        // Approved attempts that lost the race keep their transaction id for a refund
        assert!(payments.iter().all(|p| p.transaction_id.is_some()));
        assert_eq!(db.fetch_product(lamp.id).await.unwrap().unwrap().stock, 0);
        let inventory = InventoryApi::new(db.clone(), EventProducers::default());
        assert!(inventory.inventory_audit(&seller, lamp.id).await.unwrap().consistent);
        tear_down(&url, api).await;
    });
}

use marketplace_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        cart::AddToCartRequest,
        orders::{PlaceOrderRequest, UpdateOrderStatusRequest},
    },
    entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::ActiveModel as UserActive,
    },
    error::AppError,
    middleware::auth::AuthUser,
    models::{OrderStatus, Role, ShippingAddress},
    routes::params::{OrderListQuery, Pagination},
    services::{cart_service, order_service, product_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

// Integration tests against a real Postgres. Skipped politely when no
// database is configured in the environment.
async fn setup_state() -> anyhow::Result<Option<AppState>> {
    let database_url =
        match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
            Ok(url) => url,
            Err(_) => {
                eprintln!(
                    "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
                );
                return Ok(None);
            }
        };

    let pool = create_pool(&database_url).await?;
    let orm = create_orm_conn(&database_url).await?;
    run_migrations(&orm).await?;

    let config = AppConfig {
        database_url,
        jwt_secret: "integration-test-secret".into(),
        host: "127.0.0.1".into(),
        port: 0,
    };

    Ok(Some(AppState { pool, orm, config }))
}

async fn create_user(state: &AppState, role: Role) -> anyhow::Result<AuthUser> {
    let id = Uuid::new_v4();
    UserActive {
        id: Set(id),
        email: Set(format!("{}-{}@example.com", role.as_str(), id)),
        display_name: Set("Test User".into()),
        role: Set(role.as_str().into()),
        ship_recipient: Set(None),
        ship_street: Set(None),
        ship_city: Set(None),
        ship_postal_code: Set(None),
        ship_country: Set(None),
        ship_phone: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser { user_id: id, role })
}

async fn create_product(
    state: &AppState,
    seller: &AuthUser,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    ProductActive {
        id: Set(id),
        seller_id: Set(seller.user_id),
        name: Set(format!("Test Widget {id}")),
        description: Set(Some("A product for testing".into())),
        category: Set("testing".into()),
        tags: Set(serde_json::json!(["test"])),
        price: Set(price),
        stock: Set(stock),
        sales: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(id)
}

fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        recipient: "Test Buyer".into(),
        street: "1 Main St".into(),
        city: "Springfield".into(),
        postal_code: "12345".into(),
        country: "US".into(),
        phone: "555-0100".into(),
    }
}

async fn add_to_cart(
    state: &AppState,
    buyer: &AuthUser,
    product_id: Uuid,
    quantity: i32,
) -> anyhow::Result<()> {
    cart_service::add_to_cart(
        state,
        buyer,
        AddToCartRequest {
            product_id,
            quantity,
        },
    )
    .await?;
    Ok(())
}

#[tokio::test]
async fn place_order_snapshots_prices_and_clears_cart() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let seller = create_user(&state, Role::Seller).await?;
    let buyer = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, &seller, 1000, 2).await?;

    add_to_cart(&state, &buyer, product_id, 2).await?;

    let placed = order_service::place_order(
        &state,
        &buyer,
        PlaceOrderRequest {
            shipping_address: shipping_address(),
        },
    )
    .await?;
    let order_id = placed.data.unwrap().order_id;

    let detail = order_service::get_order(&state, &buyer, order_id).await?;
    let detail = detail.data.unwrap();
    assert_eq!(detail.order.total_amount, 2000);
    assert_eq!(detail.order.status, OrderStatus::Pending);
    assert_eq!(detail.order.seller_ids, vec![seller.user_id]);
    assert_eq!(detail.items.len(), 1);
    assert_eq!(detail.items[0].quantity, 2);
    assert_eq!(detail.items[0].price, 1000);

    // Stock moved to sales, cart cleared.
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product.stock, 0);
    assert_eq!(product.sales, 2);

    let lines = cart_service::snapshot(&state.orm, buyer.user_id).await?;
    assert!(lines.is_empty());

    // Editing the product price later never changes the stored order.
    let mut active: ProductActive = product.into();
    active.price = Set(9999);
    active.update(&state.orm).await?;

    let detail = order_service::get_order(&state, &buyer, order_id).await?;
    let detail = detail.data.unwrap();
    assert_eq!(detail.order.total_amount, 2000);
    assert_eq!(detail.items[0].price, 1000);

    Ok(())
}

#[tokio::test]
async fn insufficient_stock_leaves_no_trace() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let seller = create_user(&state, Role::Seller).await?;
    let buyer = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, &seller, 500, 1).await?;

    add_to_cart(&state, &buyer, product_id, 5).await?;

    let err = order_service::place_order(
        &state,
        &buyer,
        PlaceOrderRequest {
            shipping_address: shipping_address(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::InsufficientStock { available: 1, .. }));

    // Rollback: stock, sales, and the cart line are untouched, no order
    // was created.
    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product.stock, 1);
    assert_eq!(product.sales, 0);

    let lines = cart_service::snapshot(&state.orm, buyer.user_id).await?;
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].quantity, 5);

    let orders = order_service::list_my_orders(
        &state,
        &buyer,
        OrderListQuery {
            pagination: Pagination {
                page: None,
                per_page: None,
            },
            status: None,
            sort_order: None,
        },
    )
    .await?;
    assert!(orders.data.unwrap().items.is_empty());

    Ok(())
}

#[tokio::test]
async fn empty_cart_is_rejected() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let buyer = create_user(&state, Role::User).await?;
    let err = order_service::place_order(
        &state,
        &buyer,
        PlaceOrderRequest {
            shipping_address: shipping_address(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::EmptyCart));

    Ok(())
}

#[tokio::test]
async fn product_deleted_while_in_cart_aborts_order() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let seller = create_user(&state, Role::Seller).await?;
    let buyer = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, &seller, 500, 10).await?;

    add_to_cart(&state, &buyer, product_id, 1).await?;
    product_service::delete_product(&state, &seller, product_id).await?;

    let err = order_service::place_order(
        &state,
        &buyer,
        PlaceOrderRequest {
            shipping_address: shipping_address(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::ProductNotFound));

    // The stale cart line survives the aborted order.
    let count = CartItems::find()
        .filter(CartCol::UserId.eq(buyer.user_id))
        .all(&state.orm)
        .await?
        .len();
    assert_eq!(count, 1);

    Ok(())
}

#[tokio::test]
async fn concurrent_checkouts_cannot_oversell() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let seller = create_user(&state, Role::Seller).await?;
    let buyer_a = create_user(&state, Role::User).await?;
    let buyer_b = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, &seller, 1000, 3).await?;

    add_to_cart(&state, &buyer_a, product_id, 2).await?;
    add_to_cart(&state, &buyer_b, product_id, 2).await?;

    let (res_a, res_b) = tokio::join!(
        order_service::place_order(
            &state,
            &buyer_a,
            PlaceOrderRequest {
                shipping_address: shipping_address(),
            },
        ),
        order_service::place_order(
            &state,
            &buyer_b,
            PlaceOrderRequest {
                shipping_address: shipping_address(),
            },
        ),
    );

    // Combined demand (4) exceeds stock (3): exactly one order wins.
    let successes = [&res_a, &res_b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one concurrent checkout must succeed");
    let failure = if res_a.is_err() {
        res_a.unwrap_err()
    } else {
        res_b.unwrap_err()
    };
    assert!(matches!(
        failure,
        AppError::InsufficientStock { available: 1, .. }
    ));

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(product.stock, 1);
    assert_eq!(product.sales, 2);

    Ok(())
}

#[tokio::test]
async fn seller_scoped_listing_and_status_updates() -> anyhow::Result<()> {
    let Some(state) = setup_state().await? else {
        return Ok(());
    };

    let seller = create_user(&state, Role::Seller).await?;
    let other_seller = create_user(&state, Role::Seller).await?;
    let buyer = create_user(&state, Role::User).await?;
    let product_id = create_product(&state, &seller, 700, 5).await?;

    add_to_cart(&state, &buyer, product_id, 1).await?;
    let placed = order_service::place_order(
        &state,
        &buyer,
        PlaceOrderRequest {
            shipping_address: shipping_address(),
        },
    )
    .await?;
    let order_id = placed.data.unwrap().order_id;

    let query = || OrderListQuery {
        pagination: Pagination {
            page: None,
            per_page: None,
        },
        status: None,
        sort_order: None,
    };

    let mine = order_service::list_seller_orders(&state, &seller, query()).await?;
    assert!(mine.data.unwrap().items.iter().any(|o| o.id == order_id));

    let not_mine = order_service::list_seller_orders(&state, &other_seller, query()).await?;
    assert!(!not_mine.data.unwrap().items.iter().any(|o| o.id == order_id));

    // Only a selling member (or admin) may move the status.
    let err = order_service::update_status(
        &state,
        &other_seller,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    let updated = order_service::update_status(
        &state,
        &seller,
        order_id,
        UpdateOrderStatusRequest {
            status: OrderStatus::Shipped,
        },
    )
    .await?;
    assert_eq!(updated.data.unwrap().status, OrderStatus::Shipped);

    Ok(())
}

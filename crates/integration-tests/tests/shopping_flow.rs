//! End-to-end flows against PostgreSQL.
//!
//! Each test returns early when `TEST_DATABASE_URL` is unset. Accounts use
//! unique usernames so tests can share one database.

use std::str::FromStr;

use axum::http::StatusCode;
use rust_decimal::Decimal;
use serde_json::{Value, json};
use sqlx::PgPool;

use freshbites_core::{UserId, UserRole};
use freshbites_integration_tests::{TestClient, account_with_role, database_app, unique_username};
use freshbites_storefront::db::UserRepository;

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).unwrap(),
        other => Decimal::from_str(&other.to_string()).unwrap(),
    }
}

async fn create_product(manager: &mut TestClient, body: Value) -> Value {
    let response = manager.post("/api/products", body).await;
    assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
    response.body
}

#[tokio::test]
async fn test_register_login_logout() {
    let Some((mut client, _pool)) = database_app().await else {
        return;
    };
    let username = unique_username("Tanvir");

    let response = client.register(&username).await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["username"], json!(username.to_lowercase()));
    assert_eq!(response.body["role"], json!("normal"));
    assert_eq!(response.body["isPremium"], json!(false));
    assert!(response.body.get("passwordHash").is_none());

    let me = client.get("/api/auth/me").await;
    assert_eq!(me.status, StatusCode::OK);

    let mut other = client.anonymous();
    let taken = other
        .get(&format!("/api/auth/username-available?username={username}"))
        .await;
    assert_eq!(taken.body["available"], json!(false));
    let duplicate = other.register(&username.to_uppercase()).await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.error(), "Username already taken");

    let wrong = other
        .post(
            "/api/auth/login",
            json!({ "username": username, "password": "not the password" }),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    assert_eq!(
        client.post("/api/auth/logout", json!({})).await.status,
        StatusCode::NO_CONTENT
    );
    assert_eq!(
        client.get("/api/auth/me").await.status,
        StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_cart_checkout_and_replay() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "mgr", UserRole::Manager).await;
    let product = create_product(
        &mut manager,
        json!({ "item": { "title": "Beef Tehari", "price": "180.00" } }),
    )
    .await;
    let product_id = product["id"].clone();

    let mut customer = manager.anonymous();
    customer.register(&unique_username("cust")).await;

    // Empty cart cannot be checked out
    let checkout_id = uuid::Uuid::new_v4();
    let checkout = json!({ "checkoutId": checkout_id, "payment": { "method": "cash" } });
    let empty = customer.post("/api/checkout", checkout.clone()).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.error(), "Empty Cart");

    let cart = customer
        .post(
            "/api/cart/items",
            json!({ "productId": product_id, "quantity": 2 }),
        )
        .await;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(cart.body["totals"]["itemCount"], json!(2));
    assert_eq!(decimal(&cart.body["totals"]["subtotal"]), Decimal::from(360));
    assert_eq!(decimal(&cart.body["totals"]["deliveryFee"]), Decimal::from(50));
    assert_eq!(decimal(&cart.body["totals"]["total"]), Decimal::from(410));

    let placed = customer.post("/api/checkout", checkout.clone()).await;
    assert_eq!(placed.status, StatusCode::CREATED, "{:?}", placed.body);
    assert_eq!(placed.body["replayed"], json!(false));
    assert_eq!(placed.body["orderIds"].as_array().unwrap().len(), 1);
    assert_eq!(placed.body["payment"]["status"], json!("due_on_delivery"));

    let cart = customer.get("/api/cart").await;
    assert_eq!(cart.body["items"], json!([]));
    assert_eq!(decimal(&cart.body["totals"]["total"]), Decimal::ZERO);

    // Same checkout id: no new orders, no new charge
    let replay = customer.post("/api/checkout", checkout).await;
    assert_eq!(replay.status, StatusCode::OK);
    assert_eq!(replay.body["replayed"], json!(true));
    assert_eq!(replay.body["orderIds"], placed.body["orderIds"]);
    assert_eq!(replay.body["payment"], Value::Null);

    let orders = customer.get("/api/orders").await;
    let orders = orders.body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders.first().unwrap()["quantity"], json!(2));
    assert_eq!(decimal(&orders.first().unwrap()["totalAmount"]), Decimal::from(360));

    let incoming = manager.get("/api/orders/manager").await;
    assert_eq!(incoming.status, StatusCode::OK);
    assert!(
        incoming
            .body
            .as_array()
            .unwrap()
            .iter()
            .any(|o| o["checkoutId"] == json!(checkout_id))
    );

    let notifications = manager.get("/api/notifications").await;
    let order_alert = notifications
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["kind"] == json!("order_placed") && n["productId"] == product_id)
        .cloned()
        .unwrap();
    assert_eq!(order_alert["isRead"], json!(false));

    // Marking read twice leaves one read row
    let uri = format!("/api/notifications/{}/read", order_alert["id"].as_str().unwrap());
    let first = manager.post(&uri, json!({})).await;
    let second = manager.post(&uri, json!({})).await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);

    let rows: Vec<&Value> = second
        .body
        .as_array()
        .unwrap()
        .iter()
        .filter(|n| n["id"] == order_alert["id"])
        .collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.first().unwrap()["isRead"], json!(true));
}

#[tokio::test]
async fn test_premium_menu_and_purchase() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "chef", UserRole::Manager).await;
    let premium = create_product(
        &mut manager,
        json!({
            "category": "premiumItems",
            "item": { "title": "Wagyu Kala Bhuna", "price": "1450.50" },
        }),
    )
    .await;
    assert_eq!(premium["isPremium"], json!(true));

    let mut customer = manager.anonymous();
    customer.register(&unique_username("foodie")).await;

    assert_eq!(
        customer.get("/api/products/premium").await.status,
        StatusCode::FORBIDDEN
    );
    let blocked = customer
        .post("/api/cart/items", json!({ "productId": premium["id"] }))
        .await;
    assert_eq!(blocked.status, StatusCode::FORBIDDEN);

    assert_eq!(
        customer.post("/api/profile/premium/restore", json!({})).await.status,
        StatusCode::NOT_FOUND
    );

    let bought = customer.post("/api/profile/premium", json!({})).await;
    assert_eq!(bought.status, StatusCode::OK, "{:?}", bought.body);
    assert_eq!(bought.body["user"]["isPremium"], json!(true));
    assert_eq!(bought.body["payment"]["method"], json!("iap"));

    let again = customer.post("/api/profile/premium", json!({})).await;
    assert_eq!(again.body["payment"], Value::Null);

    let menu = customer.get("/api/products/premium").await;
    assert_eq!(menu.status, StatusCode::OK);
    assert!(
        menu.body
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["id"] == premium["id"])
    );

    let cart = customer
        .post("/api/cart/items", json!({ "productId": premium["id"] }))
        .await;
    assert_eq!(cart.status, StatusCode::OK);
    // 10% premium discount on 1450.50
    assert_eq!(decimal(&cart.body["totals"]["discount"]), Decimal::new(14505, 2));
}

#[tokio::test]
async fn test_role_changes() {
    let Some((mut client, _pool)) = database_app().await else {
        return;
    };
    client.register(&unique_username("role")).await;

    let denied = client
        .put("/api/profile/role", json!({ "role": "manager" }))
        .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let premium = client
        .put("/api/profile/role", json!({ "role": "premium" }))
        .await;
    assert_eq!(premium.status, StatusCode::OK);
    assert_eq!(premium.body["isPremium"], json!(true));

    let normal = client
        .put("/api/profile/role", json!({ "role": "normal" }))
        .await;
    assert_eq!(normal.body["isPremium"], json!(false));

    assert_eq!(
        client.get("/api/orders/manager").await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_manager_product_lifecycle() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "owner", UserRole::Manager).await;

    let invalid = manager
        .post("/api/products", json!({ "item": { "title": "Free", "price": 0 } }))
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let product = create_product(
        &mut manager,
        json!({ "item": { "title": "  Chicken Roll  ", "price": 120 } }),
    )
    .await;
    assert_eq!(product["title"], json!("Chicken Roll"));
    let uri = format!("/api/products/{}", product["id"].as_str().unwrap());

    let listed = manager.get("/api/products").await;
    assert!(
        listed
            .body
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["id"] == product["id"])
    );

    let updated = manager
        .put(&uri, json!({ "item": { "title": "Chicken Roll", "price": 140 } }))
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(decimal(&updated.body["priceValue"]), Decimal::from(140));

    assert_eq!(manager.delete(&uri).await.status, StatusCode::OK);
    assert_eq!(manager.get(&uri).await.status, StatusCode::NOT_FOUND);
    assert_eq!(manager.delete(&uri).await.status, StatusCode::NOT_FOUND);

    let mut customer = manager.anonymous();
    customer.register(&unique_username("guest")).await;
    let forbidden = customer
        .post("/api/products", json!({ "item": { "title": "Nope", "price": 10 } }))
        .await;
    assert_eq!(forbidden.status, StatusCode::FORBIDDEN);
}

fn uuid_of(value: &Value) -> uuid::Uuid {
    uuid::Uuid::parse_str(value.as_str().unwrap()).unwrap()
}

async fn orders_for_checkout(pool: &PgPool, checkout_id: uuid::Uuid) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE checkout_id = $1")
        .bind(checkout_id)
        .fetch_one(pool)
        .await
        .unwrap();
    count
}

#[tokio::test]
async fn test_concurrent_checkout_charges_once() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "grill", UserRole::Manager).await;
    let product = create_product(
        &mut manager,
        json!({ "item": { "title": "Chicken Chaap", "price": "210.00" } }),
    )
    .await;

    let mut customer = manager.anonymous();
    customer.register(&unique_username("rush")).await;
    let added = customer
        .post("/api/cart/items", json!({ "productId": product["id"], "quantity": 3 }))
        .await;
    assert_eq!(added.status, StatusCode::OK);

    // Two tabs on one session submit the same checkout at once
    let mut twin = customer.clone();
    let checkout_id = uuid::Uuid::new_v4();
    let body = json!({ "checkoutId": checkout_id, "payment": { "method": "cash" } });
    let (first, second) = tokio::join!(
        customer.post("/api/checkout", body.clone()),
        twin.post("/api/checkout", body.clone()),
    );

    let responses = [&first, &second];
    let created: Vec<_> = responses
        .iter()
        .filter(|r| r.status == StatusCode::CREATED)
        .collect();
    assert_eq!(created.len(), 1, "{:?} / {:?}", first.body, second.body);
    assert!(created.first().unwrap().body["payment"].is_object());

    let other = responses
        .iter()
        .find(|r| r.status != StatusCode::CREATED)
        .unwrap();
    if other.status == StatusCode::OK {
        assert_eq!(other.body["replayed"], json!(true));
        assert_eq!(other.body["payment"], Value::Null);
    } else {
        assert_eq!(other.status, StatusCode::CONFLICT, "{:?}", other.body);
        assert_eq!(other.error(), "Checkout is already being processed");
    }

    assert_eq!(orders_for_checkout(&pool, checkout_id).await, 1);

    // Once the first finished, the id only replays
    let replay = customer.post("/api/checkout", body).await;
    assert_eq!(replay.status, StatusCode::OK);
    assert_eq!(replay.body["orderIds"], created.first().unwrap().body["orderIds"]);
}

#[tokio::test]
async fn test_checkout_id_of_another_customer_is_refused() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "kitchen", UserRole::Manager).await;
    let product = create_product(
        &mut manager,
        json!({ "item": { "title": "Mutton Rezala", "price": "320.00" } }),
    )
    .await;

    let checkout_id = uuid::Uuid::new_v4();
    let body = json!({ "checkoutId": checkout_id, "payment": { "method": "cash" } });

    let mut first = manager.anonymous();
    first.register(&unique_username("early")).await;
    first
        .post("/api/cart/items", json!({ "productId": product["id"] }))
        .await;
    assert_eq!(first.post("/api/checkout", body.clone()).await.status, StatusCode::CREATED);

    let mut second = manager.anonymous();
    second.register(&unique_username("late")).await;
    second
        .post("/api/cart/items", json!({ "productId": product["id"], "quantity": 2 }))
        .await;
    let refused = second.post("/api/checkout", body).await;
    assert_eq!(refused.status, StatusCode::CONFLICT);
    assert_eq!(refused.error(), "Checkout id already used");

    // Nothing charged or written for the second customer, and the cart is kept
    assert_eq!(second.get("/api/orders").await.body, json!([]));
    assert_eq!(second.get("/api/cart").await.body["totals"]["itemCount"], json!(2));
    assert_eq!(orders_for_checkout(&pool, checkout_id).await, 1);
}

#[tokio::test]
async fn test_failed_checkout_releases_the_id() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "stall", UserRole::Manager).await;
    let product = create_product(
        &mut manager,
        json!({ "item": { "title": "Shingara", "price": "15.00" } }),
    )
    .await;

    let mut customer = manager.anonymous();
    customer.register(&unique_username("retry")).await;

    let checkout_id = uuid::Uuid::new_v4();
    let body = json!({ "checkoutId": checkout_id, "payment": { "method": "cash" } });
    let empty = customer.post("/api/checkout", body.clone()).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);

    customer
        .post("/api/cart/items", json!({ "productId": product["id"], "quantity": 4 }))
        .await;
    let placed = customer.post("/api/checkout", body).await;
    assert_eq!(placed.status, StatusCode::CREATED, "{:?}", placed.body);
    assert_eq!(placed.body["replayed"], json!(false));
}

#[tokio::test]
async fn test_cart_quantity_limit() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "bulk", UserRole::Manager).await;
    let product = create_product(
        &mut manager,
        json!({ "item": { "title": "Piyaju", "price": "5.00" } }),
    )
    .await;

    let mut customer = manager.anonymous();
    customer.register(&unique_username("hungry")).await;

    let too_many = customer
        .post("/api/cart/items", json!({ "productId": product["id"], "quantity": 4_294_967_295_u32 }))
        .await;
    assert_eq!(too_many.status, StatusCode::BAD_REQUEST);
    assert_eq!(too_many.error(), "Quantity cannot exceed 99");

    for _ in 0..2 {
        let added = customer
            .post("/api/cart/items", json!({ "productId": product["id"], "quantity": 60 }))
            .await;
        assert_eq!(added.status, StatusCode::OK);
    }
    let cart = customer.get("/api/cart").await;
    assert_eq!(cart.body["totals"]["itemCount"], json!(99));

    let uri = format!("/api/cart/items/{}", product["id"].as_str().unwrap());
    let patched = customer.patch(&uri, json!({ "quantity": 1000 })).await;
    assert_eq!(patched.status, StatusCode::BAD_REQUEST);

    let placed = customer
        .post(
            "/api/checkout",
            json!({ "checkoutId": uuid::Uuid::new_v4(), "payment": { "method": "cash" } }),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED, "{:?}", placed.body);
    let orders = customer.get("/api/orders").await;
    assert_eq!(orders.body.as_array().unwrap().first().unwrap()["quantity"], json!(99));
}

#[tokio::test]
async fn test_demotion_applies_without_relogin() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    let registered = account_with_role(&mut manager, &pool, "former", UserRole::Manager).await;
    let premium = create_product(
        &mut manager,
        json!({
            "category": "premiumItems",
            "item": { "title": "Shorshe Ilish", "price": "900.00" },
        }),
    )
    .await;
    assert_eq!(
        manager.get("/api/orders/manager").await.status,
        StatusCode::OK
    );

    // Premium access survives in the cart, then the role is taken away
    let cart = manager
        .post("/api/cart/items", json!({ "productId": premium["id"] }))
        .await;
    assert_eq!(cart.status, StatusCode::OK);
    assert_eq!(decimal(&cart.body["totals"]["discount"]), Decimal::from(90));

    let id = UserId::new(uuid_of(&registered["id"]));
    UserRepository::new(&pool)
        .set_role(id, UserRole::Normal)
        .await
        .unwrap();

    let denied = manager.get("/api/orders/manager").await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(manager.get("/api/auth/me").await.body["role"], json!("normal"));
    assert_eq!(
        manager.get("/api/products/premium").await.status,
        StatusCode::FORBIDDEN
    );

    let cart = manager.get("/api/cart").await;
    assert_eq!(decimal(&cart.body["totals"]["discount"]), Decimal::ZERO);

    let checkout = manager
        .post(
            "/api/checkout",
            json!({ "checkoutId": uuid::Uuid::new_v4(), "payment": { "method": "cash" } }),
        )
        .await;
    assert_eq!(checkout.status, StatusCode::FORBIDDEN);
    assert_eq!(checkout.error(), "Shorshe Ilish requires premium access");
    assert_eq!(manager.get("/api/orders").await.body, json!([]));
}

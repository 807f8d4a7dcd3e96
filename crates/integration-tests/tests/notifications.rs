//! Notification feed and preferences against PostgreSQL.

use axum::http::StatusCode;
use serde_json::{Value, json};
use sqlx::PgPool;

use freshbites_core::UserRole;
use freshbites_integration_tests::{account_with_role, database_app, unique_username};

fn uuid_of(value: &Value) -> uuid::Uuid {
    uuid::Uuid::parse_str(value.as_str().unwrap()).unwrap()
}

/// Rows of `kind` about `product` delivered to `user`.
async fn rows_about(pool: &PgPool, user: &Value, product: &Value, kind: &str) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND product_id = $2 AND kind::text = $3",
    )
    .bind(uuid_of(user))
    .bind(uuid_of(product))
    .bind(kind)
    .fetch_one(pool)
    .await
    .unwrap();
    count
}

/// Unread rows for `user`, optionally leaving out one kind.
async fn unread_rows(pool: &PgPool, user: &Value, excluded_kind: Option<&str>) -> i64 {
    let (count,): (i64,) = sqlx::query_as(
        r"
        SELECT COUNT(*) FROM notifications
        WHERE user_id = $1 AND NOT is_read AND ($2::text IS NULL OR kind::text <> $2)
        ",
    )
    .bind(uuid_of(user))
    .bind(excluded_kind)
    .fetch_one(pool)
    .await
    .unwrap();
    count
}

#[tokio::test]
async fn test_preferences_round_trip() {
    let Some((mut client, _pool)) = database_app().await else {
        return;
    };
    client.register(&unique_username("prefs")).await;

    let defaults = client.get("/api/notifications/preferences").await;
    assert_eq!(defaults.status, StatusCode::OK);
    assert_eq!(
        defaults.body,
        json!({ "productAdded": true, "productRemoved": true, "orderPlaced": true })
    );

    let saved = client
        .put(
            "/api/notifications/preferences",
            json!({ "productAdded": false, "productRemoved": false, "orderPlaced": true }),
        )
        .await;
    assert_eq!(saved.status, StatusCode::OK);
    assert_eq!(saved.body["productAdded"], json!(false));

    let profile = client.get("/api/profile").await;
    assert_eq!(
        profile.body["notificationPreferences"]["productRemoved"],
        json!(false)
    );

    // Only order notifications count now, and a new account has none
    let unread = client.get("/api/notifications/unread-count").await;
    assert_eq!(unread.body["count"], json!(0));

    let reset = client.delete("/api/notifications/preferences").await;
    assert_eq!(reset.body, defaults.body);
}

#[tokio::test]
async fn test_read_and_clear() {
    let Some((mut client, _pool)) = database_app().await else {
        return;
    };
    client.register(&unique_username("reader")).await;

    let marked = client.post("/api/notifications/read-all", json!({})).await;
    assert_eq!(marked.status, StatusCode::OK);
    assert!(marked.body["affected"].is_u64());

    let missing = client
        .post(
            &format!("/api/notifications/{}/read", uuid::Uuid::new_v4()),
            json!({}),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let cleared = client.delete("/api/notifications").await;
    assert_eq!(cleared.status, StatusCode::OK);

    // Anything left arrived after the clear, so it cannot have been read
    let remaining = client.get("/api/notifications?limit=500").await;
    assert!(
        remaining
            .body
            .as_array()
            .unwrap()
            .iter()
            .all(|n| n["isRead"] == json!(false))
    );
}

#[tokio::test]
async fn test_unread_count_is_zero_with_everything_disabled() {
    let Some((mut client, _pool)) = database_app().await else {
        return;
    };
    client.register(&unique_username("quiet")).await;

    client
        .put(
            "/api/notifications/preferences",
            json!({ "productAdded": false, "productRemoved": false, "orderPlaced": false }),
        )
        .await;

    let unread = client.get("/api/notifications/unread-count").await;
    assert_eq!(unread.status, StatusCode::OK);
    assert_eq!(unread.body["count"], json!(0));
}

#[tokio::test]
async fn test_product_changes_notify_everyone_but_the_actor() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    let manager_user = account_with_role(&mut manager, &pool, "pantry", UserRole::Manager).await;

    let mut customer = manager.anonymous();
    let customer_user = customer.register(&unique_username("watcher")).await.body;

    let created = manager
        .post(
            "/api/products",
            json!({ "item": { "title": "Chotpoti", "price": "60.00" } }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
    let product = &created.body["id"];

    assert_eq!(rows_about(&pool, &customer_user["id"], product, "product_added").await, 1);
    assert_eq!(rows_about(&pool, &manager_user["id"], product, "product_added").await, 0);

    let feed = customer.get("/api/notifications?limit=100").await;
    let added = feed
        .body
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["productId"] == *product)
        .cloned()
        .unwrap();
    assert_eq!(added["kind"], json!("product_added"));
    assert_eq!(added["createdByUser"], manager_user["id"]);
    assert_eq!(added["isRead"], json!(false));

    let uri = format!("/api/products/{}", product.as_str().unwrap());
    assert_eq!(manager.delete(&uri).await.status, StatusCode::OK);

    assert_eq!(rows_about(&pool, &customer_user["id"], product, "product_removed").await, 1);
    assert_eq!(rows_about(&pool, &manager_user["id"], product, "product_removed").await, 0);
}

#[tokio::test]
async fn test_unread_count_follows_mixed_preferences() {
    let Some((mut manager, pool)) = database_app().await else {
        return;
    };
    account_with_role(&mut manager, &pool, "menu", UserRole::Manager).await;

    let mut customer = manager.anonymous();
    let customer_user = customer.register(&unique_username("picky")).await.body;
    let saved = customer
        .put(
            "/api/notifications/preferences",
            json!({ "productAdded": false, "productRemoved": true, "orderPlaced": true }),
        )
        .await;
    assert_eq!(saved.status, StatusCode::OK);

    let created = manager
        .post(
            "/api/products",
            json!({ "item": { "title": "Haleem", "price": "140.00" } }),
        )
        .await;
    let product = &created.body["id"];
    let uri = format!("/api/products/{}", product.as_str().unwrap());
    assert_eq!(manager.delete(&uri).await.status, StatusCode::OK);

    assert_eq!(rows_about(&pool, &customer_user["id"], product, "product_added").await, 1);
    assert_eq!(rows_about(&pool, &customer_user["id"], product, "product_removed").await, 1);

    // Other tests may add rows concurrently, so bracket the HTTP count
    let before = unread_rows(&pool, &customer_user["id"], Some("product_added")).await;
    let unread = customer.get("/api/notifications/unread-count").await;
    let after = unread_rows(&pool, &customer_user["id"], Some("product_added")).await;
    let everything = unread_rows(&pool, &customer_user["id"], None).await;

    assert_eq!(unread.status, StatusCode::OK);
    let count = unread.body["count"].as_i64().unwrap();
    assert!(before >= 1);
    assert!((before..=after).contains(&count), "{before} <= {count} <= {after}");
    // The disabled product_added row is never counted
    assert!(count < everything);
}

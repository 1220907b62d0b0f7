//! Order history, cancellation and delivery confirmation.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};

use boostedlabs_core::{OrderStatus, ProductCategory};
use boostedlabs_integration_tests::TestApp;

#[tokio::test]
async fn test_orders_require_authentication() {
    let app = TestApp::new();

    let response = app.get("/orders", None).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = app.get("/orders", Some("garbage")).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_order_history_is_per_user_newest_first() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let first = app.place_order(1, &whey, 1).await;
    let second = app.place_order(1, &whey, 3).await;
    app.place_order(2, &whey, 1).await;

    let response = app.get("/orders", Some(&TestApp::token(1))).await;

    assert_eq!(response.status, StatusCode::OK);
    let orders = response.body.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], second.id.as_i64());
    assert_eq!(orders[1]["id"], first.id.as_i64());
    assert_eq!(orders[0]["items"][0]["quantity"], 3);
    assert_eq!(orders[0]["address"]["name"], "Ada Lovelace");
}

#[tokio::test]
async fn test_order_detail_hides_other_users_orders() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;

    let own = app
        .get(&format!("/orders/{}", order.id), Some(&TestApp::token(1)))
        .await;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(own.body["total_price"], "90.00");

    let foreign = app
        .get(&format!("/orders/{}", order.id), Some(&TestApp::token(2)))
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    assert_eq!(foreign.error(), "Order not found");

    let missing = app.get("/orders/9999", Some(&TestApp::token(1))).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_order_id_is_a_validation_error() {
    let app = TestApp::new();
    let token = TestApp::token(1);

    let detail = app.get("/orders/latest", Some(&token)).await;
    assert_eq!(detail.status, StatusCode::BAD_REQUEST);
    assert!(!detail.error().is_empty());

    let cancel = app.post_empty("/orders/abc/cancel", Some(&token)).await;
    assert_eq!(cancel.status, StatusCode::BAD_REQUEST);
    assert!(!cancel.error().is_empty());
}

#[tokio::test]
async fn test_cancel_within_window() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;

    let response = app
        .post_empty(
            &format!("/orders/{}/cancel", order.id),
            Some(&TestApp::token(1)),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Order cancelled successfully");
    assert_eq!(response.body["status"], "Cancelled");
    assert_eq!(
        app.store.order(order.id).unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn test_cancel_after_window_is_rejected() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    app.store
        .backdate_order(order.id, Utc::now() - Duration::hours(49));

    let response = app
        .post_empty(
            &format!("/orders/{}/cancel", order.id),
            Some(&TestApp::token(1)),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error(), "Cannot cancel order after 48 hours");
    assert_eq!(
        app.store.order(order.id).unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_cancel_just_inside_window() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    app.store
        .backdate_order(order.id, Utc::now() - Duration::hours(47));

    let response = app
        .post_empty(
            &format!("/orders/{}/cancel", order.id),
            Some(&TestApp::token(1)),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_cancel_rejected_once_shipped() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    app.store.set_status(order.id, OrderStatus::Shipped);

    let response = app
        .post_empty(
            &format!("/orders/{}/cancel", order.id),
            Some(&TestApp::token(1)),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error(),
        "Order cannot be cancelled in its current status (Shipped)"
    );
}

#[tokio::test]
async fn test_cancel_foreign_order_is_not_found() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;

    let response = app
        .post_empty(
            &format!("/orders/{}/cancel", order.id),
            Some(&TestApp::token(2)),
        )
        .await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.store.order(order.id).unwrap().status,
        OrderStatus::Pending
    );
}

#[tokio::test]
async fn test_confirm_delivery() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    app.store.set_status(order.id, OrderStatus::Shipped);
    let uri = format!("/orders/{}/confirm-delivery", order.id);

    let response = app.post_empty(&uri, Some(&TestApp::token(1))).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["message"], "Delivery confirmed");
    assert_eq!(response.body["status"], "Delivered");

    // Confirming twice is harmless
    let again = app.post_empty(&uri, Some(&TestApp::token(1))).await;
    assert_eq!(again.status, StatusCode::OK);
    assert_eq!(
        app.store.order(order.id).unwrap().status,
        OrderStatus::Delivered
    );
}

#[tokio::test]
async fn test_confirm_delivery_of_cancelled_order_rejected() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    let token = TestApp::token(1);

    app.post_empty(&format!("/orders/{}/cancel", order.id), Some(&token))
        .await;
    let response = app
        .post_empty(
            &format!("/orders/{}/confirm-delivery", order.id),
            Some(&token),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error(),
        "Cannot confirm delivery of a cancelled order"
    );
}

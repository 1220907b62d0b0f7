//! Payment confirmation webhooks and the signed cancel link.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use boostedlabs_core::{OrderStatus, ProductCategory};
use boostedlabs_integration_tests::{
    FRONTEND_URL, FakePayments, TestApp, address, completed_event, money,
};
use boostedlabs_storefront::models::{NewProduct, SubscriptionStatus};
use boostedlabs_storefront::services::payments::SubscriptionItem;

#[tokio::test]
async fn test_completed_session_marks_order_paid_once() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 2).await;
    let payload = completed_event(&order.session_id, order.id.as_i64(), None);

    let first = app
        .webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
        .await;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body["received"], true);

    let paid = app.store.order(order.id).unwrap();
    assert!(paid.is_paid);
    assert_eq!(paid.status, OrderStatus::Processing);

    // Redelivery is acknowledged and changes nothing
    let second = app
        .webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(app.store.order(order.id).unwrap(), paid);
}

#[tokio::test]
async fn test_subscription_recorded_once_per_product() {
    let app = TestApp::new();
    let creatine = app
        .product_with(NewProduct {
            category: ProductCategory::Health,
            name: "Creatine".to_string(),
            initial_price: money("29.99"),
            discounted_price: money("29.99"),
            description: String::new(),
            available_sizes: Vec::new(),
            available_colors: Vec::new(),
            stripe_price_id: None,
            stripe_subscription_price_id: Some("price_monthly".to_string()),
        })
        .await;
    let token = TestApp::token(4);
    app.post(
        &format!("/products/{}/add-to-cart", creatine.id),
        Some(&token),
        &json!({ "quantity": 2 }),
    )
    .await;
    let placed = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": address(), "is_subscription": true }),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    let order_id = placed.body["order"]["id"].as_i64().unwrap();

    app.payments.add_subscription(
        "sub_test_9",
        vec![SubscriptionItem {
            id: "si_test_4".to_string(),
            price_id: "price_monthly".to_string(),
            quantity: 2,
        }],
    );

    let payload = completed_event("cs_test_1", order_id, Some("sub_test_9"));
    for _ in 0..2 {
        let response = app
            .webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
            .await;
        assert_eq!(response.status, StatusCode::OK);
    }

    let subscriptions = app.store.subscriptions();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].user_id, TestApp::user(4));
    assert_eq!(subscriptions[0].product_id, creatine.id);
    assert_eq!(subscriptions[0].stripe_subscription_id, "sub_test_9");
    assert_eq!(
        subscriptions[0].stripe_subscription_item_id.as_deref(),
        Some("si_test_4")
    );
    assert_eq!(subscriptions[0].quantity, 2);
    assert_eq!(subscriptions[0].status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn test_subscription_recorded_when_items_unavailable() {
    let app = TestApp::new();
    let creatine = app
        .product_with(NewProduct {
            category: ProductCategory::Health,
            name: "Creatine".to_string(),
            initial_price: money("29.99"),
            discounted_price: money("29.99"),
            description: String::new(),
            available_sizes: Vec::new(),
            available_colors: Vec::new(),
            stripe_price_id: None,
            stripe_subscription_price_id: Some("price_monthly".to_string()),
        })
        .await;
    let token = TestApp::token(5);
    app.post(
        &format!("/products/{}/add-to-cart", creatine.id),
        Some(&token),
        &json!({ "quantity": 1 }),
    )
    .await;
    let placed = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": address(), "is_subscription": true }),
        )
        .await;
    let order_id = placed.body["order"]["id"].as_i64().unwrap();

    // The provider does not know the subscription yet
    let payload = completed_event("cs_test_1", order_id, Some("sub_test_unknown"));
    let response = app
        .webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let subscriptions = app.store.subscriptions();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].stripe_subscription_item_id, None);
}

#[tokio::test]
async fn test_guest_subscription_pays_without_record() {
    let app = TestApp::new();
    let creatine = app
        .product_with(NewProduct {
            category: ProductCategory::Health,
            name: "Creatine".to_string(),
            initial_price: money("29.99"),
            discounted_price: money("29.99"),
            description: String::new(),
            available_sizes: Vec::new(),
            available_colors: Vec::new(),
            stripe_price_id: Some("price_once".to_string()),
            stripe_subscription_price_id: None,
        })
        .await;
    let placed = app
        .post(
            "/checkout",
            None,
            &json!({
                "address": address(),
                "email": "guest@example.com",
                "is_subscription": true,
                "cart_items": [{ "product_id": creatine.id, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED);
    let order_id = placed.body["order"]["id"].as_i64().unwrap();

    let payload = completed_event("cs_test_1", order_id, Some("sub_test_3"));
    let response = app
        .webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert!(app.store.orders()[0].is_paid);
    assert!(app.store.subscriptions().is_empty());
}

#[tokio::test]
async fn test_payment_after_cancellation_keeps_status() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    app.post_empty(
        &format!("/orders/{}/cancel", order.id),
        Some(&TestApp::token(1)),
    )
    .await;

    let payload = completed_event(&order.session_id, order.id.as_i64(), None);
    let response = app
        .webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    let stored = app.store.order(order.id).unwrap();
    assert!(stored.is_paid);
    assert_eq!(stored.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_signature_is_required_and_checked() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    let payload = completed_event(&order.session_id, order.id.as_i64(), None);

    let unsigned = app.webhook(&payload, None).await;
    assert_eq!(unsigned.status, StatusCode::BAD_REQUEST);
    assert_eq!(unsigned.error(), "Missing Stripe-Signature header");

    let forged = app
        .webhook(&payload, Some(&FakePayments::signature(b"something else")))
        .await;
    assert_eq!(forged.status, StatusCode::BAD_REQUEST);

    let stale_at = chrono::Utc::now().timestamp() - 3600;
    let stale = app
        .webhook(
            &payload,
            Some(&FakePayments::signature_at(payload.as_bytes(), stale_at)),
        )
        .await;
    assert_eq!(stale.status, StatusCode::BAD_REQUEST);

    assert!(!app.store.order(order.id).unwrap().is_paid);
}

#[tokio::test]
async fn test_signed_body_must_be_an_event() {
    let app = TestApp::new();

    for payload in ["not json", r#"{"id":"evt_1"}"#] {
        let response = app
            .webhook(payload, Some(&FakePayments::signature(payload.as_bytes())))
            .await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{payload}");
        assert!(!response.error().is_empty());
    }
}

#[tokio::test]
async fn test_mismatched_or_unknown_sessions_are_ignored() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;

    let mismatched = completed_event("cs_test_other", order.id.as_i64(), None);
    let response = app
        .webhook(
            &mismatched,
            Some(&FakePayments::signature(mismatched.as_bytes())),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(!app.store.order(order.id).unwrap().is_paid);

    let unknown = completed_event("cs_test_1", 9999, None);
    let response = app
        .webhook(&unknown, Some(&FakePayments::signature(unknown.as_bytes())))
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_other_event_types_are_acknowledged() {
    let app = TestApp::new();
    let payload = json!({
        "id": "evt_test_2",
        "type": "invoice.paid",
        "data": { "object": { "id": "in_test_1" } },
    })
    .to_string();

    let response = app
        .webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["received"], true);
}

#[tokio::test]
async fn test_cancel_link_deletes_unpaid_order() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;

    let response = app.get(&order.cancel_path, None).await;

    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(
        response.header("location"),
        Some(format!("{FRONTEND_URL}/payment/cancel").as_str())
    );
    assert!(app.store.order(order.id).is_none());
    assert!(app.store.order_items(order.id).is_empty());

    // Following the link again still lands on the cancel page
    let again = app.get(&order.cancel_path, None).await;
    assert_eq!(again.status, StatusCode::FOUND);
}

#[tokio::test]
async fn test_cancel_link_keeps_paid_order() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;
    let payload = completed_event(&order.session_id, order.id.as_i64(), None);
    app.webhook(&payload, Some(&FakePayments::signature(payload.as_bytes())))
        .await;

    let response = app.get(&order.cancel_path, None).await;

    assert_eq!(response.status, StatusCode::FOUND);
    let kept = app.store.order(order.id).unwrap();
    assert!(kept.is_paid);
    assert_eq!(kept.status, OrderStatus::Processing);
}

#[tokio::test]
async fn test_tampered_cancel_link_is_rejected() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 1).await;

    let garbage = app.get("/checkout/cancel/not-a-token", None).await;
    assert_eq!(garbage.status, StatusCode::BAD_REQUEST);

    let mut tampered = order.cancel_path.clone();
    let last = tampered.pop().unwrap();
    tampered.push(if last == 'A' { 'B' } else { 'A' });
    let response = app.get(&tampered, None).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert!(app.store.order(order.id).is_some());
}

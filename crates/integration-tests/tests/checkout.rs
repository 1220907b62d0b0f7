//! Order placement through `POST /checkout`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use serde_json::json;

use boostedlabs_core::{OrderId, ProductCategory, ShirtSize};
use boostedlabs_integration_tests::{TestApp, address, money};
use boostedlabs_storefront::models::NewProduct;
use boostedlabs_storefront::services::payments::SessionLines;

async fn add_to_cart(app: &TestApp, token: &str, product_id: i64, quantity: u32) {
    let response = app
        .post(
            &format!("/products/{product_id}/add-to-cart"),
            Some(token),
            &json!({ "quantity": quantity }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_authenticated_checkout_below_threshold() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let token = TestApp::token(1);
    add_to_cart(&app, &token, whey.id.as_i64(), 2).await;

    let response = app
        .post("/checkout", Some(&token), &json!({ "address": address() }))
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let order = &response.body["order"];
    assert_eq!(order["total_price"], "180.00");
    assert_eq!(order["shipping_fee"], "50.00");
    assert_eq!(order["status"], "Pending");
    assert_eq!(order["is_paid"], false);
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["items"][0]["is_free_item"], false);
    assert_eq!(order["address"]["type"], "home");
    assert_eq!(
        response.body["checkout_url"],
        "https://checkout.stripe.test/c/pay/cs_test_1"
    );

    // Cart is consumed and the sale counted
    assert_eq!(app.store.cart_len(TestApp::user(1)), 0);
    assert_eq!(app.store.product(whey.id).unwrap().order_count, 2);

    let stored = app.store.orders();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].payment_session_id.as_deref(), Some("cs_test_1"));
    assert_eq!(stored[0].amount_due(), money("230.00"));
}

#[tokio::test]
async fn test_session_request_prices_lines_and_shipping() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let token = TestApp::token(1);
    add_to_cart(&app, &token, whey.id.as_i64(), 2).await;

    app.post("/checkout", Some(&token), &json!({ "address": address() }))
        .await;

    let requests = app.payments.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(
        request.success_url,
        "https://shop.example.test/payment/success?session_id={CHECKOUT_SESSION_ID}"
    );
    assert!(
        request
            .cancel_url
            .starts_with("https://api.example.test/checkout/cancel/")
    );

    let SessionLines::OneTime(lines) = &request.lines else {
        panic!("expected payment mode");
    };
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].name, "Whey Isolate");
    assert_eq!(lines[0].unit_amount, money("90.00"));
    assert_eq!(lines[0].quantity, 2);
    assert_eq!(lines[1].name, "Shipping");
    assert_eq!(lines[1].unit_amount, money("50.00"));
}

#[tokio::test]
async fn test_free_tshirt_added_at_threshold() {
    let app = TestApp::new();
    let rower = app
        .product(ProductCategory::Merchandise, "Rowing Machine", "1600.00")
        .await;
    let token = TestApp::token(2);
    add_to_cart(&app, &token, rower.id.as_i64(), 1).await;

    let response = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": address(), "free_tshirt_size": "L" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let order_id = OrderId::new(response.body["order"]["id"].as_i64().unwrap());
    let items = app.store.order_items(order_id);
    assert_eq!(items.len(), 2);

    let free = items.iter().find(|item| item.is_free_item).unwrap();
    assert_eq!(free.price, money("0.00"));
    assert_eq!(free.free_item_size, Some(ShirtSize::L));
    assert_eq!(free.product_id, None);

    // The free item never reaches the payment page
    let SessionLines::OneTime(lines) = &app.payments.requests()[0].lines else {
        panic!("expected payment mode");
    };
    assert!(lines.iter().all(|line| !line.unit_amount.is_zero()));
}

#[tokio::test]
async fn test_free_tshirt_size_required_when_eligible() {
    let app = TestApp::new();
    let rower = app
        .product(ProductCategory::Merchandise, "Rowing Machine", "1600.00")
        .await;
    let token = TestApp::token(2);
    add_to_cart(&app, &token, rower.id.as_i64(), 1).await;

    let response = app
        .post("/checkout", Some(&token), &json!({ "address": address() }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.error().contains("eligible for a free T-shirt"));
    assert!(response.error().contains("select your T-shirt size"));
    assert!(app.store.orders().is_empty());
    assert!(app.payments.requests().is_empty());
    // Cart survives a rejected checkout
    assert_eq!(app.store.cart_len(TestApp::user(2)), 1);
}

#[tokio::test]
async fn test_invalid_tshirt_size_rejected() {
    let app = TestApp::new();
    let rower = app
        .product(ProductCategory::Merchandise, "Rowing Machine", "1600.00")
        .await;
    let token = TestApp::token(2);
    add_to_cart(&app, &token, rower.id.as_i64(), 1).await;

    let response = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": address(), "free_tshirt_size": "XS" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.error().contains("Invalid T-shirt size 'XS'"));
    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn test_size_ignored_below_threshold() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let token = TestApp::token(1);
    add_to_cart(&app, &token, whey.id.as_i64(), 1).await;

    let response = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": address(), "free_tshirt_size": "XS" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["order"]["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_cart_rejected() {
    let app = TestApp::new();
    let response = app
        .post(
            "/checkout",
            Some(&TestApp::token(1)),
            &json!({ "address": address() }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.error(), "Cart is empty");
}

#[tokio::test]
async fn test_address_errors_are_specific() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let token = TestApp::token(1);
    add_to_cart(&app, &token, whey.id.as_i64(), 1).await;

    let missing = app.post("/checkout", Some(&token), &json!({})).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.error(), "Address data is required");

    let partial = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": { "name": "Ada", "type": "home" } }),
        )
        .await;
    assert_eq!(partial.status, StatusCode::BAD_REQUEST);
    assert_eq!(partial.error(), "Missing address fields: phone, address");

    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn test_guest_checkout() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "45.50").await;

    let response = app
        .post(
            "/checkout",
            None,
            &json!({
                "address": address(),
                "email": "guest@example.com",
                "cart_items": [{ "product_id": whey.id, "quantity": 3 }],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    let order = &response.body["order"];
    assert_eq!(order["user_id"], serde_json::Value::Null);
    assert_eq!(order["email"], "guest@example.com");
    assert_eq!(order["total_price"], "136.50");

    let request = &app.payments.requests()[0];
    assert_eq!(request.customer_email.as_deref(), Some("guest@example.com"));
    assert_eq!(request.user_id, None);
}

#[tokio::test]
async fn test_guest_checkout_validation() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "45.50").await;

    let no_email = app
        .post(
            "/checkout",
            None,
            &json!({
                "address": address(),
                "cart_items": [{ "product_id": whey.id, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(no_email.status, StatusCode::BAD_REQUEST);
    assert_eq!(no_email.error(), "Email is required for guest checkout");

    let zero_quantity = app
        .post(
            "/checkout",
            None,
            &json!({
                "address": address(),
                "email": "guest@example.com",
                "cart_items": [{ "product_id": whey.id, "quantity": 0 }],
            }),
        )
        .await;
    assert_eq!(zero_quantity.status, StatusCode::BAD_REQUEST);
    assert_eq!(zero_quantity.error(), "Quantity must be at least 1");

    let unknown = app
        .post(
            "/checkout",
            None,
            &json!({
                "address": address(),
                "email": "guest@example.com",
                "cart_items": [{ "product_id": 9999, "quantity": 1 }],
            }),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.error(), "Product 9999 not found");

    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;

    let response = app
        .post(
            "/checkout",
            None,
            &json!({
                "address": address(),
                "email": "guest@example.com",
                "cart_items": [{ "product_id": whey.id, "quantity": "2" }],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.error().contains("quantity"), "{:?}", response.body);
    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn test_out_of_range_guest_orders_rejected() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let guest_order = |quantity: i64| {
        json!({
            "address": address(),
            "email": "guest@example.com",
            "cart_items": [{ "product_id": whey.id, "quantity": quantity }],
        })
    };

    let huge = app.post("/checkout", None, &guest_order(2_147_483_648)).await;
    assert_eq!(huge.status, StatusCode::BAD_REQUEST);
    assert_eq!(huge.error(), "Quantity must be at most 2147483647");

    let costly = app.post("/checkout", None, &guest_order(4_000_000)).await;
    assert_eq!(costly.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        costly.error(),
        "Order total exceeds the maximum of 99999999.99"
    );

    assert!(app.store.orders().is_empty());
    assert!(app.payments.requests().is_empty());
}

#[tokio::test]
async fn test_order_keeps_prices_from_checkout_time() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let order = app.place_order(1, &whey, 2).await;

    app.store.set_price(whey.id, money("120.00"));

    let response = app
        .get(&format!("/orders/{}", order.id), Some(&TestApp::token(1)))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["total_price"], "180.00");
    assert_eq!(response.body["items"][0]["price"], "90.00");
    assert_eq!(response.body["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn test_provider_failure_leaves_nothing_behind() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "90.00").await;
    let token = TestApp::token(1);
    add_to_cart(&app, &token, whey.id.as_i64(), 2).await;
    app.payments.fail_sessions(true);

    let response = app
        .post("/checkout", Some(&token), &json!({ "address": address() }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.error().contains("Your card was declined."));
    assert!(app.store.orders().is_empty());
    assert_eq!(app.store.product(whey.id).unwrap().order_count, 0);
    assert_eq!(app.store.cart_len(TestApp::user(1)), 1);

    // A retry after the provider recovers succeeds
    app.payments.fail_sessions(false);
    let retry = app
        .post("/checkout", Some(&token), &json!({ "address": address() }))
        .await;
    assert_eq!(retry.status, StatusCode::CREATED);
    assert_eq!(app.store.orders().len(), 1);
}

#[tokio::test]
async fn test_subscription_checkout_uses_recurring_prices() {
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
            stripe_subscription_price_id: Some("price_monthly".to_string()),
        })
        .await;
    let token = TestApp::token(3);
    add_to_cart(&app, &token, creatine.id.as_i64(), 2).await;

    let response = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": address(), "is_subscription": true }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["order"]["is_subscription"], true);

    let SessionLines::Recurring(lines) = &app.payments.requests()[0].lines else {
        panic!("expected subscription mode");
    };
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].price_id, "price_monthly");
    assert_eq!(lines[0].quantity, 2);
}

#[tokio::test]
async fn test_subscription_requires_provider_price() {
    let app = TestApp::new();
    let hoodie = app
        .product(ProductCategory::Merchandise, "Logo Hoodie", "55.00")
        .await;
    let token = TestApp::token(3);
    add_to_cart(&app, &token, hoodie.id.as_i64(), 1).await;

    let response = app
        .post(
            "/checkout",
            Some(&token),
            &json!({ "address": address(), "is_subscription": true }),
        )
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.error(),
        "Product 'Logo Hoodie' is not available as a subscription"
    );
    assert!(app.store.orders().is_empty());
}

#[tokio::test]
async fn test_bad_token_never_falls_back_to_guest() {
    let app = TestApp::new();
    let whey = app.product(ProductCategory::Health, "Whey Isolate", "45.50").await;

    let response = app
        .post(
            "/checkout",
            Some("not-a-jwt"),
            &json!({
                "address": address(),
                "email": "guest@example.com",
                "cart_items": [{ "product_id": whey.id, "quantity": 1 }],
            }),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert!(app.store.orders().is_empty());
}

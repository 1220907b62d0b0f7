//! Integration tests for the BoostedLabs storefront.
//!
//! The full router runs in-process against [`MemoryStore`], [`FakePayments`],
//! [`FakeAssistant`] and [`FakeMailer`], so the tests need neither a
//! database nor network access.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p boostedlabs-integration-tests
//! ```

pub mod fakes;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use jsonwebtoken::{EncodingKey, Header, encode};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::{Value, json};
use tower::ServiceExt;

use boostedlabs_core::checkout::CommerceSettings;
use boostedlabs_core::{Money, OrderId, ProductCategory, UserId};
use boostedlabs_storefront::config::{OpenAiConfig, StorefrontConfig, StripeConfig};
use boostedlabs_storefront::db::CatalogStore;
use boostedlabs_storefront::models::{NewProduct, Product};
use boostedlabs_storefront::state::AppState;
use boostedlabs_storefront::{RateLimits, app};

pub use fakes::{FakeAssistant, FakeMailer, FakePayments, WEBHOOK_SECRET};
pub use memory::MemoryStore;

/// Secret the fake auth service signs access tokens with.
pub const JWT_SECRET: &str = "jwt_test_P5sL2vQ9nX4rT8wK1mB6";

/// Reply returned by the fake assistant.
pub const ASSISTANT_REPLY: &str = "Try our creatine, it's on sale.";

pub const FRONTEND_URL: &str = "https://shop.example.test";
pub const BASE_URL: &str = "https://api.example.test";

/// Configuration pointing at nothing real.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://unused".to_string()),
        host: [127, 0, 0, 1].into(),
        port: 0,
        trusted_proxies: Vec::new(),
        base_url: BASE_URL.to_string(),
        frontend_url: FRONTEND_URL.to_string(),
        link_signing_secret: SecretString::from("link_test_H7dF3kW9pZ2xC5vN8qR1".to_string()),
        cancel_link_ttl: Duration::from_secs(24 * 3600),
        auth_jwt_secret: SecretString::from(JWT_SECRET.to_string()),
        stripe: StripeConfig {
            secret_key: SecretString::from("sk_test_unused".to_string()),
            webhook_secret: SecretString::from(WEBHOOK_SECRET.to_string()),
            api_base: "http://127.0.0.1:9".to_string(),
            success_path: "/payment/success".to_string(),
            cancel_path: "/payment/cancel".to_string(),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(1),
        },
        openai: OpenAiConfig {
            api_key: None,
            api_base: "http://127.0.0.1:9".to_string(),
            model: "gpt-4o-mini".to_string(),
        },
        email: None,
        commerce: CommerceSettings::default(),
        sentry_dsn: None,
        sentry_environment: None,
    }
}

/// Amount from a decimal literal such as `"90.00"`.
///
/// # Panics
///
/// Panics on a malformed literal.
#[must_use]
pub fn money(amount: &str) -> Money {
    Money::new(amount.parse::<Decimal>().expect("valid decimal literal"))
}

/// A response with its body decoded.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// JSON body, a JSON string for text bodies, `null` when empty.
    pub body: Value,
}

impl TestResponse {
    /// The `error` message of an error body.
    #[must_use]
    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// The storefront router wired to in-memory collaborators.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub payments: Arc<FakePayments>,
    pub assistant: Arc<FakeAssistant>,
    pub mailer: Arc<FakeMailer>,
    pub config: StorefrontConfig,
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(FakePayments::default());
        let assistant = Arc::new(FakeAssistant::new(ASSISTANT_REPLY));
        let mailer = Arc::new(FakeMailer::default());

        let state = AppState::new(
            config.clone(),
            store.clone(),
            payments.clone(),
            assistant.clone(),
            mailer.clone(),
        );

        Self {
            router: app(state, RateLimits::Disabled),
            store,
            payments,
            assistant,
            mailer,
            config,
        }
    }

    /// Insert a product priced at `price` with no discount.
    ///
    /// # Panics
    ///
    /// Panics if the store rejects the product.
    pub async fn product(&self, category: ProductCategory, name: &str, price: &str) -> Product {
        self.product_with(NewProduct {
            category,
            name: name.to_string(),
            initial_price: money(price),
            discounted_price: money(price),
            description: String::new(),
            available_sizes: Vec::new(),
            available_colors: Vec::new(),
            stripe_price_id: None,
            stripe_subscription_price_id: None,
        })
        .await
    }

    /// # Panics
    ///
    /// Panics if the store rejects the product.
    pub async fn product_with(&self, product: NewProduct) -> Product {
        self.store
            .insert_product(&product)
            .await
            .expect("in-memory insert succeeds")
    }

    /// An access token for `user_id` as the auth service would issue it.
    ///
    /// # Panics
    ///
    /// Panics if the token cannot be encoded.
    #[must_use]
    pub fn token(user_id: i64) -> String {
        let claims = json!({
            "user_id": user_id,
            "username": format!("shopper{user_id}"),
            "token_type": "access",
            "exp": chrono::Utc::now().timestamp() + 3600,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
        )
        .expect("token encodes")
    }

    #[must_use]
    pub const fn user(user_id: i64) -> UserId {
        UserId::new(user_id)
    }

    /// Send a request through the router.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<&Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("valid request");

        self.dispatch(request).await
    }

    /// Post a webhook body with the given `Stripe-Signature` header.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built or the body cannot be read.
    pub async fn webhook(&self, payload: &str, signature: Option<&str>) -> TestResponse {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri("/webhooks/stripe")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(signature) = signature {
            builder = builder.header("stripe-signature", signature);
        }
        let request = builder
            .body(Body::from(payload.to_string()))
            .expect("valid request");

        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: &Value) -> TestResponse {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::POST, uri, token, None).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.send(Method::DELETE, uri, token, None).await
    }

    /// Put `quantity` of `product` in the user's cart and check out.
    ///
    /// # Panics
    ///
    /// Panics unless both requests succeed.
    pub async fn place_order(&self, user_id: i64, product: &Product, quantity: u32) -> PlacedOrder {
        let token = Self::token(user_id);
        let added = self
            .post(
                &format!("/products/{}/add-to-cart", product.id),
                Some(&token),
                &json!({ "quantity": quantity }),
            )
            .await;
        assert_eq!(added.status, StatusCode::OK, "add to cart: {:?}", added.body);

        let placed = self
            .post("/checkout", Some(&token), &json!({ "address": address() }))
            .await;
        assert_eq!(placed.status, StatusCode::CREATED, "checkout: {:?}", placed.body);

        let id = OrderId::new(placed.body["order"]["id"].as_i64().expect("order id"));
        let order = self.store.order(id).expect("order stored");
        let request = self
            .payments
            .requests()
            .into_iter()
            .find(|r| r.order_id == id)
            .expect("session requested");

        PlacedOrder {
            id,
            session_id: order.payment_session_id.expect("session recorded"),
            cancel_path: request
                .cancel_url
                .strip_prefix(BASE_URL)
                .expect("cancel link on the API host")
                .to_string(),
        }
    }
}

/// An order placed through [`TestApp::place_order`].
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub id: OrderId,
    pub session_id: String,
    /// Path of the signed cancel link, relative to the API host.
    pub cancel_path: String,
}

/// A complete home address.
#[must_use]
pub fn address() -> Value {
    json!({
        "name": "Ada Lovelace",
        "phone": "+44 20 7946 0958",
        "address": "12 St James's Square, London",
        "type": "home",
    })
}

/// A `checkout.session.completed` event body.
#[must_use]
pub fn completed_event(session_id: &str, order_id: i64, subscription: Option<&str>) -> String {
    let mode = if subscription.is_some() {
        "subscription"
    } else {
        "payment"
    };
    json!({
        "id": "evt_test_1",
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "object": "checkout.session",
                "client_reference_id": order_id.to_string(),
                "mode": mode,
                "subscription": subscription,
                "metadata": { "order_id": order_id.to_string() },
            }
        }
    })
    .to_string()
}

//! HTTP route handlers for the storefront API.
//!
//! Every handler speaks JSON. Errors are rendered by [`crate::error::AppError`]
//! as `{"error": "<message>"}`.
//!
//! # Route Structure
//!
//! - `/home`, `/products/*` - Catalog, product detail, reviews
//! - `/cart/*` - Authenticated cart
//! - `/checkout`, `/checkout/cancel/{token}` - Order placement and abandon links
//! - `/orders/*` - Order history, cancellation, delivery confirmation
//! - `/webhooks/stripe` - Payment confirmation
//! - `/chat/*` - Shopping assistant
//! - `/contact` - Contact form
//! - `/health`, `/health/ready` - Liveness and readiness checks

pub mod cart;
pub mod catalog;
pub mod chat;
pub mod checkout;
pub mod contact;
pub mod health;
pub mod orders;
pub mod reviews;
pub mod webhooks;

use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

/// Catalog and review routes.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(catalog::health_products))
        .route("/merchandise", get(catalog::merchandise_products))
        .route("/{id}", get(catalog::show))
        .route("/{id}/add-to-cart", post(cart::add))
        .route("/{id}/reviews", post(reviews::create))
        .route("/{id}/review-stats", get(reviews::stats))
}

/// Cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/{item_id}", delete(cart::remove))
        .route("/{item_id}/increase", post(cart::increase))
        .route("/{item_id}/decrease", post(cart::decrease))
}

/// Order routes.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/confirm-delivery", post(orders::confirm_delivery))
}

/// Checkout routes. Rate limited by the binary.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(checkout::place_order))
        .route("/cancel/{token}", get(checkout::cancel_link))
}

/// Assistant routes. Rate limited by the binary.
pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(chat::send))
        .route("/history", get(chat::history))
}

/// Contact form. Rate limited by the binary.
pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/", post(contact::send))
}

/// Routes that are never rate limited.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Health checks
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        // Catalog
        .route("/home", get(catalog::home))
        .nest("/products", product_routes())
        // Cart
        .nest("/cart", cart_routes())
        // Orders
        .nest("/orders", order_routes())
        // Payment provider callbacks
        .route("/webhooks/stripe", post(webhooks::stripe))
}

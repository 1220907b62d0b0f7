//! BoostedLabs Storefront library.
//!
//! The JSON API behind the BoostedLabs shop: catalog, cart, checkout with a
//! hosted payment page, order lifecycle, the shopping assistant and the
//! contact form. Exposed as a library so the integration tests can drive the
//! full router against in-memory collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::middleware::{
    chat_rate_limiter, checkout_rate_limiter, contact_rate_limiter, request_id_middleware,
};
use crate::state::AppState;

/// Whether per-IP rate limits are applied to checkout, chat and the contact
/// form.
///
/// Limits key on the peer address that `into_make_service_with_connect_info`
/// provides, or the forwarded client IP when the peer is a trusted proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimits {
    Enabled,
    Disabled,
}

fn cors_layer(state: &AppState) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match HeaderValue::from_str(&state.config().frontend_url) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            tracing::warn!(error = %e, "FRONTEND_URL is not a valid origin, CORS disabled");
            layer
        }
    }
}

/// Build the full application router.
pub fn app(state: AppState, limits: RateLimits) -> Router {
    let proxies = &state.config().trusted_proxies;
    let (checkout, chat, contact) = match limits {
        RateLimits::Enabled => (
            routes::checkout_routes().layer(checkout_rate_limiter(proxies)),
            routes::chat_routes().layer(chat_rate_limiter(proxies)),
            routes::contact_routes().layer(contact_rate_limiter(proxies)),
        ),
        RateLimits::Disabled => (
            routes::checkout_routes(),
            routes::chat_routes(),
            routes::contact_routes(),
        ),
    };

    let cors = cors_layer(&state);

    Router::new()
        .merge(routes::routes())
        .nest("/checkout", checkout)
        .nest("/chat", chat)
        .nest("/contact", contact)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .layer(cors)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction())
}

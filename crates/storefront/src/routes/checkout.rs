//! Checkout route handlers.

use axum::{
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use chrono::Utc;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb};
use crate::extract::{Json, Path};
use crate::middleware::OptionalAuth;
use crate::services::checkout::{CheckoutBody, CheckoutRequest};
use crate::services::orders::AbandonOutcome;
use crate::state::AppState;

/// `POST /checkout`
///
/// Authenticated callers check out their stored cart; guests send
/// `cart_items` and `email`. Responds 201 with the order and the hosted
/// payment page URL.
#[instrument(skip(state, user, body))]
pub async fn place_order(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(body): Json<CheckoutBody>,
) -> Result<impl IntoResponse> {
    let request = CheckoutRequest::new(user, body);
    let placed = state.checkout().place_order(request, Utc::now()).await?;

    add_breadcrumb(
        "checkout",
        "Order created",
        &[("order_id", &placed.order.order.id.to_string())],
    );
    Ok((StatusCode::CREATED, Json(placed)))
}

/// `GET /checkout/cancel/{token}`
///
/// Where the payment page sends a buyer who backs out. Deletes the unpaid
/// order and answers 302 to the storefront's cancel page, also when the
/// order was kept or is already gone.
#[instrument(skip_all)]
pub async fn cancel_link(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse> {
    let outcome = state.orders().abandon_via_link(&token, Utc::now()).await?;
    tracing::debug!(?outcome, "Cancel link followed");

    if outcome == AbandonOutcome::Deleted {
        add_breadcrumb("checkout", "Abandoned order deleted", &[]);
    }

    let config = state.config();
    let location = config.frontend_link(&config.stripe.cancel_path);
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]))
}

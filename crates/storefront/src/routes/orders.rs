//! Order route handlers.
//!
//! Orders owned by someone else answer 404, same as missing ones.

use axum::extract::State;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::instrument;

use boostedlabs_core::OrderId;

use crate::error::{Result, add_breadcrumb};
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::OrderDetail;
use crate::state::AppState;

/// `GET /orders`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<OrderDetail>>> {
    Ok(Json(state.orders().list(user.id).await?))
}

/// `GET /orders/{id}`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(state.orders().detail(user.id, id).await?))
}

/// `POST /orders/{id}/cancel`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Value>> {
    let status = state.orders().cancel(user.id, id, Utc::now()).await?;
    add_breadcrumb("orders", "Order cancelled", &[("order_id", &id.to_string())]);
    Ok(Json(json!({
        "message": "Order cancelled successfully",
        "status": status,
    })))
}

/// `POST /orders/{id}/confirm-delivery`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn confirm_delivery(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Value>> {
    let status = state.orders().confirm_delivery(user.id, id).await?;
    Ok(Json(json!({
        "message": "Delivery confirmed",
        "status": status,
    })))
}

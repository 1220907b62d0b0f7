//! Payment provider webhook.
//!
//! The body is taken as raw bytes because the signature covers the exact
//! payload. Anything that fails verification is answered with 400 and never
//! touches an order.

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::services::orders::WebhookOutcome;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

/// `POST /webhooks/stripe`
#[instrument(skip_all)]
pub async fn stripe(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Validation("Missing Stripe-Signature header".to_string()))?;

    let event = state
        .payments()
        .verify_webhook(&payload, signature)
        .map_err(|e| {
            tracing::warn!(error = %e, "Rejected webhook");
            AppError::Validation(e.to_string())
        })?;

    match state.orders().handle_webhook(event).await? {
        WebhookOutcome::Applied { order_id, status } => {
            tracing::info!(order_id = %order_id, status = %status, "Payment applied");
        }
        WebhookOutcome::AlreadyApplied { order_id } => {
            tracing::debug!(order_id = %order_id, "Duplicate payment event");
        }
        WebhookOutcome::Ignored => {}
    }

    Ok(Json(json!({ "received": true })))
}

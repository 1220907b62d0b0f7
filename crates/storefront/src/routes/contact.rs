//! Contact form route handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::Json;
use crate::middleware::OptionalAuth;
use crate::models::ContactForm;
use crate::services::mailer::contact_notification;
use crate::state::AppState;

/// `POST /contact`
///
/// Open to guests. Stores the message, linked to the sender when signed in,
/// then notifies the admin inbox. A failed notification is logged and does
/// not fail the request, since the message is already saved.
#[instrument(skip_all)]
pub async fn send(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    Json(form): Json<ContactForm>,
) -> Result<impl IntoResponse> {
    let new_message = form
        .validate(user.map(|u| u.id))
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let message = state.store().insert_contact_message(&new_message).await?;
    add_breadcrumb(
        "contact",
        "Contact message stored",
        &[("message_id", &message.id.to_string())],
    );

    if let Err(e) = state
        .mailer()
        .notify_admin(&contact_notification(&message))
        .await
    {
        tracing::error!(
            error = %e,
            message_id = %message.id,
            "Failed to send contact notification"
        );
    }

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Contact message sent successfully" })),
    ))
}

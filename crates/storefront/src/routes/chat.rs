//! Shopping assistant route handlers.

use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use boostedlabs_core::ChatSender;

use crate::error::{AppError, Result};
use crate::extract::Json;
use crate::middleware::RequireAuth;
use crate::models::ChatMessage;
use crate::services::assistant::HISTORY_LIMIT;
use crate::state::AppState;

const AI_SENDER_NAME: &str = "AI";

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// One entry of `GET /chat/history`.
#[derive(Debug, Serialize)]
pub struct ChatEntry {
    pub sender: String,
    #[serde(rename = "type")]
    pub sender_type: ChatSender,
    pub message: String,
    pub time: DateTime<Utc>,
}

impl From<ChatMessage> for ChatEntry {
    fn from(message: ChatMessage) -> Self {
        Self {
            sender: message.sender_name,
            sender_type: message.sender,
            message: message.message,
            time: message.created_at,
        }
    }
}

/// `POST /chat`
///
/// Stores the user's message, asks the assistant with the recent
/// conversation and a catalog snapshot, stores and returns the reply.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn send(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(body): Json<ChatBody>,
) -> Result<Json<Value>> {
    let query = body
        .message
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| AppError::Validation("Message is required".to_string()))?;

    let store = state.store();
    store
        .insert_chat_message(user.id, ChatSender::User, &user.display_name(), &query)
        .await?;

    let history = store.recent_chat_messages(user.id, HISTORY_LIMIT).await?;
    let catalog = state.catalog_cache().snapshot(store).await?;

    let reply = state
        .assistant()
        .generate_reply(&history, &catalog, &query)
        .await;

    store
        .insert_chat_message(user.id, ChatSender::Ai, AI_SENDER_NAME, &reply)
        .await?;

    Ok(Json(json!({ "reply": reply })))
}

/// `GET /chat/history`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn history(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<ChatEntry>>> {
    let messages = state.store().chat_history(user.id).await?;
    Ok(Json(messages.into_iter().map(ChatEntry::from).collect()))
}

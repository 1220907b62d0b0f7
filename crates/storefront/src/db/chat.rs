//! Chat messages in `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use boostedlabs_core::{ChatMessageId, ChatSender, UserId};

use super::store::ChatStore;
use super::{PgStore, RepositoryError};
use crate::models::ChatMessage;

const CHAT_COLUMNS: &str = "id, user_id, sender, sender_name, message, created_at";

#[derive(sqlx::FromRow)]
struct ChatMessageRow {
    id: ChatMessageId,
    user_id: UserId,
    sender: ChatSender,
    sender_name: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            sender: row.sender,
            sender_name: row.sender_name,
            message: row.message,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ChatStore for PgStore {
    async fn insert_chat_message(
        &self,
        user: UserId,
        sender: ChatSender,
        sender_name: &str,
        message: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let row: ChatMessageRow = sqlx::query_as(&format!(
            "INSERT INTO shop.chat_message (user_id, sender, sender_name, message)
             VALUES ($1, $2, $3, $4)
             RETURNING {CHAT_COLUMNS}"
        ))
        .bind(user)
        .bind(sender)
        .bind(sender_name)
        .bind(message)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }

    async fn recent_chat_messages(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows: Vec<ChatMessageRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLUMNS} FROM (
                 SELECT {CHAT_COLUMNS} FROM shop.chat_message
                 WHERE user_id = $1
                 ORDER BY created_at DESC, id DESC
                 LIMIT $2
             ) latest
             ORDER BY created_at, id"
        ))
        .bind(user)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }

    async fn chat_history(&self, user: UserId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows: Vec<ChatMessageRow> = sqlx::query_as(&format!(
            "SELECT {CHAT_COLUMNS} FROM shop.chat_message
             WHERE user_id = $1
             ORDER BY created_at, id"
        ))
        .bind(user)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}

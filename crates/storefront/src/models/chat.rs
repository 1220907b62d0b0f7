//! Assistant conversation messages.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boostedlabs_core::{ChatMessageId, ChatSender, UserId};

/// One stored chat message, from the user or the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: ChatMessageId,
    pub user_id: UserId,
    pub sender: ChatSender,
    /// Username for user messages, `AI` for replies.
    pub sender_name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

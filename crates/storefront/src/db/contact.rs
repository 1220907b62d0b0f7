//! Contact form submissions in `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use boostedlabs_core::{ContactMessageId, Email, UserId};

use super::store::ContactStore;
use super::{PgStore, RepositoryError};
use crate::models::{ContactMessage, NewContactMessage};

#[derive(sqlx::FromRow)]
struct ContactMessageRow {
    id: ContactMessageId,
    user_id: Option<UserId>,
    name: String,
    whatsapp: String,
    email: Email,
    project_details: String,
    sent_at: DateTime<Utc>,
}

impl From<ContactMessageRow> for ContactMessage {
    fn from(row: ContactMessageRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            whatsapp: row.whatsapp,
            email: row.email,
            project_details: row.project_details,
            sent_at: row.sent_at,
        }
    }
}

#[async_trait]
impl ContactStore for PgStore {
    async fn insert_contact_message(
        &self,
        message: &NewContactMessage,
    ) -> Result<ContactMessage, RepositoryError> {
        let row: ContactMessageRow = sqlx::query_as(
            "INSERT INTO shop.contact_message (user_id, name, whatsapp, email, project_details)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, user_id, name, whatsapp, email, project_details, sent_at",
        )
        .bind(message.user_id)
        .bind(&message.name)
        .bind(&message.whatsapp)
        .bind(&message.email)
        .bind(&message.project_details)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }
}

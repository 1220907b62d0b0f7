//! Contact form submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use boostedlabs_core::{ContactMessageId, Email, UserId};

const MAX_NAME_LENGTH: usize = 255;
const MAX_WHATSAPP_LENGTH: usize = 20;

/// Why a contact form was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContactFormError {
    #[error("All fields are required")]
    MissingField,
    #[error("Enter a valid email address")]
    InvalidEmail,
    #[error("Name must be at most {MAX_NAME_LENGTH} characters")]
    NameTooLong,
    #[error("WhatsApp number must be at most {MAX_WHATSAPP_LENGTH} characters")]
    WhatsappTooLong,
}

/// The form as posted. Every field is optional so that a missing field gets
/// the same answer as an empty one.
#[derive(Debug, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub project_details: Option<String>,
}

/// A validated submission, ready to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContactMessage {
    pub user_id: Option<UserId>,
    pub name: String,
    pub whatsapp: String,
    pub email: Email,
    pub project_details: String,
}

/// One stored submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContactMessage {
    pub id: ContactMessageId,
    /// Set when the sender was signed in.
    pub user_id: Option<UserId>,
    pub name: String,
    pub whatsapp: String,
    pub email: Email,
    pub project_details: String,
    pub sent_at: DateTime<Utc>,
}

fn required(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ContactForm {
    /// Check the form and attach the sender, if signed in.
    ///
    /// # Errors
    ///
    /// Returns [`ContactFormError::MissingField`] if any field is missing or
    /// blank, before looking at the email address or field lengths.
    pub fn validate(
        self,
        user_id: Option<UserId>,
    ) -> Result<NewContactMessage, ContactFormError> {
        let (Some(name), Some(whatsapp), Some(email), Some(project_details)) = (
            required(self.name),
            required(self.whatsapp),
            required(self.email),
            required(self.project_details),
        ) else {
            return Err(ContactFormError::MissingField);
        };

        let email = Email::parse(&email).map_err(|_| ContactFormError::InvalidEmail)?;
        if name.chars().count() > MAX_NAME_LENGTH {
            return Err(ContactFormError::NameTooLong);
        }
        if whatsapp.chars().count() > MAX_WHATSAPP_LENGTH {
            return Err(ContactFormError::WhatsappTooLong);
        }

        Ok(NewContactMessage {
            user_id,
            name,
            whatsapp,
            email,
            project_details,
        })
    }
}

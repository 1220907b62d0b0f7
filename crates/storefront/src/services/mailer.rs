//! Admin email notifications over SMTP via lettre.
//!
//! The store sends plain-text notifications to a single admin inbox. Routes
//! depend on the [`Mailer`] trait so tests can record mail instead of
//! sending it. Without SMTP settings the [`DisabledMailer`] drops mail.

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::{Error as SmtpError, authentication::Credentials};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::ExposeSecret;
use thiserror::Error;

use crate::config::EmailConfig;
use crate::models::ContactMessage;

/// Subject of the contact form notification.
pub const CONTACT_SUBJECT: &str = "New Contact Message Received";

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),
}

/// A plain-text email to the admin inbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    /// Address the admin's reply should go to.
    pub reply_to: Option<String>,
}

/// The admin notification for a contact form submission.
#[must_use]
pub fn contact_notification(message: &ContactMessage) -> Notification {
    Notification {
        subject: CONTACT_SUBJECT.to_string(),
        body: format!(
            "Name: {}\nEmail: {}\nWhatsApp: {}\n\nProject Details:\n{}\n",
            message.name, message.email, message.whatsapp, message.project_details
        ),
        reply_to: Some(message.email.to_string()),
    }
}

/// Delivers admin notifications.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Send `notification` to the admin inbox.
    async fn notify_admin(&self, notification: &Notification) -> Result<(), MailError>;
}

/// SMTP delivery through a pooled STARTTLS connection.
#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    admin: Mailbox,
}

fn parse_mailbox(address: &str) -> Result<Mailbox, MailError> {
    address
        .parse()
        .map_err(|_| MailError::InvalidAddress(address.to_string()))
}

impl SmtpMailer {
    /// Create a mailer from configuration. No connection is opened until
    /// the first send.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay host or either address is invalid.
    pub fn new(config: &EmailConfig) -> Result<Self, MailError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            transport,
            from: parse_mailbox(&config.from_address)?,
            admin: parse_mailbox(&config.admin_address)?,
        })
    }

    fn build(&self, notification: &Notification) -> Result<Message, MailError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.admin.clone())
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN);

        // A sender address lettre cannot parse only costs the Reply-To header.
        if let Some(reply_to) = notification
            .reply_to
            .as_deref()
            .and_then(|address| address.parse::<Mailbox>().ok())
        {
            builder = builder.reply_to(reply_to);
        }

        Ok(builder.body(notification.body.clone())?)
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn notify_admin(&self, notification: &Notification) -> Result<(), MailError> {
        let email = self.build(notification)?;
        self.transport.send(email).await?;

        tracing::info!(subject = %notification.subject, "Admin notification sent");
        Ok(())
    }
}

/// Used when SMTP is not configured. Notifications are logged and dropped.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn notify_admin(&self, notification: &Notification) -> Result<(), MailError> {
        tracing::debug!(
            subject = %notification.subject,
            "SMTP not configured, notification dropped"
        );
        Ok(())
    }
}

//! Payment provider integration.
//!
//! Checkout and the webhook handler only talk to [`PaymentProvider`]. The
//! production implementation is [`StripeClient`]; tests inject a fake.
//!
//! # Flow
//!
//! 1. Checkout calls [`PaymentProvider::create_session`] inside the order
//!    transaction and stores the returned session ID on the order.
//! 2. The buyer pays on the provider's hosted page.
//! 3. The provider posts a signed `checkout.session.completed` event, which
//!    [`PaymentProvider::verify_webhook`] authenticates and decodes.
//! 4. For subscriptions, [`PaymentProvider::subscription_items`] lists the
//!    billed items so each product record keeps its item ID.

mod stripe;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use boostedlabs_core::{Money, OrderId, ProductId, UserId};

pub use stripe::{SIGNATURE_TOLERANCE_SECS, StripeClient, parse_event, verify_signature};

/// Errors from the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request never got a response (connect failure, timeout).
    #[error("Payment provider unavailable: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with an error.
    #[error("Payment provider error: {message}")]
    Api { status: u16, message: String },

    /// The provider's response could not be understood.
    #[error("Unexpected payment provider response: {0}")]
    Parse(String),

    /// A webhook failed signature verification.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),
}

/// One-off line priced inline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLineItem {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: u32,
}

/// Subscription line referencing a recurring price configured at the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurringLineItem {
    pub product_id: ProductId,
    pub price_id: String,
    pub quantity: u32,
}

/// What the hosted checkout page charges for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionLines {
    /// Payment mode. Includes the shipping line.
    OneTime(Vec<SessionLineItem>),
    /// Subscription mode. No shipping line.
    Recurring(Vec<RecurringLineItem>),
}

impl SessionLines {
    #[must_use]
    pub const fn mode(&self) -> &'static str {
        match self {
            Self::OneTime(_) => "payment",
            Self::Recurring(_) => "subscription",
        }
    }
}

/// Input for a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSessionRequest {
    /// Echoed back as `client_reference_id` on completion.
    pub order_id: OrderId,
    pub user_id: Option<UserId>,
    /// Prefills the payment page for guests.
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub lines: SessionLines,
}

/// A created hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// The completed-session payload of `checkout.session.completed`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct CompletedSession {
    /// Session ID (`cs_...`).
    #[serde(default)]
    pub id: Option<String>,
    /// The order ID given when the session was created.
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// `payment` or `subscription`.
    #[serde(default)]
    pub mode: Option<String>,
    /// Subscription ID for subscription-mode sessions.
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CompletedSession {
    /// The order this session was created for.
    ///
    /// Prefers `client_reference_id` and falls back to `metadata.order_id`.
    #[must_use]
    pub fn order_id(&self) -> Option<OrderId> {
        self.client_reference_id
            .as_deref()
            .or_else(|| self.metadata.get("order_id").map(String::as_str))
            .and_then(|raw| raw.trim().parse().ok())
    }

    #[must_use]
    pub fn is_subscription(&self) -> bool {
        self.mode.as_deref() == Some("subscription")
    }
}

/// A verified webhook event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEvent {
    CheckoutCompleted(CompletedSession),
    /// Any other event type. Acknowledged and ignored.
    Other { event_type: String },
}

/// One line item of a provider subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionItem {
    /// Item ID (`si_...`).
    pub id: String,
    /// Recurring price the item bills.
    pub price_id: String,
    pub quantity: u32,
}

/// A payment provider with hosted checkout and signed webhooks.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a hosted checkout session.
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError>;

    /// Line items of a subscription created by a completed session.
    async fn subscription_items(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<SubscriptionItem>, PaymentError>;

    /// Authenticate a webhook body against its signature header and decode it.
    fn verify_webhook(&self, payload: &[u8], signature: &str)
    -> Result<WebhookEvent, PaymentError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_id_prefers_client_reference() {
        let session = CompletedSession {
            client_reference_id: Some("42".to_string()),
            metadata: HashMap::from([("order_id".to_string(), "7".to_string())]),
            ..Default::default()
        };
        assert_eq!(session.order_id(), Some(OrderId::new(42)));
    }

    #[test]
    fn test_order_id_falls_back_to_metadata() {
        let session = CompletedSession {
            metadata: HashMap::from([("order_id".to_string(), "7".to_string())]),
            ..Default::default()
        };
        assert_eq!(session.order_id(), Some(OrderId::new(7)));
    }

    #[test]
    fn test_order_id_rejects_garbage() {
        let session = CompletedSession {
            client_reference_id: Some("not-a-number".to_string()),
            ..Default::default()
        };
        assert_eq!(session.order_id(), None);
    }

    #[test]
    fn test_mode_names() {
        assert_eq!(SessionLines::OneTime(vec![]).mode(), "payment");
        assert_eq!(SessionLines::Recurring(vec![]).mode(), "subscription");
    }
}

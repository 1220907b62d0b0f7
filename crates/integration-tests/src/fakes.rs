//! Fake external collaborators: payment provider, assistant and mailer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use boostedlabs_storefront::models::ChatMessage;
use boostedlabs_storefront::services::assistant::ReplyGenerator;
use boostedlabs_storefront::services::mailer::{MailError, Mailer, Notification};
use boostedlabs_storefront::services::payments::{
    CheckoutSession, CheckoutSessionRequest, PaymentError, PaymentProvider, SubscriptionItem,
    WebhookEvent, parse_event, verify_signature,
};

type HmacSha256 = Hmac<Sha256>;

/// Webhook secret shared by [`FakePayments`] and the signed test payloads.
pub const WEBHOOK_SECRET: &str = "whsec_test_Kq3mV8xN2pR7tY4wZ6bC";

/// Payment provider that records sessions and checks real signatures.
#[derive(Default)]
pub struct FakePayments {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
    sessions: AtomicU32,
    failing: AtomicBool,
    subscriptions: Mutex<HashMap<String, Vec<SubscriptionItem>>>,
}

impl FakePayments {
    /// Make every following `create_session` fail, as if the card network
    /// rejected the request.
    pub fn fail_sessions(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Register the items of a subscription. Unknown subscriptions fail to
    /// list, as the provider answers 404.
    pub fn add_subscription(&self, subscription_id: &str, items: Vec<SubscriptionItem>) {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subscription_id.to_string(), items);
    }

    /// Session requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `Stripe-Signature` header for `payload` signed at `timestamp`.
    #[must_use]
    pub fn signature_at(payload: &[u8], timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(WEBHOOK_SECRET.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    /// `Stripe-Signature` header for `payload` signed now.
    #[must_use]
    pub fn signature(payload: &[u8]) -> String {
        Self::signature_at(payload, chrono::Utc::now().timestamp())
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                status: 402,
                message: "Your card was declined.".to_string(),
            });
        }

        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("cs_test_{n}");
        Ok(CheckoutSession {
            url: format!("https://checkout.stripe.test/c/pay/{id}"),
            id,
        })
    }

    async fn subscription_items(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<SubscriptionItem>, PaymentError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| PaymentError::Api {
                status: 404,
                message: format!("No such subscription: '{subscription_id}'"),
            })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_signature(
            WEBHOOK_SECRET.as_bytes(),
            payload,
            signature,
            chrono::Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}

/// What the assistant was asked.
#[derive(Debug, Clone)]
pub struct AssistantCall {
    pub history: Vec<ChatMessage>,
    pub catalog: String,
    pub query: String,
}

/// Assistant that answers with a fixed reply and records every call.
pub struct FakeAssistant {
    reply: String,
    calls: Mutex<Vec<AssistantCall>>,
}

impl FakeAssistant {
    #[must_use]
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<AssistantCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ReplyGenerator for FakeAssistant {
    async fn generate_reply(&self, history: &[ChatMessage], catalog: &str, query: &str) -> String {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AssistantCall {
                history: history.to_vec(),
                catalog: catalog.to_string(),
                query: query.to_string(),
            });
        self.reply.clone()
    }
}

/// Mailer that records notifications instead of sending them.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl FakeMailer {
    /// Make every following send fail, as if the SMTP relay were down.
    pub fn fail_sends(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Notifications delivered so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    async fn notify_admin(&self, notification: &Notification) -> Result<(), MailError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MailError::InvalidAddress("relay unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());
        Ok(())
    }
}

//! Stripe Checkout client and webhook verification.
//!
//! Sessions are created with a form-encoded `POST /v1/checkout/sessions`.
//! Webhooks carry a `Stripe-Signature: t=<unix>,v1=<hex>` header where the
//! signature is HMAC-SHA256 over `"{t}.{body}"` with the endpoint secret.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, instrument};

use super::{
    CheckoutSession, CheckoutSessionRequest, CompletedSession, PaymentError, PaymentProvider,
    SessionLines, SubscriptionItem, WebhookEvent,
};
use crate::config::StripeConfig;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook timestamp, in seconds.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    api_base: String,
    secret_key: SecretString,
    webhook_secret: SecretString,
    currency: String,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                secret_key: config.secret_key.clone(),
                webhook_secret: config.webhook_secret.clone(),
                currency: config.currency.clone(),
            }),
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    async fn create_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let form = session_form(request, &self.inner.currency)?;
        let url = format!("{}/v1/checkout/sessions", self.inner.api_base);

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "Stripe returned non-success status"
            );
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let session: SessionResponse =
            serde_json::from_str(&body).map_err(|e| PaymentError::Parse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::Parse("checkout session has no url".to_string()))?;

        debug!(session_id = %session.id, "Checkout session created");
        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }

    #[instrument(skip(self))]
    async fn subscription_items(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<SubscriptionItem>, PaymentError> {
        let url = format!("{}/v1/subscription_items", self.inner.api_base);

        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(self.inner.secret_key.expose_secret())
            .query(&[("subscription", subscription_id)])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        parse_subscription_items(&body)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, PaymentError> {
        verify_signature(
            self.inner.webhook_secret.expose_secret().as_bytes(),
            payload,
            signature,
            Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}

#[derive(Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct SubscriptionItemList {
    data: Vec<RawSubscriptionItem>,
}

#[derive(Deserialize)]
struct RawSubscriptionItem {
    id: String,
    price: RawPrice,
    #[serde(default = "default_item_quantity")]
    quantity: u32,
}

#[derive(Deserialize)]
struct RawPrice {
    id: String,
}

const fn default_item_quantity() -> u32 {
    1
}

fn parse_subscription_items(body: &str) -> Result<Vec<SubscriptionItem>, PaymentError> {
    let list: SubscriptionItemList =
        serde_json::from_str(body).map_err(|e| PaymentError::Parse(e.to_string()))?;
    Ok(list
        .data
        .into_iter()
        .map(|item| SubscriptionItem {
            id: item.id,
            price_id: item.price.id,
            quantity: item.quantity,
        })
        .collect())
}

fn api_error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .ok()
        .and_then(|r| r.error.message)
        .unwrap_or_else(|| body.chars().take(200).collect())
}

/// Build the form fields of a create-session call.
fn session_form(
    request: &CheckoutSessionRequest,
    currency: &str,
) -> Result<Vec<(String, String)>, PaymentError> {
    let mut form = vec![
        ("mode".to_string(), request.lines.mode().to_string()),
        (
            "client_reference_id".to_string(),
            request.order_id.to_string(),
        ),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        (
            "metadata[order_id]".to_string(),
            request.order_id.to_string(),
        ),
    ];

    if let Some(user_id) = request.user_id {
        form.push(("metadata[user_id]".to_string(), user_id.to_string()));
    }
    if let Some(email) = &request.customer_email {
        form.push(("customer_email".to_string(), email.clone()));
    }

    match &request.lines {
        SessionLines::OneTime(items) => {
            for (i, item) in items.iter().enumerate() {
                let cents = item.unit_amount.minor_units().ok_or_else(|| {
                    PaymentError::Parse(format!("amount out of range: {}", item.unit_amount))
                })?;
                let prefix = format!("line_items[{i}]");
                form.push((
                    format!("{prefix}[price_data][currency]"),
                    currency.to_string(),
                ));
                form.push((
                    format!("{prefix}[price_data][product_data][name]"),
                    item.name.clone(),
                ));
                form.push((
                    format!("{prefix}[price_data][unit_amount]"),
                    cents.to_string(),
                ));
                form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            }
        }
        SessionLines::Recurring(items) => {
            for (i, item) in items.iter().enumerate() {
                let prefix = format!("line_items[{i}]");
                form.push((format!("{prefix}[price]"), item.price_id.clone()));
                form.push((format!("{prefix}[quantity]"), item.quantity.to_string()));
            }
        }
    }

    Ok(form)
}

/// Check a `Stripe-Signature` header against the raw body.
///
/// Any `v1` entry may match. The timestamp must be within
/// [`SIGNATURE_TOLERANCE_SECS`] of `now`.
///
/// # Errors
///
/// Returns `InvalidSignature` if the header is malformed, stale or matches
/// no signature.
pub fn verify_signature(
    secret: &[u8],
    payload: &[u8],
    header: &str,
    now: i64,
) -> Result<(), PaymentError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp
        .ok_or_else(|| PaymentError::InvalidSignature("missing timestamp".to_string()))?;
    let ts: i64 = timestamp
        .parse()
        .map_err(|_| PaymentError::InvalidSignature("invalid timestamp".to_string()))?;
    if now.abs_diff(ts) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(PaymentError::InvalidSignature(
            "timestamp outside tolerance".to_string(),
        ));
    }
    if signatures.is_empty() {
        return Err(PaymentError::InvalidSignature(
            "no v1 signature".to_string(),
        ));
    }

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| PaymentError::InvalidSignature(e.to_string()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    let matched = signatures.into_iter().any(|candidate| {
        hex::decode(candidate).is_ok_and(|bytes| mac.clone().verify_slice(&bytes).is_ok())
    });
    if !matched {
        return Err(PaymentError::InvalidSignature(
            "signature mismatch".to_string(),
        ));
    }

    debug!("Stripe signature verified");
    Ok(())
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

/// Decode a verified webhook body.
///
/// # Errors
///
/// Returns `Parse` if the body is not an event envelope, or if a
/// `checkout.session.completed` object cannot be read.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, PaymentError> {
    let raw: RawEvent =
        serde_json::from_slice(payload).map_err(|e| PaymentError::Parse(e.to_string()))?;

    if raw.event_type == "checkout.session.completed" {
        let session: CompletedSession = serde_json::from_value(raw.data.object)
            .map_err(|e| PaymentError::Parse(e.to_string()))?;
        return Ok(WebhookEvent::CheckoutCompleted(session));
    }

    Ok(WebhookEvent::Other {
        event_type: raw.event_type,
    })
}

//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::db::{PgStore, ShopStore};
use crate::middleware::TokenVerifier;
use crate::services::assistant::{
    AssistantError, CatalogCache, DisabledAssistant, OpenAiClient, ReplyGenerator,
};
use crate::services::checkout::{CheckoutService, CheckoutUrls};
use crate::services::mailer::{DisabledMailer, MailError, Mailer, SmtpMailer};
use crate::services::orders::OrderService;
use crate::services::payments::{PaymentError, PaymentProvider, StripeClient};
use crate::services::signing::LinkSigner;

/// Error building the production state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("payment client: {0}")]
    Payments(#[from] PaymentError),
    #[error("assistant client: {0}")]
    Assistant(#[from] AssistantError),
    #[error("mailer: {0}")]
    Mailer(#[from] MailError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. External collaborators sit behind trait
/// objects so tests can swap in in-memory fakes.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    store: Arc<dyn ShopStore>,
    payments: Arc<dyn PaymentProvider>,
    assistant: Arc<dyn ReplyGenerator>,
    mailer: Arc<dyn Mailer>,
    signer: LinkSigner,
    tokens: TokenVerifier,
    catalog: CatalogCache,
    checkout_urls: CheckoutUrls,
}

impl AppState {
    /// Create state from explicit collaborators.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        store: Arc<dyn ShopStore>,
        payments: Arc<dyn PaymentProvider>,
        assistant: Arc<dyn ReplyGenerator>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let signer = LinkSigner::new(config.link_signing_secret.clone(), config.cancel_link_ttl);
        let tokens = TokenVerifier::new(&config.auth_jwt_secret);
        let checkout_urls = CheckoutUrls {
            success_url: format!(
                "{}?session_id={{CHECKOUT_SESSION_ID}}",
                config.frontend_link(&config.stripe.success_path)
            ),
            cancel_base: format!("{}/checkout/cancel", config.base_url),
        };

        Self {
            inner: Arc::new(AppStateInner {
                config,
                store,
                payments,
                assistant,
                mailer,
                signer,
                tokens,
                catalog: CatalogCache::default(),
                checkout_urls,
            }),
        }
    }

    /// Production state: Postgres store and Stripe, plus OpenAI and SMTP
    /// when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client or the SMTP transport cannot be
    /// built.
    pub fn from_config(config: StorefrontConfig, pool: PgPool) -> Result<Self, StateError> {
        let payments = Arc::new(StripeClient::new(&config.stripe)?);
        let assistant: Arc<dyn ReplyGenerator> = match &config.openai.api_key {
            Some(key) => Arc::new(OpenAiClient::new(
                key.clone(),
                &config.openai.api_base,
                &config.openai.model,
            )?),
            None => {
                tracing::warn!("OPENAI_API_KEY not set, chat assistant disabled");
                Arc::new(DisabledAssistant)
            }
        };

        let mailer: Arc<dyn Mailer> = match &config.email {
            Some(email) => Arc::new(SmtpMailer::new(email)?),
            None => {
                tracing::warn!("SMTP_HOST not set, contact notifications disabled");
                Arc::new(DisabledMailer)
            }
        };

        Ok(Self::new(
            config,
            Arc::new(PgStore::new(pool)),
            payments,
            assistant,
            mailer,
        ))
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &dyn ShopStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn payments(&self) -> &dyn PaymentProvider {
        self.inner.payments.as_ref()
    }

    #[must_use]
    pub fn assistant(&self) -> &dyn ReplyGenerator {
        self.inner.assistant.as_ref()
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn Mailer {
        self.inner.mailer.as_ref()
    }

    #[must_use]
    pub fn token_verifier(&self) -> &TokenVerifier {
        &self.inner.tokens
    }

    /// Catalog text for assistant prompts.
    #[must_use]
    pub fn catalog_cache(&self) -> &CatalogCache {
        &self.inner.catalog
    }

    #[must_use]
    pub fn checkout(&self) -> CheckoutService<'_> {
        CheckoutService::new(
            self.store(),
            self.payments(),
            &self.inner.signer,
            self.inner.config.commerce,
            &self.inner.checkout_urls,
        )
    }

    #[must_use]
    pub fn orders(&self) -> OrderService<'_> {
        OrderService::new(
            self.store(),
            self.payments(),
            &self.inner.signer,
            self.inner.config.commerce.cancel_window_hours,
        )
    }
}

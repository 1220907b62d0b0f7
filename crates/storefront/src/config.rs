//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `STOREFRONT_BASE_URL` - Public URL of this API, used to build signed cancel links
//! - `FRONTEND_URL` - Public URL of the shop frontend, target of payment redirects
//! - `LINK_SIGNING_SECRET` - Secret for signed order links (min 32 chars, high entropy)
//! - `AUTH_JWT_SECRET` - HS256 secret shared with the auth service (min 32 chars)
//! - `STRIPE_SECRET_KEY` - Stripe API secret key
//! - `STRIPE_WEBHOOK_SECRET` - Stripe webhook endpoint signing secret
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `TRUSTED_PROXIES` - Comma-separated proxy IPs whose `X-Forwarded-For` is
//!   believed by the rate limiters (default: none, key on the peer address)
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `STRIPE_SUCCESS_PATH` - Frontend path after payment (default: /payment/success)
//! - `STRIPE_CANCEL_PATH` - Frontend path after an abandoned payment (default: /payment/cancel)
//! - `STRIPE_CURRENCY` - ISO currency code (default: usd)
//! - `STRIPE_TIMEOUT_SECS` - Timeout for Stripe API calls (default: 15)
//! - `OPENAI_API_KEY` - Enables the chat assistant
//! - `OPENAI_API_BASE` - OpenAI API base URL (default: <https://api.openai.com>)
//! - `OPENAI_MODEL` - Chat model (default: gpt-4o)
//! - `SHIPPING_FEE` - Flat shipping fee (default: 50.00)
//! - `FREE_ITEM_THRESHOLD` - Subtotal that earns the free T-shirt (default: 1500.00)
//! - `CANCEL_WINDOW_HOURS` - Buyer cancellation window (default: 48)
//! - `CANCEL_LINK_TTL_HOURS` - Lifetime of signed cancel links (default: 24)
//! - `SMTP_HOST` - Enables contact form notifications; the settings below are then required
//!   - `SMTP_PORT` - SMTP server port (default: 587)
//!   - `SMTP_USERNAME` - SMTP authentication username
//!   - `SMTP_PASSWORD` - SMTP authentication password
//!   - `SMTP_FROM` - Sender address of notifications
//!   - `ADMIN_EMAIL` - Recipient of contact form notifications
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use boostedlabs_core::Money;
use boostedlabs_core::checkout::CommerceSettings;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SIGNING_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Reverse proxies allowed to report the client IP
    pub trusted_proxies: Vec<IpAddr>,
    /// Public base URL of this API
    pub base_url: String,
    /// Public base URL of the shop frontend
    pub frontend_url: String,
    /// Secret for signed order links
    pub link_signing_secret: SecretString,
    /// Lifetime of a signed cancel link
    pub cancel_link_ttl: Duration,
    /// HS256 secret for access tokens
    pub auth_jwt_secret: SecretString,
    /// Payment provider settings
    pub stripe: StripeConfig,
    /// Chat assistant settings
    pub openai: OpenAiConfig,
    /// SMTP settings; contact notifications are off without them
    pub email: Option<EmailConfig>,
    /// Shipping fee, free-item threshold and cancellation window
    pub commerce: CommerceSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Stripe API configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct StripeConfig {
    /// API secret key (`sk_...`)
    pub secret_key: SecretString,
    /// Webhook signing secret (`whsec_...`)
    pub webhook_secret: SecretString,
    /// API base URL, overridable for tests and mocks
    pub api_base: String,
    /// Frontend path the buyer lands on after paying
    pub success_path: String,
    /// Frontend path the buyer lands on after abandoning payment
    pub cancel_path: String,
    /// Lowercase ISO currency code
    pub currency: String,
    /// Timeout for each API call
    pub timeout: Duration,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("webhook_secret", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("success_path", &self.success_path)
            .field("cancel_path", &self.cancel_path)
            .field("currency", &self.currency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// OpenAI configuration for the chat assistant.
#[derive(Clone)]
pub struct OpenAiConfig {
    /// API key; the assistant is disabled without one
    pub api_key: Option<SecretString>,
    /// API base URL
    pub api_base: String,
    /// Chat model name
    pub model: String,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .finish()
    }
}

/// Email (SMTP) configuration for admin notifications.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
    /// Where contact form notifications go
    pub admin_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .field("admin_address", &self.admin_address)
            .finish()
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("STOREFRONT_DATABASE_URL")?;
        let host = parse_env_or_default::<IpAddr>("STOREFRONT_HOST", "127.0.0.1")?;
        let port = parse_env_or_default::<u16>("STOREFRONT_PORT", "3000")?;
        let trusted_proxies = parse_ip_list(
            "TRUSTED_PROXIES",
            &get_optional_env("TRUSTED_PROXIES").unwrap_or_default(),
        )?;
        let base_url = get_url("STOREFRONT_BASE_URL")?;
        let frontend_url = get_url("FRONTEND_URL")?;

        let link_signing_secret = get_validated_secret("LINK_SIGNING_SECRET")?;
        validate_secret_length(&link_signing_secret, "LINK_SIGNING_SECRET")?;
        let auth_jwt_secret = get_required_secret("AUTH_JWT_SECRET")?;
        validate_secret_length(&auth_jwt_secret, "AUTH_JWT_SECRET")?;

        let cancel_link_hours = parse_env_or_default::<u64>("CANCEL_LINK_TTL_HOURS", "24")?;

        Ok(Self {
            database_url,
            host,
            port,
            trusted_proxies,
            base_url,
            frontend_url,
            link_signing_secret,
            cancel_link_ttl: Duration::from_secs(cancel_link_hours * 3600),
            auth_jwt_secret,
            stripe: StripeConfig::from_env()?,
            openai: OpenAiConfig::from_env(),
            email: EmailConfig::from_env()?,
            commerce: commerce_from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Absolute frontend URL for a path such as `/payment/success`.
    #[must_use]
    pub fn frontend_link(&self, path: &str) -> String {
        format!("{}{}", self.frontend_url, path)
    }
}

impl StripeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = parse_env_or_default::<u64>("STRIPE_TIMEOUT_SECS", "15")?;
        Ok(Self {
            secret_key: get_validated_secret("STRIPE_SECRET_KEY")?,
            webhook_secret: get_validated_secret("STRIPE_WEBHOOK_SECRET")?,
            api_base: get_env_or_default("STRIPE_API_BASE", "https://api.stripe.com")
                .trim_end_matches('/')
                .to_string(),
            success_path: get_env_or_default("STRIPE_SUCCESS_PATH", "/payment/success"),
            cancel_path: get_env_or_default("STRIPE_CANCEL_PATH", "/payment/cancel"),
            currency: get_env_or_default("STRIPE_CURRENCY", "usd").to_lowercase(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl OpenAiConfig {
    fn from_env() -> Self {
        Self {
            api_key: get_optional_env("OPENAI_API_KEY")
                .filter(|key| !key.is_empty())
                .map(SecretString::from),
            api_base: get_env_or_default("OPENAI_API_BASE", "https://api.openai.com")
                .trim_end_matches('/')
                .to_string(),
            model: get_env_or_default("OPENAI_MODEL", "gpt-4o"),
        }
    }
}

impl EmailConfig {
    /// `None` when `SMTP_HOST` is unset or empty.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = get_optional_env("SMTP_HOST").filter(|host| !host.is_empty()) else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: parse_env_or_default::<u16>("SMTP_PORT", "587")?,
            smtp_username: get_required_env("SMTP_USERNAME")?,
            smtp_password: get_validated_secret("SMTP_PASSWORD")?,
            from_address: get_required_env("SMTP_FROM")?,
            admin_address: get_required_env("ADMIN_EMAIL")?,
        }))
    }
}

fn commerce_from_env() -> Result<CommerceSettings, ConfigError> {
    let defaults = CommerceSettings::default();
    let shipping_fee = match get_optional_env("SHIPPING_FEE") {
        Some(raw) => parse_money("SHIPPING_FEE", &raw)?,
        None => defaults.shipping_fee,
    };
    let free_item_threshold = match get_optional_env("FREE_ITEM_THRESHOLD") {
        Some(raw) => parse_money("FREE_ITEM_THRESHOLD", &raw)?,
        None => defaults.free_item_threshold,
    };
    let cancel_window_hours = parse_env_or_default::<u32>(
        "CANCEL_WINDOW_HOURS",
        &defaults.cancel_window_hours.to_string(),
    )?;

    Ok(CommerceSettings {
        shipping_fee,
        free_item_threshold,
        cancel_window_hours,
    })
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get a required absolute URL, without a trailing slash.
fn get_url(key: &str) -> Result<String, ConfigError> {
    let value = get_required_env(key)?;
    url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(value.trim_end_matches('/').to_string())
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env_or_default<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse a comma-separated list of IP addresses. Blank entries are skipped.
fn parse_ip_list(key: &str, raw: &str) -> Result<Vec<IpAddr>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .parse::<IpAddr>()
                .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), format!("{entry}: {e}")))
        })
        .collect()
}

/// Parse a non-negative currency amount.
fn parse_money(key: &str, raw: &str) -> Result<Money, ConfigError> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    if amount.is_sign_negative() {
        return Err(ConfigError::InvalidEnvVar(
            key.to_string(),
            "must not be negative".to_string(),
        ));
    }
    Ok(Money::new(amount))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SIGNING_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SIGNING_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stripe_config() -> StripeConfig {
        StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            webhook_secret: SecretString::from("whsec_9fJ2kLm4Qp7Rt1Vw3Xy5Za8Bc0De"),
            api_base: "https://api.stripe.com".to_string(),
            success_path: "/payment/success".to_string(),
            cancel_path: "/payment/cancel".to_string(),
            currency: "usd".to_string(),
            timeout: Duration::from_secs(15),
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let err = validate_secret_strength("your-signing-key-here", "TEST_VAR").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_accepts_provider_keys() {
        assert!(validate_secret_strength("sk_test_4eC39HqLyjWDarjtT1zdp7dc", "STRIPE").is_ok());
        assert!(validate_secret_strength("whsec_9fJ2kLm4Qp7Rt1Vw3Xy5Za8Bc0De", "STRIPE").is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_secret_length(&SecretString::from("a".repeat(32)), "TEST").is_ok());
    }

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("FEE", "12.5").unwrap().to_string(), "12.50");
        assert!(parse_money("FEE", "-1").is_err());
        assert!(parse_money("FEE", "abc").is_err());
    }

    #[test]
    fn test_parse_ip_list() {
        assert!(parse_ip_list("PROXIES", "").unwrap().is_empty());
        assert_eq!(
            parse_ip_list("PROXIES", "10.0.0.1, ::1,").unwrap(),
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
        assert!(parse_ip_list("PROXIES", "10.0.0.1, 10.0.0.0/8").is_err());
    }

    #[test]
    fn test_stripe_config_debug_redacts_secrets() {
        let debug_output = format!("{:?}", stripe_config());

        assert!(debug_output.contains("api.stripe.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk_test_4eC39HqLyjWDarjtT1zdp7dc"));
        assert!(!debug_output.contains("whsec_9fJ2kLm4Qp7Rt1Vw3Xy5Za8Bc0De"));
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 587,
            smtp_username: "mailer".to_string(),
            smtp_password: SecretString::from("Zr8!qLw2#mVp5tNx"),
            from_address: "shop@example.com".to_string(),
            admin_address: "owner@example.com".to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("smtp.example.com"));
        assert!(debug_output.contains("owner@example.com"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("Zr8!qLw2#mVp5tNx"));
    }

    #[test]
    fn test_openai_config_debug_redacts_key() {
        let config = OpenAiConfig {
            api_key: Some(SecretString::from("sk-proj-abc123")),
            api_base: "https://api.openai.com".to_string(),
            model: "gpt-4o".to_string(),
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("gpt-4o"));
        assert!(!debug_output.contains("sk-proj-abc123"));
    }
}

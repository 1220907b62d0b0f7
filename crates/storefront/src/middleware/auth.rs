//! Bearer-token authentication extractors.
//!
//! Access tokens are HS256 JWTs issued by the auth service. The storefront
//! only verifies them and reads the `user_id` (and optional `username`)
//! claims.

use axum::{extract::FromRequestParts, http::header::AUTHORIZATION, http::request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use boostedlabs_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::models::CurrentUser;
use crate::state::AppState;

const MISSING_CREDENTIALS: &str = "Authentication credentials were not provided.";
const INVALID_TOKEN: &str = "Given token not valid for any token type";

/// `user_id` is an integer or a numeric string depending on the issuer.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawUserId {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
struct Claims {
    user_id: RawUserId,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

/// Verifies access tokens.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(secret: &SecretString) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
        }
    }

    /// Decode and check a token.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` for bad signatures, expired tokens, refresh
    /// tokens and tokens without a usable `user_id`.
    pub fn verify(&self, token: &str) -> Result<CurrentUser, AppError> {
        let invalid = || AppError::Unauthorized(INVALID_TOKEN.to_string());

        let claims = decode::<Claims>(token, &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Rejected access token");
                invalid()
            })?
            .claims;

        if claims.token_type.as_deref().is_some_and(|t| t != "access") {
            return Err(invalid());
        }

        let id = match claims.user_id {
            RawUserId::Number(n) => n,
            RawUserId::Text(s) => s.trim().parse().map_err(|_| invalid())?,
        };

        Ok(CurrentUser {
            id: UserId::new(id),
            username: claims.username,
        })
    }
}

/// The bearer token, `None` when there is no `Authorization` header.
fn bearer_token(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.to_string()))
}

fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>, AppError> {
    let Some(token) = bearer_token(parts)? else {
        return Ok(None);
    };
    let user = state.token_verifier().verify(token)?;
    set_sentry_user(&user.id);
    tracing::Span::current().record("user_id", tracing::field::display(user.id));
    Ok(Some(user))
}

/// Extractor that requires a valid access token.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name())
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized(MISSING_CREDENTIALS.to_string()))
    }
}

/// Extractor for routes open to guests.
///
/// No `Authorization` header yields `None`. A header with a bad token is
/// still rejected so a broken client never silently checks out as a guest.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).map(Self)
    }
}

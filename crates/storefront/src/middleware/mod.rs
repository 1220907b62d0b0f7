//! HTTP middleware for the storefront API.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS (frontend origin)
//! 3. `TraceLayer` (request span with status and latency)
//! 4. Request ID (add unique ID to each request)
//! 5. Rate limiting on checkout, chat and contact (governor, binary only)
//!
//! Authentication is per handler through the [`RequireAuth`] and
//! [`OptionalAuth`] extractors.

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{OptionalAuth, RequireAuth, TokenVerifier};
pub use rate_limit::{chat_rate_limiter, checkout_rate_limiter, contact_rate_limiter};
pub use request_id::request_id_middleware;

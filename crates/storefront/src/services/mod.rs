//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `checkout` - Order placement with payment session creation
//! - `orders` - Payment confirmation, cancellation, delivery, abandoned checkouts
//! - `payments` - Payment provider trait and Stripe client
//! - `assistant` - Chat assistant trait and OpenAI client
//! - `mailer` - Admin email notifications over SMTP
//! - `signing` - Signed, expiring order links

pub mod assistant;
pub mod checkout;
pub mod mailer;
pub mod orders;
pub mod payments;
pub mod signing;

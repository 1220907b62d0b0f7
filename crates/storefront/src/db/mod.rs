//! Persistence for the storefront.
//!
//! # Schema: `shop`
//!
//! - `product` - Catalog, including running `order_count`
//! - `review` - Product reviews
//! - `cart_item` - Authenticated users' carts
//! - `orders` / `order_item` / `order_address` - Orders and their lines
//! - `user_subscription` - Recurring-billing records from subscription checkouts
//! - `chat_message` - Assistant conversations
//! - `contact_message` - Contact form submissions
//!
//! Handlers and services only see the capability traits in [`store`]. The
//! Postgres implementation is [`PgStore`]; tests use an in-memory store.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p boostedlabs-cli -- migrate
//! ```

mod cart;
mod catalog;
mod chat;
mod contact;
mod orders;
pub mod store;

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use orders::PgCheckoutTx;
pub use store::{
    CartStore, CatalogStore, ChatStore, CheckoutTx, ContactStore, OrderStore, ShopStore,
};

/// Errors from repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate subscription line).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// [`ShopStore`] backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ShopStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Convert a stored quantity, rejecting values the schema should forbid.
pub(crate) fn quantity_from_db(value: i32) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .ok()
        .filter(|q| *q >= 1)
        .ok_or_else(|| RepositoryError::DataCorruption(format!("invalid quantity {value}")))
}

/// Convert a quantity for storage.
pub(crate) fn quantity_to_db(value: u32) -> Result<i32, RepositoryError> {
    i32::try_from(value).map_err(|_| RepositoryError::Conflict(format!("quantity {value} too large")))
}

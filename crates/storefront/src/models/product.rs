//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boostedlabs_core::{Money, ProductCategory, ProductId};

/// A selectable colour swatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOption {
    pub hex: String,
    pub name: String,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub category: ProductCategory,
    pub name: String,
    pub initial_price: Money,
    /// Current selling price; snapshotted onto order items at checkout.
    pub discounted_price: Money,
    pub description: String,
    pub available_sizes: Vec<String>,
    pub available_colors: Vec<ColorOption>,
    /// Units sold, incremented by checkout.
    pub order_count: i64,
    pub created_at: DateTime<Utc>,
    /// Stripe price used for one-off purchases, if synced.
    #[serde(skip_serializing)]
    pub stripe_price_id: Option<String>,
    /// Stripe recurring price used in subscription mode.
    #[serde(skip_serializing)]
    pub stripe_subscription_price_id: Option<String>,
}

impl Product {
    /// Recurring price for subscription mode, falling back to the one-off
    /// price.
    #[must_use]
    pub fn recurring_price_id(&self) -> Option<&str> {
        self.stripe_subscription_price_id
            .as_deref()
            .or(self.stripe_price_id.as_deref())
    }
}

/// A product to insert, as read from a catalog seed file.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub category: ProductCategory,
    pub name: String,
    pub initial_price: Money,
    pub discounted_price: Money,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub available_sizes: Vec<String>,
    #[serde(default)]
    pub available_colors: Vec<ColorOption>,
    #[serde(default)]
    pub stripe_price_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_price_id: Option<String>,
}

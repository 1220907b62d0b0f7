//! Persisted cart lines for authenticated users.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boostedlabs_core::checkout::PricedLine;
use boostedlabs_core::{CartItemId, Money, ProductId, UserId};

use super::product::{ColorOption, Product};

/// A row in a user's cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    /// Always at least 1.
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<ColorOption>,
    pub created_at: DateTime<Utc>,
}

/// A cart row joined with its product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    /// Price the line at the product's current selling price.
    #[must_use]
    pub const fn priced(&self) -> PricedLine {
        PricedLine {
            unit_price: self.product.discounted_price,
            quantity: self.item.quantity,
        }
    }

    #[must_use]
    pub fn line_total(&self) -> Money {
        self.priced().line_total()
    }
}

/// Input for "add to cart". Merges into an existing row for the product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCartItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<ColorOption>,
}

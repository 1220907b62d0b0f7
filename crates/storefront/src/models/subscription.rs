//! Recurring-billing records created by subscription checkouts.

use serde::{Deserialize, Serialize};

use boostedlabs_core::{ProductId, UserId};

/// Status of a recurring-billing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Cancelled => "Cancelled",
        }
    }
}

/// Links a user to a provider-managed subscription line.
///
/// Unique on (`stripe_subscription_id`, `product_id`), so a redelivered
/// webhook inserts nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub stripe_subscription_id: String,
    pub stripe_subscription_item_id: Option<String>,
    pub quantity: u32,
    pub status: SubscriptionStatus,
}

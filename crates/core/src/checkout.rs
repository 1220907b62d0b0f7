//! Checkout rules: cart totals, free-item eligibility and address validation.
//!
//! These functions are pure so the storefront can run every check before it
//! opens a database transaction, and tests can exercise them directly.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::types::{AddressType, Money, ShirtSize};

/// Commerce settings that drive totals and the cancellation window.
///
/// Loaded from configuration and passed explicitly to the checkout and
/// order services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommerceSettings {
    /// Flat shipping fee charged once per order.
    pub shipping_fee: Money,
    /// Subtotal at or above which the buyer gets a free T-shirt.
    pub free_item_threshold: Money,
    /// Hours after creation during which the buyer may cancel.
    pub cancel_window_hours: u32,
}

impl Default for CommerceSettings {
    fn default() -> Self {
        Self {
            shipping_fee: Money::new(Decimal::new(5000, 2)),
            free_item_threshold: Money::new(Decimal::new(150_000, 2)),
            cancel_window_hours: 48,
        }
    }
}

/// Largest quantity a single cart or order line may carry.
pub const MAX_QUANTITY: u32 = i32::MAX.unsigned_abs();

/// Validate a requested line quantity.
///
/// # Errors
///
/// Returns `QuantityTooSmall` below 1 and `QuantityTooLarge` above
/// [`MAX_QUANTITY`].
pub fn validate_quantity(requested: i64) -> Result<u32, CheckoutRuleError> {
    if requested < 1 {
        return Err(CheckoutRuleError::QuantityTooSmall);
    }
    u32::try_from(requested)
        .ok()
        .filter(|q| *q <= MAX_QUANTITY)
        .ok_or(CheckoutRuleError::QuantityTooLarge)
}

/// One cart line priced at the product's current discounted price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: u32,
}

impl PricedLine {
    /// `unit_price * quantity`, rounded to currency precision.
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Totals for a cart or an order being created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    /// Sum of line totals. Stored as the order's `total_price`.
    pub subtotal: Money,
    pub shipping_fee: Money,
    /// `subtotal + shipping_fee`; the amount charged.
    pub total: Money,
    /// Whether the subtotal qualifies for the free T-shirt.
    pub free_item_eligible: bool,
}

/// Compute totals for the given lines.
///
/// Eligibility looks at the subtotal only, never at shipping or the free
/// item itself.
#[must_use]
pub fn compute_totals(lines: &[PricedLine], settings: &CommerceSettings) -> CartTotals {
    let subtotal: Money = lines.iter().map(PricedLine::line_total).sum();
    CartTotals {
        subtotal,
        shipping_fee: settings.shipping_fee,
        total: subtotal + settings.shipping_fee,
        free_item_eligible: subtotal >= settings.free_item_threshold,
    }
}

/// Reject totals too large to store.
///
/// # Errors
///
/// Returns `TotalTooLarge` when the amount charged exceeds
/// [`Money::MAX_STORED`].
pub fn check_order_amount(totals: &CartTotals) -> Result<(), CheckoutRuleError> {
    if totals.total > Money::MAX_STORED {
        return Err(CheckoutRuleError::TotalTooLarge);
    }
    Ok(())
}

/// Errors raised by the pure checkout rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckoutRuleError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Quantity must be at least 1")]
    QuantityTooSmall,

    #[error("Quantity must be at most {MAX_QUANTITY}")]
    QuantityTooLarge,

    #[error("Order total exceeds the maximum of {}", Money::MAX_STORED)]
    TotalTooLarge,

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(
        "Your order is eligible for a free T-shirt! Please select your T-shirt size (S, M, L, XL, XXL)."
    )]
    FreeItemSizeRequired,

    #[error("Invalid T-shirt size '{0}'. Choose one of: S, M, L, XL, XXL")]
    InvalidFreeItemSize(String),
}

/// Decide which free item, if any, goes into the order.
///
/// Returns `Ok(None)` for ineligible carts regardless of what was requested.
///
/// # Errors
///
/// For eligible carts, returns `FreeItemSizeRequired` when no size (or an
/// empty one) was supplied and `InvalidFreeItemSize` when the value is not
/// one of the fixed sizes.
pub fn resolve_free_item(
    totals: &CartTotals,
    requested: Option<&str>,
) -> Result<Option<ShirtSize>, CheckoutRuleError> {
    if !totals.free_item_eligible {
        return Ok(None);
    }

    match requested.map(str::trim) {
        None | Some("") => Err(CheckoutRuleError::FreeItemSizeRequired),
        Some(size) => size
            .parse::<ShirtSize>()
            .map(Some)
            .map_err(|_| CheckoutRuleError::InvalidFreeItemSize(size.to_owned())),
    }
}

/// Address validation failures, in the order they are checked.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("Address data is required")]
    Missing,

    #[error("Address data must be an object")]
    NotAnObject,

    #[error("Missing address fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid address type '{0}'. Choose one of: home, office")]
    InvalidType(String),
}

/// A validated shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(rename = "type")]
    pub address_type: AddressType,
}

impl ShippingAddress {
    /// Fields every address must carry, in reporting order.
    pub const REQUIRED_FIELDS: [&'static str; 4] = ["name", "phone", "address", "type"];

    /// Validate the raw `address` value from a checkout request body.
    ///
    /// The value is taken as untyped JSON so that a missing address, a
    /// non-object address and individual missing fields produce distinct
    /// messages.
    ///
    /// # Errors
    ///
    /// Returns the first [`AddressError`] that applies.
    pub fn from_json(value: Option<&Value>) -> Result<Self, AddressError> {
        let fields = match value {
            None | Some(Value::Null) => return Err(AddressError::Missing),
            Some(Value::String(s)) if s.is_empty() => return Err(AddressError::Missing),
            Some(Value::Object(map)) if map.is_empty() => return Err(AddressError::Missing),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(AddressError::NotAnObject),
        };

        let text = |key: &str| {
            fields
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let missing: Vec<&'static str> = Self::REQUIRED_FIELDS
            .into_iter()
            .filter(|key| text(key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(AddressError::MissingFields(missing));
        }

        let (Some(name), Some(phone), Some(address), Some(kind)) =
            (text("name"), text("phone"), text("address"), text("type"))
        else {
            return Err(AddressError::Missing);
        };

        let address_type = kind
            .parse::<AddressType>()
            .map_err(|_| AddressError::InvalidType(kind.to_owned()))?;

        Ok(Self {
            name: name.to_owned(),
            phone: phone.to_owned(),
            address: address.to_owned(),
            address_type,
        })
    }
}

//! Orders, their items and shipping addresses.

use chrono::{DateTime, Utc};
use serde::Serialize;

use boostedlabs_core::checkout::ShippingAddress;
use boostedlabs_core::{
    AddressType, Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, ShirtSize, UserId,
};

use super::product::ColorOption;

/// An order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    /// Buyer, or `None` for guest checkouts.
    pub user_id: Option<UserId>,
    /// Contact email for guest checkouts.
    pub email: Option<Email>,
    /// Sum of line totals, excluding shipping.
    pub total_price: Money,
    pub shipping_fee: Money,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub is_subscription: bool,
    /// Payment provider session ID, set once the session exists.
    pub payment_session_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Whether `user` may see and act on this order.
    #[must_use]
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.user_id == Some(user)
    }

    /// Amount charged: items plus shipping.
    #[must_use]
    pub fn amount_due(&self) -> Money {
        self.total_price + self.shipping_fee
    }
}

/// A line of an order.
///
/// Either a product line with a price snapshot, or the zero-price free
/// T-shirt with a size and no product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    /// Unit price at the time of ordering.
    pub price: Money,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<ColorOption>,
    pub is_free_item: bool,
    pub free_item_size: Option<ShirtSize>,
}

/// Shipping address of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAddress {
    pub order_id: OrderId,
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(rename = "type")]
    pub address_type: AddressType,
}

/// An order with its items and address, as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub address: Option<OrderAddress>,
}

/// Order header to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub email: Option<Email>,
    pub total_price: Money,
    pub shipping_fee: Money,
    pub is_subscription: bool,
}

/// Order line to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: Option<String>,
    pub price: Money,
    pub quantity: u32,
    pub size: Option<String>,
    pub color: Option<ColorOption>,
    pub is_free_item: bool,
    pub free_item_size: Option<ShirtSize>,
}

impl NewOrderItem {
    /// The free T-shirt line.
    #[must_use]
    pub const fn free_item(order_id: OrderId, size: ShirtSize) -> Self {
        Self {
            order_id,
            product_id: None,
            product_name: None,
            price: Money::ZERO,
            quantity: 1,
            size: None,
            color: None,
            is_free_item: true,
            free_item_size: Some(size),
        }
    }
}

impl OrderAddress {
    #[must_use]
    pub fn from_shipping(order_id: OrderId, address: &ShippingAddress) -> Self {
        Self {
            order_id,
            name: address.name.clone(),
            phone: address.phone.clone(),
            address: address.address.clone(),
            address_type: address.address_type,
        }
    }
}

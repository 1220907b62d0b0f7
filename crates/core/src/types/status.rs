//! Enumerated values stored on orders, products and chat messages.
//!
//! Each enum maps to a Postgres enum type in the `shop` schema (with the
//! `postgres` feature) and to the same spelling in JSON.

use serde::{Deserialize, Serialize};

/// Implements `as_str`, `Display`, `FromStr` and `ALL` for a field-less enum.
macro_rules! string_enum {
    ($ty:ident, $what:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// Every variant, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The canonical spelling used in JSON and the database.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl ::core::fmt::Display for $ty {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::core::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(format!(concat!("invalid ", $what, ": {}"), s)),
                }
            }
        }
    };
}

/// Order lifecycle status.
///
/// ```text
/// Pending -> Processing -> Shipped -> Delivered
///    \___________\______-> Cancelled
/// ```
///
/// See [`crate::order`] for the transition rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "shop.order_status"))]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

string_enum!(OrderStatus, "order status" {
    Pending => "Pending",
    Processing => "Processing",
    Shipped => "Shipped",
    Delivered => "Delivered",
    Cancelled => "Cancelled",
});

impl OrderStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Kind of shipping address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.address_type", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum AddressType {
    Home,
    Office,
}

string_enum!(AddressType, "address type" {
    Home => "home",
    Office => "office",
});

/// T-shirt size for the free promotional item.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "shop.shirt_size"))]
pub enum ShirtSize {
    S,
    M,
    L,
    XL,
    XXL,
}

string_enum!(ShirtSize, "T-shirt size" {
    S => "S",
    M => "M",
    L => "L",
    XL => "XL",
    XXL => "XXL",
});

/// Catalog category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "shop.product_category"))]
pub enum ProductCategory {
    Health,
    Merchandise,
}

string_enum!(ProductCategory, "product category" {
    Health => "Health",
    Merchandise => "Merchandise",
});

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.chat_sender", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Ai,
}

string_enum!(ChatSender, "chat sender" {
    User => "user",
    Ai => "ai",
});

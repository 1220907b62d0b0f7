//! Domain models for the storefront.
//!
//! These are validated domain objects, separate from the row types the
//! Postgres store decodes into.

pub mod cart;
pub mod chat;
pub mod contact;
pub mod order;
pub mod product;
pub mod review;
pub mod subscription;
pub mod user;

pub use cart::{CartItem, CartLine, NewCartItem};
pub use chat::ChatMessage;
pub use contact::{ContactForm, ContactFormError, ContactMessage, NewContactMessage};
pub use order::{NewOrder, NewOrderItem, Order, OrderAddress, OrderDetail, OrderItem};
pub use product::{ColorOption, NewProduct, Product};
pub use review::{NewReview, Review};
pub use subscription::{NewSubscription, SubscriptionStatus};
pub use user::CurrentUser;

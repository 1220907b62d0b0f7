//! Store capability traits.
//!
//! Each trait covers one area of the schema. [`ShopStore`] bundles them so
//! application state can hold a single `Arc<dyn ShopStore>`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use boostedlabs_core::checkout::ShippingAddress;
use boostedlabs_core::{CartItemId, ChatSender, OrderId, OrderStatus, ProductCategory, ProductId, UserId};

use super::RepositoryError;
use crate::models::{
    CartItem, CartLine, ChatMessage, ContactMessage, NewCartItem, NewContactMessage, NewOrder,
    NewOrderItem, NewProduct, NewReview, NewSubscription, Order, OrderDetail, OrderItem, Product,
    Review,
};

/// Read access to products and reviews, plus the few catalog writes.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// All products, optionally limited to one category, newest first.
    async fn list_products(
        &self,
        category: Option<ProductCategory>,
    ) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products with the given IDs. Missing IDs are simply absent.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Other products in the same category.
    async fn related_products(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError>;

    /// Best sellers by `order_count`, ties broken by newest.
    async fn top_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError>;

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError>;

    /// Reviews of a product, newest first.
    async fn list_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError>;

    /// Highest-rated reviews across the catalog.
    async fn top_reviews(&self, limit: u32) -> Result<Vec<Review>, RepositoryError>;

    async fn insert_review(&self, review: &NewReview) -> Result<Review, RepositoryError>;
}

/// A user's persisted cart.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Cart rows joined with their products, oldest first.
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError>;

    /// Add to the cart, merging into an existing row for the same product.
    async fn add_to_cart(
        &self,
        user: UserId,
        item: &NewCartItem,
    ) -> Result<CartItem, RepositoryError>;

    async fn get_cart_item(
        &self,
        user: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError>;

    /// Overwrite a row's quantity. `None` if the row is not the user's.
    async fn set_cart_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<Option<CartItem>, RepositoryError>;

    /// Remove one row. Returns whether anything was removed.
    async fn remove_cart_item(&self, user: UserId, id: CartItemId)
    -> Result<bool, RepositoryError>;

    /// Remove every row. Returns the number removed.
    async fn clear_cart(&self, user: UserId) -> Result<u64, RepositoryError>;
}

/// Orders and recurring-billing records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Open the transaction that creates an order.
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn get_order_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError>;

    /// A user's orders with items and address, newest first.
    async fn list_orders(&self, user: UserId) -> Result<Vec<OrderDetail>, RepositoryError>;

    /// Compare-and-set the status. Returns `false` if the order is gone or
    /// its status is no longer `from`.
    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError>;

    /// Mark an unpaid order paid and store `status`. Returns `false` if the
    /// order is gone or was already paid.
    async fn mark_paid(&self, id: OrderId, status: OrderStatus) -> Result<bool, RepositoryError>;

    /// Delete an order that is still unpaid and `Pending`, with its items and
    /// address. Returns whether a row was deleted.
    async fn delete_unpaid_order(&self, id: OrderId) -> Result<bool, RepositoryError>;

    /// Record a subscription line. Returns `false` if it already existed.
    async fn insert_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> Result<bool, RepositoryError>;
}

/// Assistant conversation history.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_chat_message(
        &self,
        user: UserId,
        sender: ChatSender,
        sender_name: &str,
        message: &str,
    ) -> Result<ChatMessage, RepositoryError>;

    /// The latest `limit` messages, in chronological order.
    async fn recent_chat_messages(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;

    /// The whole conversation, oldest first.
    async fn chat_history(&self, user: UserId) -> Result<Vec<ChatMessage>, RepositoryError>;
}

/// Contact form submissions.
#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert_contact_message(
        &self,
        message: &NewContactMessage,
    ) -> Result<ContactMessage, RepositoryError>;
}

/// Everything the storefront needs from persistence.
#[async_trait]
pub trait ShopStore: CatalogStore + CartStore + OrderStore + ChatStore + ContactStore {
    /// Check connectivity for the readiness check.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// The writes that create one order, applied atomically.
///
/// Nothing is visible to other readers until [`CheckoutTx::commit`]. Dropping
/// the transaction without committing discards every write.
#[async_trait]
pub trait CheckoutTx: Send {
    async fn insert_order(
        &mut self,
        order: &NewOrder,
        created_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError>;

    async fn insert_address(
        &mut self,
        order_id: OrderId,
        address: &ShippingAddress,
    ) -> Result<(), RepositoryError>;

    async fn insert_item(&mut self, item: &NewOrderItem) -> Result<OrderItem, RepositoryError>;

    async fn increment_order_count(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError>;

    async fn set_payment_session(
        &mut self,
        order_id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError>;

    async fn clear_cart(&mut self, user: UserId) -> Result<(), RepositoryError>;

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError>;
}

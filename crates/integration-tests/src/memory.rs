//! In-memory [`ShopStore`] for driving the router without `PostgreSQL`.
//!
//! Mirrors the Postgres store's ordering and conflict rules. Checkout
//! transactions buffer their writes and apply them in one step on commit;
//! dropping one discards everything, the same as a rolled-back transaction.
//! IDs come from one shared counter and are never reused, like sequences.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use boostedlabs_core::checkout::ShippingAddress;
use boostedlabs_core::{
    CartItemId, ChatMessageId, ChatSender, ContactMessageId, Money, OrderId, OrderItemId,
    OrderStatus, ProductCategory, ProductId, ReviewId, UserId,
};
use boostedlabs_storefront::db::{
    CartStore, CatalogStore, ChatStore, CheckoutTx, ContactStore, OrderStore, RepositoryError,
    ShopStore,
};
use boostedlabs_storefront::models::{
    CartItem, CartLine, ChatMessage, ContactMessage, NewCartItem, NewContactMessage, NewOrder,
    NewOrderItem, NewProduct, NewReview, NewSubscription, Order, OrderAddress, OrderDetail,
    OrderItem, Product, Review,
};

#[derive(Default)]
struct Tables {
    products: BTreeMap<ProductId, Product>,
    reviews: Vec<Review>,
    cart: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    items: Vec<OrderItem>,
    addresses: HashMap<OrderId, OrderAddress>,
    subscriptions: Vec<NewSubscription>,
    chat: Vec<ChatMessage>,
    contact: Vec<ContactMessage>,
}

impl Tables {
    fn detail(&self, order: &Order) -> OrderDetail {
        OrderDetail {
            order: order.clone(),
            items: self
                .items
                .iter()
                .filter(|item| item.order_id == order.id)
                .cloned()
                .collect(),
            address: self.addresses.get(&order.id).cloned(),
        }
    }
}

/// Shared state behind [`MemoryStore`] and its transactions.
struct Shared {
    tables: Mutex<Tables>,
    next_id: AtomicI64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// A [`ShopStore`] held entirely in memory.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                next_id: AtomicI64::new(1),
            }),
        }
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored order header, oldest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.shared.lock().orders.values().cloned().collect()
    }

    #[must_use]
    pub fn order(&self, id: OrderId) -> Option<Order> {
        self.shared.lock().orders.get(&id).cloned()
    }

    #[must_use]
    pub fn order_items(&self, id: OrderId) -> Vec<OrderItem> {
        self.shared
            .lock()
            .items
            .iter()
            .filter(|item| item.order_id == id)
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.shared.lock().products.get(&id).cloned()
    }

    #[must_use]
    pub fn subscriptions(&self) -> Vec<NewSubscription> {
        self.shared.lock().subscriptions.clone()
    }

    #[must_use]
    pub fn cart_len(&self, user: UserId) -> usize {
        self.shared
            .lock()
            .cart
            .values()
            .filter(|item| item.user_id == user)
            .count()
    }

    /// Stored contact form submissions, oldest first.
    #[must_use]
    pub fn contact_messages(&self) -> Vec<ContactMessage> {
        self.shared.lock().contact.clone()
    }

    /// Move an order's creation time, e.g. past the cancellation window.
    pub fn backdate_order(&self, id: OrderId, created_at: DateTime<Utc>) {
        if let Some(order) = self.shared.lock().orders.get_mut(&id) {
            order.created_at = created_at;
        }
    }

    /// Reprice a product, standing in for a catalog edit.
    pub fn set_price(&self, id: ProductId, price: Money) {
        if let Some(product) = self.shared.lock().products.get_mut(&id) {
            product.discounted_price = price;
        }
    }

    /// Force a status, standing in for fulfilment outside the API.
    pub fn set_status(&self, id: OrderId, status: OrderStatus) {
        if let Some(order) = self.shared.lock().orders.get_mut(&id) {
            order.status = status;
        }
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn list_products(
        &self,
        category: Option<ProductCategory>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.shared.lock();
        let mut products: Vec<Product> = tables
            .products
            .values()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .cloned()
            .collect();
        products.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(products)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.shared.lock().products.get(&id).cloned())
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.shared.lock();
        Ok(tables
            .products
            .values()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn related_products(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let mut related = self.list_products(Some(product.category)).await?;
        related.retain(|p| p.id != product.id);
        related.truncate(limit as usize);
        Ok(related)
    }

    async fn top_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let tables = self.shared.lock();
        let mut products: Vec<Product> = tables.products.values().cloned().collect();
        products.sort_by(|a, b| {
            (b.order_count, b.created_at, b.id).cmp(&(a.order_count, a.created_at, a.id))
        });
        products.truncate(limit as usize);
        Ok(products)
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let stored = Product {
            id: ProductId::new(self.shared.next_id()),
            category: product.category,
            name: product.name.clone(),
            initial_price: product.initial_price,
            discounted_price: product.discounted_price,
            description: product.description.clone(),
            available_sizes: product.available_sizes.clone(),
            available_colors: product.available_colors.clone(),
            order_count: 0,
            created_at: Utc::now(),
            stripe_price_id: product.stripe_price_id.clone(),
            stripe_subscription_price_id: product.stripe_subscription_price_id.clone(),
        };
        self.shared
            .lock()
            .products
            .insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let tables = self.shared.lock();
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(reviews)
    }

    async fn top_reviews(&self, limit: u32) -> Result<Vec<Review>, RepositoryError> {
        let tables = self.shared.lock();
        let mut reviews = tables.reviews.clone();
        reviews.sort_by(|a, b| (b.rating, b.created_at, b.id).cmp(&(a.rating, a.created_at, a.id)));
        reviews.truncate(limit as usize);
        Ok(reviews)
    }

    async fn insert_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let mut tables = self.shared.lock();
        if !tables.products.contains_key(&review.product_id) {
            return Err(RepositoryError::NotFound);
        }
        let stored = Review {
            id: ReviewId::new(self.shared.next_id()),
            product_id: review.product_id,
            user_id: review.user_id,
            user_name: review.user_name.clone(),
            rating: review.rating,
            comment: review.comment.clone(),
            created_at: Utc::now(),
        };
        tables.reviews.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl CartStore for MemoryStore {
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let tables = self.shared.lock();
        tables
            .cart
            .values()
            .filter(|item| item.user_id == user)
            .map(|item| {
                let product = tables.products.get(&item.product_id).cloned().ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart item {} references missing product",
                        item.id
                    ))
                })?;
                Ok(CartLine {
                    item: item.clone(),
                    product,
                })
            })
            .collect()
    }

    async fn add_to_cart(
        &self,
        user: UserId,
        item: &NewCartItem,
    ) -> Result<CartItem, RepositoryError> {
        let mut tables = self.shared.lock();
        if !tables.products.contains_key(&item.product_id) {
            return Err(RepositoryError::NotFound);
        }

        if let Some(existing) = tables
            .cart
            .values_mut()
            .find(|row| row.user_id == user && row.product_id == item.product_id)
        {
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            return Ok(existing.clone());
        }

        let stored = CartItem {
            id: CartItemId::new(self.shared.next_id()),
            user_id: user,
            product_id: item.product_id,
            quantity: item.quantity,
            size: item.size.clone(),
            color: item.color.clone(),
            created_at: Utc::now(),
        };
        tables.cart.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn get_cart_item(
        &self,
        user: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .shared
            .lock()
            .cart
            .get(&id)
            .filter(|item| item.user_id == user)
            .cloned())
    }

    async fn set_cart_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let mut tables = self.shared.lock();
        Ok(tables
            .cart
            .get_mut(&id)
            .filter(|item| item.user_id == user)
            .map(|item| {
                item.quantity = quantity;
                item.clone()
            }))
    }

    async fn remove_cart_item(
        &self,
        user: UserId,
        id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.shared.lock();
        if tables.cart.get(&id).is_some_and(|item| item.user_id == user) {
            tables.cart.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn clear_cart(&self, user: UserId) -> Result<u64, RepositoryError> {
        let mut tables = self.shared.lock();
        let before = tables.cart.len();
        tables.cart.retain(|_, item| item.user_id != user);
        Ok((before - tables.cart.len()) as u64)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, RepositoryError> {
        Ok(Box::new(MemoryCheckoutTx {
            shared: Arc::clone(&self.shared),
            writes: Vec::new(),
        }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        Ok(self.order(id))
    }

    async fn get_order_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let tables = self.shared.lock();
        Ok(tables.orders.get(&id).map(|order| tables.detail(order)))
    }

    async fn list_orders(&self, user: UserId) -> Result<Vec<OrderDetail>, RepositoryError> {
        let tables = self.shared.lock();
        let mut orders: Vec<&Order> = tables
            .orders
            .values()
            .filter(|order| order.user_id == Some(user))
            .collect();
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders.into_iter().map(|order| tables.detail(order)).collect())
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.shared.lock();
        match tables.orders.get_mut(&id) {
            Some(order) if order.status == from => {
                order.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_paid(&self, id: OrderId, status: OrderStatus) -> Result<bool, RepositoryError> {
        let mut tables = self.shared.lock();
        match tables.orders.get_mut(&id) {
            Some(order) if !order.is_paid => {
                order.is_paid = true;
                order.status = status;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_unpaid_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let mut tables = self.shared.lock();
        let deletable = tables
            .orders
            .get(&id)
            .is_some_and(|order| !order.is_paid && order.status == OrderStatus::Pending);
        if !deletable {
            return Ok(false);
        }
        tables.orders.remove(&id);
        tables.items.retain(|item| item.order_id != id);
        tables.addresses.remove(&id);
        Ok(true)
    }

    async fn insert_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.shared.lock();
        let exists = tables.subscriptions.iter().any(|s| {
            s.stripe_subscription_id == subscription.stripe_subscription_id
                && s.product_id == subscription.product_id
        });
        if exists {
            return Ok(false);
        }
        tables.subscriptions.push(subscription.clone());
        Ok(true)
    }
}

#[async_trait]
impl ChatStore for MemoryStore {
    async fn insert_chat_message(
        &self,
        user: UserId,
        sender: ChatSender,
        sender_name: &str,
        message: &str,
    ) -> Result<ChatMessage, RepositoryError> {
        let stored = ChatMessage {
            id: ChatMessageId::new(self.shared.next_id()),
            user_id: user,
            sender,
            sender_name: sender_name.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
        };
        self.shared.lock().chat.push(stored.clone());
        Ok(stored)
    }

    async fn recent_chat_messages(
        &self,
        user: UserId,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let mut history = self.chat_history(user).await?;
        let skip = history.len().saturating_sub(limit as usize);
        history.drain(..skip);
        Ok(history)
    }

    async fn chat_history(&self, user: UserId) -> Result<Vec<ChatMessage>, RepositoryError> {
        let tables = self.shared.lock();
        let mut history: Vec<ChatMessage> = tables
            .chat
            .iter()
            .filter(|m| m.user_id == user)
            .cloned()
            .collect();
        history.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(history)
    }
}

#[async_trait]
impl ContactStore for MemoryStore {
    async fn insert_contact_message(
        &self,
        message: &NewContactMessage,
    ) -> Result<ContactMessage, RepositoryError> {
        let stored = ContactMessage {
            id: ContactMessageId::new(self.shared.next_id()),
            user_id: message.user_id,
            name: message.name.clone(),
            whatsapp: message.whatsapp.clone(),
            email: message.email.clone(),
            project_details: message.project_details.clone(),
            sent_at: Utc::now(),
        };
        self.shared.lock().contact.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl ShopStore for MemoryStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// A buffered write, applied on commit.
enum Write {
    Order(Order),
    Address(OrderAddress),
    Item(OrderItem),
    OrderCount(ProductId, u32),
    PaymentSession(OrderId, String),
    ClearCart(UserId),
}

/// Checkout transaction that applies nothing until [`CheckoutTx::commit`].
pub struct MemoryCheckoutTx {
    shared: Arc<Shared>,
    writes: Vec<Write>,
}

impl MemoryCheckoutTx {
    fn has_order(&self, id: OrderId) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w, Write::Order(order) if order.id == id))
    }
}

#[async_trait]
impl CheckoutTx for MemoryCheckoutTx {
    async fn insert_order(
        &mut self,
        order: &NewOrder,
        created_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let stored = Order {
            id: OrderId::new(self.shared.next_id()),
            user_id: order.user_id,
            email: order.email.clone(),
            total_price: order.total_price,
            shipping_fee: order.shipping_fee,
            status: OrderStatus::Pending,
            is_paid: false,
            is_subscription: order.is_subscription,
            payment_session_id: None,
            created_at,
        };
        self.writes.push(Write::Order(stored.clone()));
        Ok(stored)
    }

    async fn insert_address(
        &mut self,
        order_id: OrderId,
        address: &ShippingAddress,
    ) -> Result<(), RepositoryError> {
        if !self.has_order(order_id) {
            return Err(RepositoryError::NotFound);
        }
        self.writes
            .push(Write::Address(OrderAddress::from_shipping(order_id, address)));
        Ok(())
    }

    async fn insert_item(&mut self, item: &NewOrderItem) -> Result<OrderItem, RepositoryError> {
        if !self.has_order(item.order_id) {
            return Err(RepositoryError::NotFound);
        }
        if item.is_free_item == item.product_id.is_some() {
            return Err(RepositoryError::Conflict(
                "order item must be a product or the free item".to_string(),
            ));
        }
        let stored = OrderItem {
            id: OrderItemId::new(self.shared.next_id()),
            order_id: item.order_id,
            product_id: item.product_id,
            product_name: item.product_name.clone(),
            price: item.price,
            quantity: item.quantity,
            size: item.size.clone(),
            color: item.color.clone(),
            is_free_item: item.is_free_item,
            free_item_size: item.free_item_size,
        };
        self.writes.push(Write::Item(stored.clone()));
        Ok(stored)
    }

    async fn increment_order_count(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        if !self.shared.lock().products.contains_key(&product_id) {
            return Err(RepositoryError::NotFound);
        }
        self.writes.push(Write::OrderCount(product_id, quantity));
        Ok(())
    }

    async fn set_payment_session(
        &mut self,
        order_id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError> {
        self.writes
            .push(Write::PaymentSession(order_id, session_id.to_string()));
        Ok(())
    }

    async fn clear_cart(&mut self, user: UserId) -> Result<(), RepositoryError> {
        self.writes.push(Write::ClearCart(user));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let Self { shared, writes } = *self;
        let mut tables = shared.lock();
        for write in writes {
            match write {
                Write::Order(order) => {
                    tables.orders.insert(order.id, order);
                }
                Write::Address(address) => {
                    tables.addresses.insert(address.order_id, address);
                }
                Write::Item(item) => tables.items.push(item),
                Write::OrderCount(product_id, quantity) => {
                    if let Some(product) = tables.products.get_mut(&product_id) {
                        product.order_count += i64::from(quantity);
                    }
                }
                Write::PaymentSession(order_id, session_id) => {
                    if let Some(order) = tables.orders.get_mut(&order_id) {
                        order.payment_session_id = Some(session_id);
                    }
                }
                Write::ClearCart(user) => tables.cart.retain(|_, item| item.user_id != user),
            }
        }
        Ok(())
    }
}

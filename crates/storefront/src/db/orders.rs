//! Orders, order items, addresses and subscriptions in `PostgreSQL`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, Transaction};

use boostedlabs_core::checkout::ShippingAddress;
use boostedlabs_core::{
    AddressType, Email, Money, OrderId, OrderItemId, OrderStatus, ProductId, ShirtSize, UserId,
};

use super::store::{CheckoutTx, OrderStore};
use super::{PgStore, RepositoryError, quantity_from_db, quantity_to_db};
use crate::models::{
    ColorOption, NewOrder, NewOrderItem, NewSubscription, Order, OrderAddress, OrderDetail,
    OrderItem,
};

const ORDER_COLUMNS: &str = "id, user_id, email, total_price, shipping_fee, status, is_paid, \
     is_subscription, payment_session_id, created_at";

const ITEM_COLUMNS: &str = "id, order_id, product_id, product_name, price, quantity, size, \
     color, is_free_item, free_item_size";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: Option<UserId>,
    email: Option<String>,
    total_price: Money,
    shipping_fee: Money,
    status: OrderStatus,
    is_paid: bool,
    is_subscription: bool,
    payment_session_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email on order {}: {e}", row.id))
            })?;

        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            email,
            total_price: row.total_price,
            shipping_fee: row.shipping_fee,
            status: row.status,
            is_paid: row.is_paid,
            is_subscription: row.is_subscription,
            payment_session_id: row.payment_session_id,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: Option<String>,
    price: Money,
    quantity: i32,
    size: Option<String>,
    color: Option<Json<ColorOption>>,
    is_free_item: bool,
    free_item_size: Option<ShirtSize>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = RepositoryError;

    fn try_from(row: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            product_name: row.product_name,
            price: row.price,
            quantity: quantity_from_db(row.quantity)?,
            size: row.size,
            color: row.color.map(|c| c.0),
            is_free_item: row.is_free_item,
            free_item_size: row.free_item_size,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AddressRow {
    order_id: OrderId,
    name: String,
    phone: String,
    address: String,
    address_type: AddressType,
}

impl From<AddressRow> for OrderAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            order_id: row.order_id,
            name: row.name,
            phone: row.phone,
            address: row.address,
            address_type: row.address_type,
        }
    }
}

/// Load items and addresses for `orders` and assemble the details.
async fn load_details(
    conn: &mut PgConnection,
    orders: Vec<Order>,
) -> Result<Vec<OrderDetail>, RepositoryError> {
    let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();

    let item_rows: Vec<OrderItemRow> = sqlx::query_as(&format!(
        "SELECT {ITEM_COLUMNS} FROM shop.order_item WHERE order_id = ANY($1) ORDER BY id"
    ))
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let address_rows: Vec<AddressRow> = sqlx::query_as(
        "SELECT order_id, name, phone, address, address_type
         FROM shop.order_address WHERE order_id = ANY($1)",
    )
    .bind(&ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let item = OrderItem::try_from(row)?;
        items.entry(item.order_id).or_default().push(item);
    }
    let mut addresses: HashMap<OrderId, OrderAddress> = address_rows
        .into_iter()
        .map(|row| (row.order_id, OrderAddress::from(row)))
        .collect();

    Ok(orders
        .into_iter()
        .map(|order| OrderDetail {
            items: items.remove(&order.id).unwrap_or_default(),
            address: addresses.remove(&order.id),
            order,
        })
        .collect())
}

#[async_trait]
impl OrderStore for PgStore {
    async fn begin_checkout(&self) -> Result<Box<dyn CheckoutTx>, RepositoryError> {
        let tx = self.pool().begin().await?;
        Ok(Box::new(PgCheckoutTx { tx }))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn get_order_detail(&self, id: OrderId) -> Result<Option<OrderDetail>, RepositoryError> {
        let Some(order) = self.get_order(id).await? else {
            return Ok(None);
        };
        let mut conn = self.pool().acquire().await?;
        let mut details = load_details(&mut conn, vec![order]).await?;
        Ok(details.pop())
    }

    async fn list_orders(&self, user: UserId) -> Result<Vec<OrderDetail>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user)
        .fetch_all(self.pool())
        .await?;

        let orders = rows
            .into_iter()
            .map(Order::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let mut conn = self.pool().acquire().await?;
        load_details(&mut conn, orders).await
    }

    async fn transition_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE shop.orders SET status = $3 WHERE id = $1 AND status = $2")
            .bind(id)
            .bind(from)
            .bind(to)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_paid(&self, id: OrderId, status: OrderStatus) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE shop.orders SET is_paid = TRUE, status = $2
             WHERE id = $1 AND is_paid = FALSE",
        )
        .bind(id)
        .bind(status)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_unpaid_order(&self, id: OrderId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "DELETE FROM shop.orders
             WHERE id = $1 AND is_paid = FALSE AND status = 'Pending'",
        )
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO shop.user_subscription
                 (user_id, product_id, stripe_subscription_id, stripe_subscription_item_id,
                  quantity, status)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (stripe_subscription_id, product_id) DO NOTHING",
        )
        .bind(subscription.user_id)
        .bind(subscription.product_id)
        .bind(&subscription.stripe_subscription_id)
        .bind(&subscription.stripe_subscription_item_id)
        .bind(quantity_to_db(subscription.quantity)?)
        .bind(subscription.status.as_str())
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Checkout transaction over a pooled connection.
///
/// Dropping it without [`CheckoutTx::commit`] rolls back.
pub struct PgCheckoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CheckoutTx for PgCheckoutTx {
    async fn insert_order(
        &mut self,
        order: &NewOrder,
        created_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let row: OrderRow = sqlx::query_as(&format!(
            "INSERT INTO shop.orders
                 (user_id, email, total_price, shipping_fee, is_subscription, created_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(order.user_id)
        .bind(order.email.as_ref())
        .bind(order.total_price)
        .bind(order.shipping_fee)
        .bind(order.is_subscription)
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn insert_address(
        &mut self,
        order_id: OrderId,
        address: &ShippingAddress,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO shop.order_address (order_id, name, phone, address, address_type)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(order_id)
        .bind(&address.name)
        .bind(&address.phone)
        .bind(&address.address)
        .bind(address.address_type)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn insert_item(&mut self, item: &NewOrderItem) -> Result<OrderItem, RepositoryError> {
        let row: OrderItemRow = sqlx::query_as(&format!(
            "INSERT INTO shop.order_item
                 (order_id, product_id, product_name, price, quantity, size, color,
                  is_free_item, free_item_size)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {ITEM_COLUMNS}"
        ))
        .bind(item.order_id)
        .bind(item.product_id)
        .bind(&item.product_name)
        .bind(item.price)
        .bind(quantity_to_db(item.quantity)?)
        .bind(&item.size)
        .bind(item.color.as_ref().map(Json))
        .bind(item.is_free_item)
        .bind(item.free_item_size)
        .fetch_one(&mut *self.tx)
        .await?;

        row.try_into()
    }

    async fn increment_order_count(
        &mut self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE shop.product SET order_count = order_count + $2 WHERE id = $1")
                .bind(product_id)
                .bind(i64::from(quantity))
                .execute(&mut *self.tx)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn set_payment_session(
        &mut self,
        order_id: OrderId,
        session_id: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE shop.orders SET payment_session_id = $2 WHERE id = $1")
            .bind(order_id)
            .bind(session_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn clear_cart(&mut self, user: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
            .bind(user)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        self.tx.commit().await?;
        Ok(())
    }
}

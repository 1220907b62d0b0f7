//! Cart rows in `PostgreSQL`.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use boostedlabs_core::{CartItemId, ProductId, UserId};

use super::catalog::{PRODUCT_COLUMNS, ProductRow};
use super::store::CartStore;
use super::{PgStore, RepositoryError, quantity_from_db, quantity_to_db};
use crate::models::{CartItem, CartLine, ColorOption, NewCartItem, Product};

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, size, color, created_at";

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    user_id: UserId,
    product_id: ProductId,
    quantity: i32,
    size: Option<String>,
    color: Option<Json<ColorOption>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<CartItemRow> for CartItem {
    type Error = RepositoryError;

    fn try_from(row: CartItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            quantity: quantity_from_db(row.quantity)?,
            size: row.size,
            color: row.color.map(|c| c.0),
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl CartStore for PgStore {
    async fn cart_lines(&self, user: UserId) -> Result<Vec<CartLine>, RepositoryError> {
        let items: Vec<CartItemRow> = sqlx::query_as(&format!(
            "SELECT {CART_COLUMNS} FROM shop.cart_item
             WHERE user_id = $1
             ORDER BY created_at, id"
        ))
        .bind(user)
        .fetch_all(self.pool())
        .await?;

        let product_ids: Vec<i64> = items.iter().map(|i| i.product_id.as_i64()).collect();
        let products: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = ANY($1)"
        ))
        .bind(product_ids)
        .fetch_all(self.pool())
        .await?;

        let by_id: HashMap<ProductId, Product> = products
            .into_iter()
            .map(Product::from)
            .map(|p| (p.id, p))
            .collect();

        items
            .into_iter()
            .map(|row| {
                let product = by_id.get(&row.product_id).cloned().ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart item {} references missing product {}",
                        row.id, row.product_id
                    ))
                })?;
                Ok(CartLine {
                    item: row.try_into()?,
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
        let row: CartItemRow = sqlx::query_as(&format!(
            "INSERT INTO shop.cart_item (user_id, product_id, quantity, size, color)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (user_id, product_id)
             DO UPDATE SET quantity = shop.cart_item.quantity + EXCLUDED.quantity
             RETURNING {CART_COLUMNS}"
        ))
        .bind(user)
        .bind(item.product_id)
        .bind(quantity_to_db(item.quantity)?)
        .bind(&item.size)
        .bind(item.color.as_ref().map(Json))
        .fetch_one(self.pool())
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                RepositoryError::NotFound
            }
            other => RepositoryError::Database(other),
        })?;

        row.try_into()
    }

    async fn get_cart_item(
        &self,
        user: UserId,
        id: CartItemId,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row: Option<CartItemRow> = sqlx::query_as(&format!(
            "SELECT {CART_COLUMNS} FROM shop.cart_item WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user)
        .fetch_optional(self.pool())
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    async fn set_cart_quantity(
        &self,
        user: UserId,
        id: CartItemId,
        quantity: u32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        let row: Option<CartItemRow> = sqlx::query_as(&format!(
            "UPDATE shop.cart_item SET quantity = $3
             WHERE id = $1 AND user_id = $2
             RETURNING {CART_COLUMNS}"
        ))
        .bind(id)
        .bind(user)
        .bind(quantity_to_db(quantity)?)
        .fetch_optional(self.pool())
        .await?;

        row.map(CartItem::try_from).transpose()
    }

    async fn remove_cart_item(
        &self,
        user: UserId,
        id: CartItemId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_item WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear_cart(&self, user: UserId) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM shop.cart_item WHERE user_id = $1")
            .bind(user)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}

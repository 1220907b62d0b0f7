//! Products and reviews in `PostgreSQL`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

use boostedlabs_core::reviews::Rating;
use boostedlabs_core::{Money, ProductCategory, ProductId, ReviewId, UserId};

use super::store::CatalogStore;
use super::{PgStore, RepositoryError};
use crate::models::{ColorOption, NewProduct, NewReview, Product, Review};

pub(super) const PRODUCT_COLUMNS: &str = "id, category, name, initial_price, discounted_price, \
     description, available_sizes, available_colors, order_count, created_at, \
     stripe_price_id, stripe_subscription_price_id";

const REVIEW_COLUMNS: &str = "id, product_id, user_id, user_name, rating, comment, created_at";

#[derive(sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    category: ProductCategory,
    name: String,
    initial_price: Money,
    discounted_price: Money,
    description: String,
    available_sizes: Vec<String>,
    available_colors: Json<Vec<ColorOption>>,
    order_count: i64,
    created_at: DateTime<Utc>,
    stripe_price_id: Option<String>,
    stripe_subscription_price_id: Option<String>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            category: row.category,
            name: row.name,
            initial_price: row.initial_price,
            discounted_price: row.discounted_price,
            description: row.description,
            available_sizes: row.available_sizes,
            available_colors: row.available_colors.0,
            order_count: row.order_count,
            created_at: row.created_at,
            stripe_price_id: row.stripe_price_id,
            stripe_subscription_price_id: row.stripe_subscription_price_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: ReviewId,
    product_id: ProductId,
    user_id: UserId,
    user_name: String,
    rating: i16,
    comment: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = RepositoryError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        let rating = Rating::new(i64::from(row.rating)).map_err(|_| {
            RepositoryError::DataCorruption(format!(
                "review {} has rating {} out of range",
                row.id, row.rating
            ))
        })?;
        Ok(Self {
            id: row.id,
            product_id: row.product_id,
            user_id: row.user_id,
            user_name: row.user_name,
            rating,
            comment: row.comment,
            created_at: row.created_at,
        })
    }
}

fn reviews_from_rows(rows: Vec<ReviewRow>) -> Result<Vec<Review>, RepositoryError> {
    rows.into_iter().map(Review::try_from).collect()
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_products(
        &self,
        category: Option<ProductCategory>,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product
             WHERE ($1::shop.product_category IS NULL OR category = $1)
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(category)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row.map(Product::from))
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i64> = ids.iter().map(ProductId::as_i64).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product WHERE id = ANY($1)"
        ))
        .bind(raw)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn related_products(
        &self,
        product: &Product,
        limit: u32,
    ) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product
             WHERE category = $1 AND id <> $2
             ORDER BY created_at DESC, id DESC
             LIMIT $3"
        ))
        .bind(product.category)
        .bind(product.id)
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn top_products(&self, limit: u32) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM shop.product
             ORDER BY order_count DESC, created_at DESC, id DESC
             LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn insert_product(&self, product: &NewProduct) -> Result<Product, RepositoryError> {
        let row: ProductRow = sqlx::query_as(&format!(
            "INSERT INTO shop.product
                 (category, name, initial_price, discounted_price, description,
                  available_sizes, available_colors, stripe_price_id, stripe_subscription_price_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(product.category)
        .bind(&product.name)
        .bind(product.initial_price)
        .bind(product.discounted_price)
        .bind(&product.description)
        .bind(&product.available_sizes)
        .bind(Json(&product.available_colors))
        .bind(&product.stripe_price_id)
        .bind(&product.stripe_subscription_price_id)
        .fetch_one(self.pool())
        .await?;

        Ok(row.into())
    }

    async fn list_reviews(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {REVIEW_COLUMNS} FROM shop.review
             WHERE product_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(product_id)
        .fetch_all(self.pool())
        .await?;

        reviews_from_rows(rows)
    }

    async fn top_reviews(&self, limit: u32) -> Result<Vec<Review>, RepositoryError> {
        let rows: Vec<ReviewRow> = sqlx::query_as(&format!(
            "SELECT {REVIEW_COLUMNS} FROM shop.review
             ORDER BY rating DESC, created_at DESC
             LIMIT $1"
        ))
        .bind(i64::from(limit))
        .fetch_all(self.pool())
        .await?;

        reviews_from_rows(rows)
    }

    async fn insert_review(&self, review: &NewReview) -> Result<Review, RepositoryError> {
        let row: ReviewRow = sqlx::query_as(&format!(
            "INSERT INTO shop.review (product_id, user_id, user_name, rating, comment)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {REVIEW_COLUMNS}"
        ))
        .bind(review.product_id)
        .bind(review.user_id)
        .bind(&review.user_name)
        .bind(i16::from(review.rating.value()))
        .bind(&review.comment)
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
}

//! Catalog route handlers: category listings, product detail and the home page.

use axum::extract::State;
use serde::Serialize;
use tracing::instrument;

use boostedlabs_core::{ProductCategory, ProductId};

use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::models::{Product, Review};
use crate::state::AppState;

const RELATED_LIMIT: u32 = 4;
const HOME_PRODUCT_LIMIT: u32 = 4;
const HOME_REVIEW_LIMIT: u32 = 20;

/// Product with its reviews and a few others from the same category.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub reviews: Vec<Review>,
    pub related_products: Vec<Product>,
}

/// Best sellers and the best reviews.
#[derive(Debug, Serialize)]
pub struct HomePage {
    pub products: Vec<Product>,
    pub reviews: Vec<Review>,
}

/// `GET /products/health`
#[instrument(skip(state))]
pub async fn health_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state
        .store()
        .list_products(Some(ProductCategory::Health))
        .await?;
    Ok(Json(products))
}

/// `GET /products/merchandise`
#[instrument(skip(state))]
pub async fn merchandise_products(State(state): State<AppState>) -> Result<Json<Vec<Product>>> {
    let products = state
        .store()
        .list_products(Some(ProductCategory::Merchandise))
        .await?;
    Ok(Json(products))
}

/// `GET /products/{id}`
#[instrument(skip(state), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductDetail>> {
    let store = state.store();
    let product = store
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let reviews = store.list_reviews(id).await?;
    let related_products = store.related_products(&product, RELATED_LIMIT).await?;

    Ok(Json(ProductDetail {
        product,
        reviews,
        related_products,
    }))
}

/// `GET /home`
#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> Result<Json<HomePage>> {
    let store = state.store();
    let products = store.top_products(HOME_PRODUCT_LIMIT).await?;
    let reviews = store.top_reviews(HOME_REVIEW_LIMIT).await?;
    Ok(Json(HomePage { products, reviews }))
}

//! Review route handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::Value;
use tracing::instrument;

use boostedlabs_core::ProductId;
use boostedlabs_core::reviews::{Rating, ReviewStats};

use crate::error::{AppError, Result};
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::{NewReview, Product};
use crate::state::AppState;

async fn existing_product(state: &AppState, id: ProductId) -> Result<Product> {
    state
        .store()
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// `POST /products/{id}/reviews`
///
/// Body: `{"rating": 0..=5, "comment": "..."}`. The rating may be sent as a
/// number or a numeric string.
#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    Json(body): Json<Value>,
) -> Result<impl IntoResponse> {
    existing_product(&state, id).await?;

    let rating = match body.get("rating") {
        None | Some(Value::Null) => {
            return Err(AppError::Validation("Rating is required".to_string()));
        }
        Some(raw) => Rating::from_json(raw).map_err(|e| AppError::Validation(e.to_string()))?,
    };
    let comment = body
        .get("comment")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let review = state
        .store()
        .insert_review(&NewReview {
            product_id: id,
            user_id: user.id,
            user_name: user.display_name(),
            rating,
            comment,
        })
        .await?;

    tracing::info!(review_id = %review.id, rating = rating.value(), "Review created");
    Ok((StatusCode::CREATED, Json(review)))
}

/// `GET /products/{id}/review-stats`
#[instrument(skip(state))]
pub async fn stats(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<ReviewStats>> {
    existing_product(&state, id).await?;
    let reviews = state.store().list_reviews(id).await?;
    Ok(Json(ReviewStats::from_ratings(
        reviews.iter().map(|review| review.rating),
    )))
}

//! Cart route handlers.
//!
//! Carts exist only for authenticated users; guests send their lines with
//! the checkout request instead.

use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::instrument;

use boostedlabs_core::checkout::{
    CartTotals, CheckoutRuleError, MAX_QUANTITY, compute_totals, validate_quantity,
};
use boostedlabs_core::{CartItemId, Money, ProductId};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::extract::{Json, Path};
use crate::middleware::RequireAuth;
use crate::models::{CartItem, CartLine, ColorOption, CurrentUser, NewCartItem};
use crate::state::AppState;

const ITEM_NOT_FOUND: &str = "Cart item not found";

fn rule_error(err: CheckoutRuleError) -> AppError {
    AppError::Validation(err.to_string())
}

/// Request body for `POST /products/{id}/add-to-cart`.
#[derive(Debug, Default, Deserialize)]
pub struct AddToCartBody {
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub color_hex: Option<String>,
    #[serde(default)]
    pub color_name: Option<String>,
}

impl AddToCartBody {
    fn color(&self) -> Option<ColorOption> {
        let hex = self.color_hex.as_deref().map(str::trim).filter(|h| !h.is_empty())?;
        Some(ColorOption {
            hex: hex.to_string(),
            name: self.color_name.clone().unwrap_or_default(),
        })
    }
}

/// A cart line with its total at the current price.
#[derive(Debug, Serialize)]
pub struct CartLineView {
    #[serde(flatten)]
    pub line: CartLine,
    pub line_total: Money,
}

/// `GET /cart` response.
#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    #[serde(flatten)]
    pub totals: CartTotals,
}

/// `POST /products/{id}/add-to-cart`
#[instrument(skip(state, user, body), fields(user_id = %user.id, product_id = %id))]
pub async fn add(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<ProductId>,
    body: Option<Json<AddToCartBody>>,
) -> Result<Json<Value>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let store = state.store();

    if store.get_product(id).await?.is_none() {
        return Err(AppError::NotFound("Product not found".to_string()));
    }

    let quantity = validate_quantity(body.quantity.unwrap_or(1)).map_err(rule_error)?;

    // Adding merges into the existing line, which must stay in range too
    let in_cart = store
        .cart_lines(user.id)
        .await?
        .into_iter()
        .find(|line| line.item.product_id == id)
        .map_or(0, |line| line.item.quantity);
    if in_cart.saturating_add(quantity) > MAX_QUANTITY {
        return Err(rule_error(CheckoutRuleError::QuantityTooLarge));
    }

    let item = NewCartItem {
        product_id: id,
        quantity,
        size: body.size.clone().filter(|s| !s.trim().is_empty()),
        color: body.color(),
    };
    let stored = store.add_to_cart(user.id, &item).await?;

    add_breadcrumb(
        "cart",
        "Product added to cart",
        &[
            ("product_id", &id.to_string()),
            ("quantity", &stored.quantity.to_string()),
        ],
    );
    Ok(Json(json!({ "message": "Product added to cart" })))
}

/// `GET /cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<CartView>> {
    let lines = state.store().cart_lines(user.id).await?;
    let priced: Vec<_> = lines.iter().map(CartLine::priced).collect();
    let totals = compute_totals(&priced, &state.config().commerce);

    let items = lines
        .into_iter()
        .map(|line| CartLineView {
            line_total: line.line_total(),
            line,
        })
        .collect();

    Ok(Json(CartView { items, totals }))
}

/// `DELETE /cart`
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn clear(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Value>> {
    let removed = state.store().clear_cart(user.id).await?;
    tracing::debug!(removed, "Cart cleared");
    Ok(Json(json!({ "message": "Cleared cart" })))
}

/// `DELETE /cart/{item_id}`
#[instrument(skip(state, user), fields(user_id = %user.id, item_id = %item_id))]
pub async fn remove(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<Value>> {
    if !state.store().remove_cart_item(user.id, item_id).await? {
        return Err(AppError::NotFound(ITEM_NOT_FOUND.to_string()));
    }
    Ok(Json(json!({ "message": "Removed item from cart" })))
}

async fn owned_item(state: &AppState, user: &CurrentUser, id: CartItemId) -> Result<CartItem> {
    state
        .store()
        .get_cart_item(user.id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))
}

async fn store_quantity(
    state: &AppState,
    user: &CurrentUser,
    id: CartItemId,
    quantity: u32,
) -> Result<u32> {
    state
        .store()
        .set_cart_quantity(user.id, id, quantity)
        .await?
        .map(|item| item.quantity)
        .ok_or_else(|| AppError::NotFound(ITEM_NOT_FOUND.to_string()))
}

/// `POST /cart/{item_id}/increase`
#[instrument(skip(state, user), fields(user_id = %user.id, item_id = %item_id))]
pub async fn increase(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<Value>> {
    let item = owned_item(&state, &user, item_id).await?;
    let next = item
        .quantity
        .checked_add(1)
        .filter(|q| *q <= MAX_QUANTITY)
        .ok_or_else(|| rule_error(CheckoutRuleError::QuantityTooLarge))?;

    let quantity = store_quantity(&state, &user, item_id, next).await?;
    Ok(Json(json!({ "message": "Quantity increased", "quantity": quantity })))
}

/// `POST /cart/{item_id}/decrease`
#[instrument(skip(state, user), fields(user_id = %user.id, item_id = %item_id))]
pub async fn decrease(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(item_id): Path<CartItemId>,
) -> Result<Json<Value>> {
    let item = owned_item(&state, &user, item_id).await?;
    if item.quantity <= 1 {
        return Err(AppError::Validation(
            "Quantity cannot be less than 1".to_string(),
        ));
    }

    let quantity = store_quantity(&state, &user, item_id, item.quantity - 1).await?;
    Ok(Json(json!({ "message": "Quantity decreased", "quantity": quantity })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_requires_hex() {
        let body = AddToCartBody {
            color_name: Some("Navy".to_string()),
            ..AddToCartBody::default()
        };
        assert_eq!(body.color(), None);

        let body = AddToCartBody {
            color_hex: Some("#001f3f".to_string()),
            color_name: Some("Navy".to_string()),
            ..AddToCartBody::default()
        };
        assert_eq!(
            body.color(),
            Some(ColorOption {
                hex: "#001f3f".to_string(),
                name: "Navy".to_string(),
            })
        );
    }
}

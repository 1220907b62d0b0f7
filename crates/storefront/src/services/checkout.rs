//! Order placement.
//!
//! [`CheckoutService::place_order`] validates the request, then writes the
//! order, its address and items and asks the payment provider for a hosted
//! session, all inside one store transaction. Any failure before commit,
//! including a provider error, drops the transaction and leaves nothing
//! behind.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use boostedlabs_core::checkout::{
    CheckoutRuleError, CommerceSettings, PricedLine, ShippingAddress, check_order_amount,
    compute_totals, resolve_free_item, validate_quantity,
};
use boostedlabs_core::{Email, Money, ProductId, ShirtSize, UserId};

use crate::db::{RepositoryError, ShopStore};
use crate::models::{
    ColorOption, CurrentUser, NewOrder, NewOrderItem, OrderAddress, OrderDetail, Product,
};
use crate::services::payments::{
    CheckoutSessionRequest, PaymentError, PaymentProvider, RecurringLineItem, SessionLineItem,
    SessionLines,
};
use crate::services::signing::LinkSigner;

/// Errors from order placement.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The request failed a checkout rule. Nothing was written.
    #[error("{0}")]
    Validation(String),

    /// A referenced product does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The payment provider could not create a session. Rolled back.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<CheckoutRuleError> for CheckoutError {
    fn from(err: CheckoutRuleError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// One inline cart line of a guest checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GuestCartItem {
    pub product_id: ProductId,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

const fn default_quantity() -> i64 {
    1
}

/// `POST /checkout` body, before it is split by caller identity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutBody {
    /// Kept untyped so a missing or non-object address gets its own message.
    #[serde(default)]
    pub address: Option<Value>,
    #[serde(default)]
    pub cart_items: Option<Vec<GuestCartItem>>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub free_tshirt_size: Option<String>,
    #[serde(default)]
    pub is_subscription: bool,
}

/// A checkout request, by caller identity.
#[derive(Debug, Clone)]
pub enum CheckoutRequest {
    /// Signed-in buyer; the stored cart is ordered. `cart_items` and `email`
    /// in the body are ignored.
    Authenticated {
        user: CurrentUser,
        address: Option<Value>,
        free_tshirt_size: Option<String>,
        is_subscription: bool,
    },
    /// Anonymous buyer; the cart comes inline with a contact email.
    Guest {
        address: Option<Value>,
        cart_items: Vec<GuestCartItem>,
        email: Option<String>,
        free_tshirt_size: Option<String>,
        is_subscription: bool,
    },
}

impl CheckoutRequest {
    #[must_use]
    pub fn new(user: Option<CurrentUser>, body: CheckoutBody) -> Self {
        match user {
            Some(user) => Self::Authenticated {
                user,
                address: body.address,
                free_tshirt_size: body.free_tshirt_size,
                is_subscription: body.is_subscription,
            },
            None => Self::Guest {
                address: body.address,
                cart_items: body.cart_items.unwrap_or_default(),
                email: body.email,
                free_tshirt_size: body.free_tshirt_size,
                is_subscription: body.is_subscription,
            },
        }
    }
}

/// A successfully placed order.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedOrder {
    pub order: OrderDetail,
    /// Hosted payment page to redirect the buyer to.
    pub checkout_url: String,
}

/// A cart line ready to become an order item.
struct OrderLine {
    product: Product,
    quantity: u32,
    size: Option<String>,
    color: Option<ColorOption>,
}

impl OrderLine {
    const fn priced(&self) -> PricedLine {
        PricedLine {
            unit_price: self.product.discounted_price,
            quantity: self.quantity,
        }
    }
}

/// Everything validated before the transaction opens.
struct ValidatedCheckout {
    user_id: Option<UserId>,
    email: Option<Email>,
    address: ShippingAddress,
    lines: Vec<OrderLine>,
    free_item: Option<ShirtSize>,
    is_subscription: bool,
    subtotal: Money,
    shipping_fee: Money,
}

/// Redirect targets for the hosted payment page.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    /// Where the buyer lands after paying.
    pub success_url: String,
    /// Base of the signed cancel link; the token is appended.
    pub cancel_base: String,
}

/// Places orders.
pub struct CheckoutService<'a> {
    store: &'a dyn ShopStore,
    payments: &'a dyn PaymentProvider,
    signer: &'a LinkSigner,
    settings: CommerceSettings,
    urls: &'a CheckoutUrls,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn ShopStore,
        payments: &'a dyn PaymentProvider,
        signer: &'a LinkSigner,
        settings: CommerceSettings,
        urls: &'a CheckoutUrls,
    ) -> Self {
        Self {
            store,
            payments,
            signer,
            settings,
            urls,
        }
    }

    /// Validate and place an order, returning it with the payment page URL.
    ///
    /// Checks run in a fixed order: empty cart, address presence and shape,
    /// address fields, guest email, guest quantities and products, the order
    /// amount, then the free-item rule.
    ///
    /// # Errors
    ///
    /// `Validation` and `NotFound` for rule failures, `Payment` when the
    /// provider fails, `Repository` for store failures. In every error case
    /// no order exists afterwards.
    #[instrument(
        skip(self, request),
        fields(user_id = tracing::field::Empty, order_id = tracing::field::Empty)
    )]
    pub async fn place_order(
        &self,
        request: CheckoutRequest,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let checkout = self.validate(request).await?;
        if let Some(user_id) = checkout.user_id {
            tracing::Span::current().record("user_id", tracing::field::display(user_id));
        }
        self.create(checkout, now).await
    }

    async fn validate(&self, request: CheckoutRequest) -> Result<ValidatedCheckout, CheckoutError> {
        let (user_id, email, address, lines, free_tshirt_size, is_subscription) = match request {
            CheckoutRequest::Authenticated {
                user,
                address,
                free_tshirt_size,
                is_subscription,
            } => {
                let cart = self.store.cart_lines(user.id).await?;
                if cart.is_empty() {
                    return Err(CheckoutRuleError::EmptyCart.into());
                }
                let address = ShippingAddress::from_json(address.as_ref())
                    .map_err(CheckoutRuleError::from)?;
                let lines = cart
                    .into_iter()
                    .map(|line| OrderLine {
                        quantity: line.item.quantity,
                        size: line.item.size,
                        color: line.item.color,
                        product: line.product,
                    })
                    .collect();
                (
                    Some(user.id),
                    None,
                    address,
                    lines,
                    free_tshirt_size,
                    is_subscription,
                )
            }
            CheckoutRequest::Guest {
                address,
                cart_items,
                email,
                free_tshirt_size,
                is_subscription,
            } => {
                if cart_items.is_empty() {
                    return Err(CheckoutRuleError::EmptyCart.into());
                }
                let address = ShippingAddress::from_json(address.as_ref())
                    .map_err(CheckoutRuleError::from)?;
                let email = guest_email(email.as_deref())?;
                let lines = self.guest_lines(&cart_items).await?;
                (
                    None,
                    Some(email),
                    address,
                    lines,
                    free_tshirt_size,
                    is_subscription,
                )
            }
        };

        let priced: Vec<PricedLine> = lines.iter().map(OrderLine::priced).collect();
        let totals = compute_totals(&priced, &self.settings);
        check_order_amount(&totals)?;
        let free_item = resolve_free_item(&totals, free_tshirt_size.as_deref())?;

        if is_subscription
            && let Some(line) = lines.iter().find(|l| l.product.recurring_price_id().is_none())
        {
            return Err(CheckoutError::Validation(format!(
                "Product '{}' is not available as a subscription",
                line.product.name
            )));
        }

        Ok(ValidatedCheckout {
            user_id,
            email,
            address,
            lines,
            free_item,
            is_subscription,
            subtotal: totals.subtotal,
            shipping_fee: totals.shipping_fee,
        })
    }

    /// Resolve inline guest lines against the catalog.
    async fn guest_lines(&self, items: &[GuestCartItem]) -> Result<Vec<OrderLine>, CheckoutError> {
        let mut quantities = Vec::with_capacity(items.len());
        for item in items {
            quantities.push((item.product_id, validate_quantity(item.quantity)?));
        }

        let ids: Vec<ProductId> = quantities.iter().map(|(id, _)| *id).collect();
        let products: HashMap<ProductId, Product> = self
            .store
            .get_products(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        quantities
            .into_iter()
            .map(|(id, quantity)| {
                let product = products
                    .get(&id)
                    .cloned()
                    .ok_or_else(|| CheckoutError::NotFound(format!("Product {id} not found")))?;
                Ok(OrderLine {
                    product,
                    quantity,
                    size: None,
                    color: None,
                })
            })
            .collect()
    }

    async fn create(
        &self,
        checkout: ValidatedCheckout,
        now: DateTime<Utc>,
    ) -> Result<PlacedOrder, CheckoutError> {
        let mut tx = self.store.begin_checkout().await?;

        let mut order = tx
            .insert_order(
                &NewOrder {
                    user_id: checkout.user_id,
                    email: checkout.email.clone(),
                    total_price: checkout.subtotal,
                    shipping_fee: checkout.shipping_fee,
                    is_subscription: checkout.is_subscription,
                },
                now,
            )
            .await?;
        tracing::Span::current().record("order_id", tracing::field::display(order.id));

        tx.insert_address(order.id, &checkout.address).await?;

        let mut items = Vec::with_capacity(checkout.lines.len() + 1);
        for line in &checkout.lines {
            let item = tx
                .insert_item(&NewOrderItem {
                    order_id: order.id,
                    product_id: Some(line.product.id),
                    product_name: Some(line.product.name.clone()),
                    price: line.product.discounted_price,
                    quantity: line.quantity,
                    size: line.size.clone(),
                    color: line.color.clone(),
                    is_free_item: false,
                    free_item_size: None,
                })
                .await?;
            tx.increment_order_count(line.product.id, line.quantity)
                .await
                .map_err(|e| match e {
                    RepositoryError::NotFound => CheckoutError::NotFound(format!(
                        "Product {} not found",
                        line.product.id
                    )),
                    other => other.into(),
                })?;
            items.push(item);
        }

        if let Some(size) = checkout.free_item {
            items.push(tx.insert_item(&NewOrderItem::free_item(order.id, size)).await?);
        }

        let request = CheckoutSessionRequest {
            order_id: order.id,
            user_id: checkout.user_id,
            customer_email: checkout.email.as_ref().map(ToString::to_string),
            success_url: self.urls.success_url.clone(),
            cancel_url: format!(
                "{}/{}",
                self.urls.cancel_base.trim_end_matches('/'),
                self.signer.sign(order.id, now)
            ),
            lines: session_lines(&checkout),
        };

        // Dropping `tx` on error rolls back every write above.
        let session = match self.payments.create_session(&request).await {
            Ok(session) => session,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Payment session failed, rolling back");
                return Err(e.into());
            }
        };

        tx.set_payment_session(order.id, &session.id).await?;
        if let Some(user_id) = checkout.user_id {
            tx.clear_cart(user_id).await?;
        }
        tx.commit().await?;

        order.payment_session_id = Some(session.id.clone());
        info!(
            order_id = %order.id,
            session_id = %session.id,
            total = %order.amount_due(),
            "Order placed"
        );

        Ok(PlacedOrder {
            order: OrderDetail {
                address: Some(OrderAddress::from_shipping(order.id, &checkout.address)),
                order,
                items,
            },
            checkout_url: session.url,
        })
    }
}

fn guest_email(raw: Option<&str>) -> Result<Email, CheckoutError> {
    match raw.map(str::trim) {
        None | Some("") => Err(CheckoutError::Validation(
            "Email is required for guest checkout".to_string(),
        )),
        Some(raw) => Email::parse(raw).map_err(|e| CheckoutError::Validation(e.to_string())),
    }
}

/// Provider lines: products plus shipping, or recurring prices only.
fn session_lines(checkout: &ValidatedCheckout) -> SessionLines {
    if checkout.is_subscription {
        return SessionLines::Recurring(
            checkout
                .lines
                .iter()
                .filter_map(|line| {
                    line.product.recurring_price_id().map(|price_id| RecurringLineItem {
                        product_id: line.product.id,
                        price_id: price_id.to_string(),
                        quantity: line.quantity,
                    })
                })
                .collect(),
        );
    }

    let mut items: Vec<SessionLineItem> = checkout
        .lines
        .iter()
        .map(|line| SessionLineItem {
            name: line.product.name.clone(),
            unit_amount: line.product.discounted_price,
            quantity: line.quantity,
        })
        .collect();
    items.push(SessionLineItem {
        name: "Shipping".to_string(),
        unit_amount: checkout.shipping_fee,
        quantity: 1,
    });
    SessionLines::OneTime(items)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use boostedlabs_core::ProductCategory;
    use serde_json::json;

    fn product(id: i64, cents: i64) -> Product {
        Product {
            id: ProductId::new(id),
            category: ProductCategory::Health,
            name: format!("Product {id}"),
            initial_price: Money::from_minor_units(cents),
            discounted_price: Money::from_minor_units(cents),
            description: String::new(),
            available_sizes: vec![],
            available_colors: vec![],
            order_count: 0,
            created_at: Utc::now(),
            stripe_price_id: None,
            stripe_subscription_price_id: None,
        }
    }

    fn checkout(is_subscription: bool, lines: Vec<OrderLine>) -> ValidatedCheckout {
        ValidatedCheckout {
            user_id: Some(UserId::new(1)),
            email: None,
            address: ShippingAddress {
                name: "A".to_string(),
                phone: "1".to_string(),
                address: "Street".to_string(),
                address_type: boostedlabs_core::AddressType::Home,
            },
            lines,
            free_item: None,
            is_subscription,
            subtotal: Money::from_minor_units(18_000),
            shipping_fee: Money::from_minor_units(5_000),
        }
    }

    #[test]
    fn test_body_splits_by_identity() {
        let body: CheckoutBody = serde_json::from_value(json!({
            "address": {"name": "A"},
            "cart_items": [{"product_id": 3, "quantity": 2}],
            "email": "guest@example.com"
        }))
        .unwrap();

        let user = CurrentUser {
            id: UserId::new(9),
            username: None,
        };
        assert!(matches!(
            CheckoutRequest::new(Some(user), body.clone()),
            CheckoutRequest::Authenticated { is_subscription: false, .. }
        ));

        let CheckoutRequest::Guest {
            cart_items, email, ..
        } = CheckoutRequest::new(None, body)
        else {
            panic!("expected guest request");
        };
        assert_eq!(cart_items.len(), 1);
        assert_eq!(cart_items[0].quantity, 2);
        assert_eq!(email.as_deref(), Some("guest@example.com"));
    }

    #[test]
    fn test_guest_quantity_defaults_to_one() {
        let item: GuestCartItem = serde_json::from_value(json!({"product_id": 3})).unwrap();
        assert_eq!(item.quantity, 1);
    }

    #[test]
    fn test_guest_email_rules() {
        assert!(matches!(guest_email(None), Err(CheckoutError::Validation(_))));
        assert!(matches!(guest_email(Some(" ")), Err(CheckoutError::Validation(_))));
        assert!(guest_email(Some("not-an-email")).is_err());
        assert_eq!(
            guest_email(Some("buyer@example.com")).unwrap().as_str(),
            "buyer@example.com"
        );
    }

    #[test]
    fn test_one_time_lines_end_with_shipping() {
        let lines = session_lines(&checkout(
            false,
            vec![OrderLine {
                product: product(1, 9_000),
                quantity: 2,
                size: None,
                color: None,
            }],
        ));
        let SessionLines::OneTime(items) = lines else {
            panic!("expected one-time lines");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].unit_amount, Money::from_minor_units(9_000));
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[1].name, "Shipping");
        assert_eq!(items[1].unit_amount, Money::from_minor_units(5_000));
    }

    #[test]
    fn test_subscription_lines_skip_shipping() {
        let mut p = product(1, 9_000);
        p.stripe_price_id = Some("price_123".to_string());
        let lines = session_lines(&checkout(
            true,
            vec![OrderLine {
                product: p,
                quantity: 1,
                size: None,
                color: None,
            }],
        ));
        let SessionLines::Recurring(items) = lines else {
            panic!("expected recurring lines");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].price_id, "price_123");
    }

    #[test]
    fn test_recurring_price_prefers_subscription_price() {
        let mut p = product(1, 100);
        assert_eq!(p.recurring_price_id(), None);
        p.stripe_price_id = Some("price_once".to_string());
        assert_eq!(p.recurring_price_id(), Some("price_once"));
        p.stripe_subscription_price_id = Some("price_monthly".to_string());
        assert_eq!(p.recurring_price_id(), Some("price_monthly"));
    }

    #[test]
    fn test_payment_error_surfaces_provider_message() {
        let err = CheckoutError::from(PaymentError::Api {
            status: 400,
            message: "No such price".to_string(),
        });
        assert_eq!(err.to_string(), "Payment provider error: No such price");
    }
}

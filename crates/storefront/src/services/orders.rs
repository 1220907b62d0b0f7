//! Order lifecycle after checkout.
//!
//! Payment confirmation arrives by webhook; cancellation and delivery
//! confirmation come from the buyer; the signed cancel link removes an order
//! whose payment was abandoned. Status writes are compare-and-set so a
//! concurrent change is reported instead of overwritten.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use boostedlabs_core::order::{
    DeliveryOutcome, PaymentOutcome, apply_payment, can_abandon, check_cancellation,
    confirm_delivery,
};
use boostedlabs_core::{OrderId, OrderStatus, ProductId, UserId};

use crate::db::{RepositoryError, ShopStore};
use crate::models::{NewSubscription, Order, OrderDetail, SubscriptionStatus};
use crate::services::payments::{CompletedSession, PaymentProvider, WebhookEvent};
use crate::services::signing::{LinkSigner, SigningError};

#[derive(Debug, Error)]
pub enum OrderError {
    /// Missing, or owned by someone else.
    #[error("Order not found")]
    NotFound,

    /// The order's state does not allow the operation.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    InvalidLink(#[from] SigningError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

const CONCURRENT_UPDATE: &str = "Order was updated by another request, please retry";

/// What a webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order was marked paid.
    Applied { order_id: OrderId, status: OrderStatus },
    /// The order was already paid; nothing changed.
    AlreadyApplied { order_id: OrderId },
    /// Not an event we act on, or no matching order.
    Ignored,
}

/// What following a signed cancel link did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbandonOutcome {
    /// The unpaid order was deleted.
    Deleted,
    /// The order is paid or already progressed; it was kept.
    Kept,
    /// No such order (already removed).
    Missing,
}

/// Buyer- and provider-driven order transitions.
pub struct OrderService<'a> {
    store: &'a dyn ShopStore,
    payments: &'a dyn PaymentProvider,
    signer: &'a LinkSigner,
    cancel_window_hours: u32,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(
        store: &'a dyn ShopStore,
        payments: &'a dyn PaymentProvider,
        signer: &'a LinkSigner,
        cancel_window_hours: u32,
    ) -> Self {
        Self {
            store,
            payments,
            signer,
            cancel_window_hours,
        }
    }

    async fn owned_order(&self, user: UserId, id: OrderId) -> Result<Order, OrderError> {
        self.store
            .get_order(id)
            .await?
            .filter(|order| order.is_owned_by(user))
            .ok_or(OrderError::NotFound)
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Repository` on store failure.
    pub async fn list(&self, user: UserId) -> Result<Vec<OrderDetail>, OrderError> {
        Ok(self.store.list_orders(user).await?)
    }

    /// One of the user's orders.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` unless the order exists and belongs to `user`.
    pub async fn detail(&self, user: UserId, id: OrderId) -> Result<OrderDetail, OrderError> {
        self.store
            .get_order_detail(id)
            .await?
            .filter(|detail| detail.order.is_owned_by(user))
            .ok_or(OrderError::NotFound)
    }

    /// Cancel an order within the cancellation window.
    ///
    /// # Errors
    ///
    /// `NotFound` for orders the user does not own, `Conflict` with the
    /// rule's message when the status or the window forbids it.
    #[instrument(skip(self), fields(user_id = %user, order_id = %id))]
    pub async fn cancel(
        &self,
        user: UserId,
        id: OrderId,
        now: DateTime<Utc>,
    ) -> Result<OrderStatus, OrderError> {
        let order = self.owned_order(user, id).await?;

        check_cancellation(order.status, order.created_at, now, self.cancel_window_hours)
            .map_err(|rejection| OrderError::Conflict(rejection.to_string()))?;

        if !self
            .store
            .transition_status(id, order.status, OrderStatus::Cancelled)
            .await?
        {
            return Err(OrderError::Conflict(CONCURRENT_UPDATE.to_string()));
        }

        info!(from = %order.status, "Order cancelled");
        Ok(OrderStatus::Cancelled)
    }

    /// Record that the buyer received the order.
    ///
    /// Confirming an already delivered order succeeds without a write.
    ///
    /// # Errors
    ///
    /// `NotFound` for orders the user does not own, `Conflict` for cancelled
    /// orders.
    #[instrument(skip(self), fields(user_id = %user, order_id = %id))]
    pub async fn confirm_delivery(
        &self,
        user: UserId,
        id: OrderId,
    ) -> Result<OrderStatus, OrderError> {
        let order = self.owned_order(user, id).await?;

        match confirm_delivery(order.status)
            .map_err(|rejection| OrderError::Conflict(rejection.to_string()))?
        {
            DeliveryOutcome::AlreadyDelivered => {}
            DeliveryOutcome::Delivered => {
                if !self
                    .store
                    .transition_status(id, order.status, OrderStatus::Delivered)
                    .await?
                {
                    return Err(OrderError::Conflict(CONCURRENT_UPDATE.to_string()));
                }
                info!(from = %order.status, "Delivery confirmed");
            }
        }

        Ok(OrderStatus::Delivered)
    }

    /// Apply a verified payment provider event.
    ///
    /// Redelivery of the same event changes nothing. Events for unknown
    /// orders are ignored so the provider stops retrying.
    ///
    /// # Errors
    ///
    /// Returns `Repository` if the order cannot be read or updated.
    #[instrument(skip_all)]
    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<WebhookOutcome, OrderError> {
        let session = match event {
            WebhookEvent::CheckoutCompleted(session) => session,
            WebhookEvent::Other { event_type } => {
                info!(event_type = %event_type, "Ignoring webhook event");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        let Some(order_id) = session.order_id() else {
            warn!(session_id = ?session.id, "Completed session has no order reference");
            return Ok(WebhookOutcome::Ignored);
        };
        let Some(order) = self.store.get_order(order_id).await? else {
            warn!(order_id = %order_id, "Completed session for unknown order");
            return Ok(WebhookOutcome::Ignored);
        };
        if let (Some(expected), Some(actual)) = (&order.payment_session_id, &session.id)
            && expected != actual
        {
            warn!(
                order_id = %order_id,
                expected = %expected,
                actual = %actual,
                "Completed session does not match order"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        let outcome = match apply_payment(order.is_paid, order.status) {
            PaymentOutcome::AlreadyApplied => WebhookOutcome::AlreadyApplied { order_id },
            PaymentOutcome::Apply { status } => {
                if self.store.mark_paid(order_id, status).await? {
                    if status == OrderStatus::Cancelled {
                        warn!(order_id = %order_id, "Payment received for a cancelled order");
                    }
                    info!(order_id = %order_id, status = %status, "Order paid");
                    WebhookOutcome::Applied { order_id, status }
                } else {
                    WebhookOutcome::AlreadyApplied { order_id }
                }
            }
        };

        if session.is_subscription() || order.is_subscription {
            self.record_subscriptions(&order, &session).await;
        }

        Ok(outcome)
    }

    /// Link the buyer to the provider subscription, one record per product.
    ///
    /// Best effort: failures are logged and never undo the payment.
    async fn record_subscriptions(&self, order: &Order, session: &CompletedSession) {
        let (Some(user_id), Some(subscription_id)) = (order.user_id, &session.subscription) else {
            warn!(order_id = %order.id, "Subscription session without user or subscription id");
            return;
        };

        let detail = match self.store.get_order_detail(order.id).await {
            Ok(Some(detail)) => detail,
            Ok(None) => return,
            Err(e) => {
                error!(order_id = %order.id, error = %e, "Failed to load subscription items");
                return;
            }
        };

        let item_ids = self.subscription_item_ids(subscription_id, &detail).await;

        for item in detail.items.iter().filter(|item| !item.is_free_item) {
            let Some(product_id) = item.product_id else {
                continue;
            };
            let record = NewSubscription {
                user_id,
                product_id,
                stripe_subscription_id: subscription_id.clone(),
                stripe_subscription_item_id: item_ids.get(&product_id).cloned(),
                quantity: item.quantity,
                status: SubscriptionStatus::Active,
            };
            match self.store.insert_subscription(&record).await {
                Ok(true) => info!(
                    order_id = %order.id,
                    product_id = %product_id,
                    subscription_id = %subscription_id,
                    "Subscription recorded"
                ),
                Ok(false) => {}
                Err(e) => error!(
                    order_id = %order.id,
                    product_id = %product_id,
                    error = %e,
                    "Failed to record subscription"
                ),
            }
        }
    }

    /// Provider subscription item per ordered product, matched on the
    /// product's recurring price.
    ///
    /// Empty when the provider or the catalog cannot be read; records are then
    /// stored without item IDs.
    async fn subscription_item_ids(
        &self,
        subscription_id: &str,
        detail: &OrderDetail,
    ) -> HashMap<ProductId, String> {
        let items = match self.payments.subscription_items(subscription_id).await {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    subscription_id = %subscription_id,
                    error = %e,
                    "Failed to list subscription items"
                );
                return HashMap::new();
            }
        };

        let ids: Vec<ProductId> = detail.items.iter().filter_map(|i| i.product_id).collect();
        let products = match self.store.get_products(&ids).await {
            Ok(products) => products,
            Err(e) => {
                error!(
                    order_id = %detail.order.id,
                    error = %e,
                    "Failed to load subscription products"
                );
                return HashMap::new();
            }
        };

        products
            .iter()
            .filter_map(|product| {
                let price_id = product.recurring_price_id()?;
                let item = items.iter().find(|item| item.price_id == price_id)?;
                Some((product.id, item.id.clone()))
            })
            .collect()
    }

    /// Follow a signed cancel link: delete the order if it was never paid.
    ///
    /// # Errors
    ///
    /// `InvalidLink` for malformed, forged or expired tokens.
    #[instrument(skip_all)]
    pub async fn abandon_via_link(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<AbandonOutcome, OrderError> {
        let order_id = self.signer.verify(token, now)?;

        let Some(order) = self.store.get_order(order_id).await? else {
            return Ok(AbandonOutcome::Missing);
        };
        if !can_abandon(order.is_paid, order.status) {
            info!(order_id = %order_id, status = %order.status, "Cancel link on paid order ignored");
            return Ok(AbandonOutcome::Kept);
        }

        if self.store.delete_unpaid_order(order_id).await? {
            info!(order_id = %order_id, "Abandoned order deleted");
            Ok(AbandonOutcome::Deleted)
        } else {
            Ok(AbandonOutcome::Kept)
        }
    }
}

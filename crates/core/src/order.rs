//! Order status transitions.
//!
//! ```text
//! Pending --payment--> Processing --ship--> Shipped --receipt--> Delivered
//! Pending | Processing --buyer cancels within window--> Cancelled
//! ```
//!
//! Shipping happens outside this system. Every other transition is decided
//! here so the storefront only reads, asks and writes.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::types::OrderStatus;

/// Why a buyer-initiated cancellation was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CancelRejection {
    #[error("Order cannot be cancelled in its current status ({0})")]
    InvalidStatus(OrderStatus),

    #[error("Cannot cancel order after {hours} hours")]
    WindowElapsed { hours: u32 },
}

/// Check whether an order may be cancelled by its buyer at `now`.
///
/// Status is checked before the window. The window is inclusive: an order
/// exactly `window_hours` old can still be cancelled.
///
/// # Errors
///
/// Returns the [`CancelRejection`] for the first rule that fails.
pub fn check_cancellation(
    status: OrderStatus,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    window_hours: u32,
) -> Result<(), CancelRejection> {
    if !matches!(status, OrderStatus::Pending | OrderStatus::Processing) {
        return Err(CancelRejection::InvalidStatus(status));
    }

    if now - created_at > Duration::hours(i64::from(window_hours)) {
        return Err(CancelRejection::WindowElapsed {
            hours: window_hours,
        });
    }

    Ok(())
}

/// Result of confirming delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The order moves to `Delivered`.
    Delivered,
    /// Already delivered; nothing to write.
    AlreadyDelivered,
}

/// Refusal to confirm delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryRejection {
    #[error("Cannot confirm delivery of a cancelled order")]
    Cancelled,
}

/// Decide what a buyer's delivery confirmation does.
///
/// Any live order may be confirmed, not only `Shipped` ones.
///
/// # Errors
///
/// Returns [`DeliveryRejection::Cancelled`] for cancelled orders.
pub const fn confirm_delivery(status: OrderStatus) -> Result<DeliveryOutcome, DeliveryRejection> {
    match status {
        OrderStatus::Cancelled => Err(DeliveryRejection::Cancelled),
        OrderStatus::Delivered => Ok(DeliveryOutcome::AlreadyDelivered),
        OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Shipped => {
            Ok(DeliveryOutcome::Delivered)
        }
    }
}

/// What a verified payment confirmation does to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Mark the order paid and store `status`.
    Apply { status: OrderStatus },
    /// The order is already paid. Redelivered events land here.
    AlreadyApplied,
}

/// Apply a payment confirmation to an order in the given state.
///
/// Only a `Pending` order advances to `Processing`. A paid order never moves,
/// and an order the buyer already cancelled stays cancelled but is still
/// recorded as paid.
#[must_use]
pub const fn apply_payment(is_paid: bool, status: OrderStatus) -> PaymentOutcome {
    if is_paid {
        return PaymentOutcome::AlreadyApplied;
    }
    let status = match status {
        OrderStatus::Pending => OrderStatus::Processing,
        other => other,
    };
    PaymentOutcome::Apply { status }
}

/// Whether the signed abandon link may delete this order.
#[must_use]
pub const fn can_abandon(is_paid: bool, status: OrderStatus) -> bool {
    !is_paid && matches!(status, OrderStatus::Pending)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn hours_ago(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
        now - Duration::hours(hours)
    }

    #[test]
    fn test_cancel_within_window() {
        let now = Utc::now();
        assert!(check_cancellation(OrderStatus::Pending, hours_ago(now, 1), now, 48).is_ok());
        assert!(check_cancellation(OrderStatus::Processing, hours_ago(now, 47), now, 48).is_ok());
        assert!(check_cancellation(OrderStatus::Pending, hours_ago(now, 48), now, 48).is_ok());
    }

    #[test]
    fn test_cancel_after_window() {
        let now = Utc::now();
        let err = check_cancellation(OrderStatus::Pending, hours_ago(now, 49), now, 48).unwrap_err();
        assert_eq!(err, CancelRejection::WindowElapsed { hours: 48 });
        assert_eq!(err.to_string(), "Cannot cancel order after 48 hours");

        let just_over = now - Duration::hours(48) - Duration::seconds(1);
        assert!(check_cancellation(OrderStatus::Pending, just_over, now, 48).is_err());
    }

    #[test]
    fn test_cancel_wrong_status() {
        let now = Utc::now();
        for status in [
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let err = check_cancellation(status, now, now, 48).unwrap_err();
            assert_eq!(err, CancelRejection::InvalidStatus(status));
        }
        // Status is reported even when the window has also passed.
        let err =
            check_cancellation(OrderStatus::Shipped, hours_ago(now, 100), now, 48).unwrap_err();
        assert!(err.to_string().contains("current status (Shipped)"));
    }

    #[test]
    fn test_cancel_window_is_configurable() {
        let now = Utc::now();
        assert!(check_cancellation(OrderStatus::Pending, hours_ago(now, 3), now, 2).is_err());
        assert!(check_cancellation(OrderStatus::Pending, hours_ago(now, 70), now, 72).is_ok());
    }

    #[test]
    fn test_confirm_delivery() {
        assert_eq!(
            confirm_delivery(OrderStatus::Shipped),
            Ok(DeliveryOutcome::Delivered)
        );
        assert_eq!(
            confirm_delivery(OrderStatus::Pending),
            Ok(DeliveryOutcome::Delivered)
        );
        assert_eq!(
            confirm_delivery(OrderStatus::Delivered),
            Ok(DeliveryOutcome::AlreadyDelivered)
        );
        assert_eq!(
            confirm_delivery(OrderStatus::Cancelled),
            Err(DeliveryRejection::Cancelled)
        );
    }

    #[test]
    fn test_payment_is_idempotent() {
        let first = apply_payment(false, OrderStatus::Pending);
        assert_eq!(
            first,
            PaymentOutcome::Apply {
                status: OrderStatus::Processing
            }
        );
        assert_eq!(
            apply_payment(true, OrderStatus::Processing),
            PaymentOutcome::AlreadyApplied
        );
    }

    #[test]
    fn test_payment_never_revives_cancelled_order() {
        assert_eq!(
            apply_payment(false, OrderStatus::Cancelled),
            PaymentOutcome::Apply {
                status: OrderStatus::Cancelled
            }
        );
    }

    #[test]
    fn test_only_unpaid_pending_orders_can_be_abandoned() {
        assert!(can_abandon(false, OrderStatus::Pending));
        assert!(!can_abandon(true, OrderStatus::Processing));
        assert!(!can_abandon(true, OrderStatus::Pending));
        assert!(!can_abandon(false, OrderStatus::Cancelled));
    }
}

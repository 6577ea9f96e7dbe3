//! Delivery state machine
//!
//! Pure planners: they inspect a parcel and decide what the caller may do,
//! without touching storage. The service layer executes the decision under
//! a conditional update so racing writers cannot both win.
//!
//! Rules:
//! - Only the assigned rider advances a parcel.
//! - Riders set `in_transit` or `delivered`, nothing else.
//! - Transitions move strictly forward in lifecycle order; skipping
//!   `in_transit` is allowed.
//! - Re-delivering a delivered parcel is a no-op, not an error.

use crate::error::{Error, Result};
use crate::types::{DeliveryStatus, Parcel};
use tracing::debug;

/// Outcome of planning a status advance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceAction {
    /// Move the parcel to `to`
    Transition {
        /// Target status to write
        to: DeliveryStatus,
        /// True exactly when this transition completes the delivery and an
        /// earning must be recorded
        completes_delivery: bool,
    },
    /// Parcel is already delivered; nothing changes
    AlreadyDelivered,
}

/// Decide whether `actor_email` may advance `parcel` to `target`.
///
/// Authorization is checked before the transition shape, so an
/// unauthorized caller learns nothing about the parcel's progress and a
/// parcel with no assigned rider can never be advanced.
pub fn plan_advance(
    parcel: &Parcel,
    target: DeliveryStatus,
    actor_email: &str,
) -> Result<AdvanceAction> {
    if !parcel.is_assigned_to(actor_email) {
        return Err(Error::Forbidden(format!(
            "{} is not the assigned rider for parcel {}",
            actor_email, parcel.id
        )));
    }

    if !target.is_rider_settable() {
        return Err(Error::InvalidStatus(format!(
            "riders may only set in_transit or delivered, got {}",
            target
        )));
    }

    if parcel.delivery_status == DeliveryStatus::Delivered && target == DeliveryStatus::Delivered {
        debug!(parcel_id = %parcel.id, "parcel already delivered, planning no-op");
        return Ok(AdvanceAction::AlreadyDelivered);
    }

    if target <= parcel.delivery_status {
        return Err(Error::InvalidStatus(format!(
            "cannot move parcel {} from {} to {}",
            parcel.id, parcel.delivery_status, target
        )));
    }

    debug!(
        parcel_id = %parcel.id,
        from = %parcel.delivery_status,
        to = %target,
        "planned forward transition"
    );

    Ok(AdvanceAction::Transition {
        to: target,
        completes_delivery: target == DeliveryStatus::Delivered,
    })
}

/// Check that a rider can still be assigned to `parcel`.
///
/// Assignment is only legal before pickup; an already-assigned parcel is
/// rejected rather than silently reassigned.
pub fn ensure_assignable(parcel: &Parcel) -> Result<()> {
    if parcel.delivery_status != DeliveryStatus::NotCollected {
        return Err(Error::InvalidStatus(format!(
            "parcel {} is {} and can no longer be assigned",
            parcel.id, parcel.delivery_status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    const RIDER: &str = "rafi@example.com";

    fn parcel_with(status: DeliveryStatus, rider: Option<&str>) -> Parcel {
        let now = Utc::now();
        Parcel {
            id: Uuid::new_v4(),
            tracking_code: "PR-TEST0001".to_string(),
            title: "Lamp".to_string(),
            sender_region: "dhaka".to_string(),
            receiver_region: "khulna".to_string(),
            cost: dec!(250),
            delivery_status: status,
            assigned_rider_name: rider.map(|_| "Rafi".to_string()),
            assigned_rider_email: rider.map(String::from),
            payment_status: PaymentStatus::Unpaid,
            payment_transaction_id: None,
            created_by: "sender@example.com".to_string(),
            created_at: now,
            assigned_at: rider.map(|_| now),
            delivered_at: (status == DeliveryStatus::Delivered).then_some(now),
            updated_at: now,
        }
    }

    #[test]
    fn test_assigned_to_in_transit() {
        let parcel = parcel_with(DeliveryStatus::RiderAssigned, Some(RIDER));
        let action = plan_advance(&parcel, DeliveryStatus::InTransit, RIDER).unwrap();
        assert_eq!(
            action,
            AdvanceAction::Transition {
                to: DeliveryStatus::InTransit,
                completes_delivery: false
            }
        );
    }

    #[test]
    fn test_in_transit_to_delivered_completes_delivery() {
        let parcel = parcel_with(DeliveryStatus::InTransit, Some(RIDER));
        let action = plan_advance(&parcel, DeliveryStatus::Delivered, RIDER).unwrap();
        assert_eq!(
            action,
            AdvanceAction::Transition {
                to: DeliveryStatus::Delivered,
                completes_delivery: true
            }
        );
    }

    #[test]
    fn test_forward_jump_skipping_in_transit() {
        let parcel = parcel_with(DeliveryStatus::RiderAssigned, Some(RIDER));
        let action = plan_advance(&parcel, DeliveryStatus::Delivered, RIDER).unwrap();
        assert_eq!(
            action,
            AdvanceAction::Transition {
                to: DeliveryStatus::Delivered,
                completes_delivery: true
            }
        );
    }

    #[test]
    fn test_backward_transition_rejected() {
        let parcel = parcel_with(DeliveryStatus::Delivered, Some(RIDER));
        let err = plan_advance(&parcel, DeliveryStatus::InTransit, RIDER).unwrap_err();
        assert!(matches!(err, Error::InvalidStatus(_)));
    }

    #[test]
    fn test_repeated_in_transit_rejected() {
        let parcel = parcel_with(DeliveryStatus::InTransit, Some(RIDER));
        let err = plan_advance(&parcel, DeliveryStatus::InTransit, RIDER).unwrap_err();
        assert!(matches!(err, Error::InvalidStatus(_)));
    }

    #[test]
    fn test_repeated_delivered_is_noop() {
        let parcel = parcel_with(DeliveryStatus::Delivered, Some(RIDER));
        let action = plan_advance(&parcel, DeliveryStatus::Delivered, RIDER).unwrap();
        assert_eq!(action, AdvanceAction::AlreadyDelivered);
    }

    #[test]
    fn test_rider_cannot_set_administrative_statuses() {
        let parcel = parcel_with(DeliveryStatus::InTransit, Some(RIDER));
        for target in [DeliveryStatus::NotCollected, DeliveryStatus::RiderAssigned] {
            let err = plan_advance(&parcel, target, RIDER).unwrap_err();
            assert!(matches!(err, Error::InvalidStatus(_)));
        }
    }

    #[test]
    fn test_wrong_actor_is_forbidden() {
        let parcel = parcel_with(DeliveryStatus::RiderAssigned, Some(RIDER));
        let err = plan_advance(&parcel, DeliveryStatus::InTransit, "other@example.com").unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_unassigned_parcel_is_forbidden_for_everyone() {
        let parcel = parcel_with(DeliveryStatus::NotCollected, None);
        let err = plan_advance(&parcel, DeliveryStatus::InTransit, RIDER).unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_forbidden_wins_over_invalid_target() {
        // Actor check runs first even when the target would also be illegal
        let parcel = parcel_with(DeliveryStatus::Delivered, Some(RIDER));
        let err =
            plan_advance(&parcel, DeliveryStatus::NotCollected, "other@example.com").unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
    }

    #[test]
    fn test_assignable_only_before_pickup() {
        assert!(ensure_assignable(&parcel_with(DeliveryStatus::NotCollected, None)).is_ok());
        for status in [
            DeliveryStatus::RiderAssigned,
            DeliveryStatus::InTransit,
            DeliveryStatus::Delivered,
        ] {
            let err = ensure_assignable(&parcel_with(status, Some(RIDER))).unwrap_err();
            assert!(matches!(err, Error::InvalidStatus(_)));
        }
    }
}

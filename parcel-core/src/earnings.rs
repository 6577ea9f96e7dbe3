//! Earnings computation
//!
//! One code path turns a delivered parcel into money: the ledger write on
//! delivery and any later recomputation (rider summaries, reconciliation)
//! both call [`delivery_payout`], so a recorded amount can always be checked
//! against the parcel it came from.

use crate::error::{Error, Result};
use crate::types::{Earning, EarningRule, EarningStatus, Parcel};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use uuid::Uuid;

/// Rider's share of the cost when pickup and drop-off share a region
pub const SAME_REGION_RATE: Decimal = dec!(0.8);

/// Rider's share of the cost when the delivery crosses regions
pub const CROSS_REGION_RATE: Decimal = dec!(0.3);

/// Which rule applies to a sender/receiver region pair (exact comparison)
pub fn rule_for(sender_region: &str, receiver_region: &str) -> EarningRule {
    if sender_region == receiver_region {
        EarningRule::SameRegion
    } else {
        EarningRule::CrossRegion
    }
}

/// Rate applied by a rule
pub fn rate_of(rule: EarningRule) -> Decimal {
    match rule {
        EarningRule::SameRegion => SAME_REGION_RATE,
        EarningRule::CrossRegion => CROSS_REGION_RATE,
    }
}

/// Compute the rounded payout for one delivery.
///
/// `amount = round(cost × rate)` with midpoints rounding away from zero,
/// i.e. round-half-up for the non-negative costs this system stores.
/// Deterministic: equal inputs produce equal amounts.
pub fn delivery_payout(
    cost: Decimal,
    sender_region: &str,
    receiver_region: &str,
) -> Result<(i64, EarningRule)> {
    if cost < Decimal::ZERO {
        return Err(Error::InvariantViolation(format!(
            "parcel cost must be non-negative, got {}",
            cost
        )));
    }

    let rule = rule_for(sender_region, receiver_region);
    let amount = (cost * rate_of(rule))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| {
            Error::InvariantViolation(format!("payout for cost {} exceeds i64 range", cost))
        })?;

    Ok((amount, rule))
}

/// Build the ledger entry for a delivered parcel.
///
/// The sole constructor of [`Earning`] values: an earning only ever comes
/// from a delivered parcel with an assigned rider.
pub fn earning_for(parcel: &Parcel, now: DateTime<Utc>) -> Result<Earning> {
    if !parcel.is_delivered() {
        return Err(Error::InvariantViolation(format!(
            "parcel {} is {}, earnings are recorded on delivery only",
            parcel.id, parcel.delivery_status
        )));
    }

    let rider_email = parcel.assigned_rider_email.clone().ok_or_else(|| {
        Error::InvariantViolation(format!("delivered parcel {} has no assigned rider", parcel.id))
    })?;

    let (amount, rule) = delivery_payout(parcel.cost, &parcel.sender_region, &parcel.receiver_region)?;

    Ok(Earning {
        id: Uuid::now_v7(),
        parcel_id: parcel.id,
        rider_email,
        amount,
        rule,
        status: EarningStatus::Unpaid,
        created_at: now,
        paid_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DeliveryStatus, PaymentStatus};

    fn delivered_parcel(cost: Decimal, sender: &str, receiver: &str) -> Parcel {
        let now = Utc::now();
        Parcel {
            id: Uuid::new_v4(),
            tracking_code: "PR-TEST0001".to_string(),
            title: "Phone".to_string(),
            sender_region: sender.to_string(),
            receiver_region: receiver.to_string(),
            cost,
            delivery_status: DeliveryStatus::Delivered,
            assigned_rider_name: Some("Rafi".to_string()),
            assigned_rider_email: Some("rafi@example.com".to_string()),
            payment_status: PaymentStatus::Paid,
            payment_transaction_id: Some("txn_123".to_string()),
            created_by: "sender@example.com".to_string(),
            created_at: now,
            assigned_at: Some(now),
            delivered_at: Some(now),
            updated_at: now,
        }
    }

    #[test]
    fn test_same_region_pays_eighty_percent() {
        let (amount, rule) = delivery_payout(dec!(100), "dhaka", "dhaka").unwrap();
        assert_eq!(amount, 80);
        assert_eq!(rule, EarningRule::SameRegion);
    }

    #[test]
    fn test_cross_region_pays_thirty_percent() {
        let (amount, rule) = delivery_payout(dec!(100), "dhaka", "khulna").unwrap();
        assert_eq!(amount, 30);
        assert_eq!(rule, EarningRule::CrossRegion);
    }

    #[test]
    fn test_region_comparison_is_exact() {
        // "Dhaka" and "dhaka" are different regions to the rate rule
        let (_, rule) = delivery_payout(dec!(100), "Dhaka", "dhaka").unwrap();
        assert_eq!(rule, EarningRule::CrossRegion);
    }

    #[test]
    fn test_midpoints_round_up() {
        // 103.125 * 0.8 = 82.5
        let (amount, _) = delivery_payout(dec!(103.125), "dhaka", "dhaka").unwrap();
        assert_eq!(amount, 83);

        // 105 * 0.3 = 31.5
        let (amount, _) = delivery_payout(dec!(105), "dhaka", "khulna").unwrap();
        assert_eq!(amount, 32);
    }

    #[test]
    fn test_fractional_costs_round_to_nearest() {
        // 101.9 * 0.8 = 81.52
        let (amount, _) = delivery_payout(dec!(101.9), "dhaka", "dhaka").unwrap();
        assert_eq!(amount, 82);

        // 101.2 * 0.3 = 30.36
        let (amount, _) = delivery_payout(dec!(101.2), "dhaka", "khulna").unwrap();
        assert_eq!(amount, 30);
    }

    #[test]
    fn test_payout_is_deterministic() {
        let a = delivery_payout(dec!(777.77), "dhaka", "sylhet").unwrap();
        let b = delivery_payout(dec!(777.77), "dhaka", "sylhet").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_negative_cost_rejected() {
        let err = delivery_payout(dec!(-1), "dhaka", "dhaka").unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_earning_for_delivered_parcel() {
        let parcel = delivered_parcel(dec!(250), "dhaka", "khulna");
        let earning = earning_for(&parcel, Utc::now()).unwrap();

        assert_eq!(earning.parcel_id, parcel.id);
        assert_eq!(earning.rider_email, "rafi@example.com");
        assert_eq!(earning.amount, 75);
        assert_eq!(earning.rule, EarningRule::CrossRegion);
        assert_eq!(earning.status, EarningStatus::Unpaid);
        assert!(earning.paid_at.is_none());
    }

    #[test]
    fn test_earning_requires_delivered_status() {
        let mut parcel = delivered_parcel(dec!(250), "dhaka", "dhaka");
        parcel.delivery_status = DeliveryStatus::InTransit;
        parcel.delivered_at = None;

        let err = earning_for(&parcel, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_earning_requires_assigned_rider() {
        let mut parcel = delivered_parcel(dec!(250), "dhaka", "dhaka");
        parcel.assigned_rider_email = None;

        let err = earning_for(&parcel, Utc::now()).unwrap_err();
        assert!(matches!(err, Error::InvariantViolation(_)));
    }

    #[test]
    fn test_ledger_amount_matches_recomputation() {
        let parcel = delivered_parcel(dec!(149.5), "dhaka", "dhaka");
        let earning = earning_for(&parcel, Utc::now()).unwrap();

        let (recomputed, rule) =
            delivery_payout(parcel.cost, &parcel.sender_region, &parcel.receiver_region).unwrap();
        assert_eq!(earning.amount, recomputed);
        assert_eq!(earning.rule, rule);
    }
}
